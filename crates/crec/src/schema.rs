//! Closed enumerations shared across the parse tree and the AST: node kinds,
//! scopes, and the recognized event sources with their field allow-lists.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

/// Kind of a parse-tree or AST node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeType {
    #[serde(rename = "machine_seq")]
    MachineSeq,
    #[serde(rename = "machine_set")]
    MachineSet,
    #[serde(rename = "log_seq")]
    LogSeq,
    #[serde(rename = "log_set")]
    LogSet,
    #[serde(rename = "promql")]
    PromQl,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeType::MachineSeq => "machine_seq",
            NodeType::MachineSet => "machine_set",
            NodeType::LogSeq => "log_seq",
            NodeType::LogSet => "log_set",
            NodeType::PromQl => "promql",
        }
    }

    /// Returns `true` for the machine (correlator) kinds.
    pub fn is_machine(&self) -> bool {
        matches!(self, NodeType::MachineSeq | NodeType::MachineSet)
    }

    /// Returns `true` for the log-matcher kinds.
    pub fn is_log(&self) -> bool {
        matches!(self, NodeType::LogSeq | NodeType::LogSet)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = ();
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "machine_seq" => Ok(NodeType::MachineSeq),
            "machine_set" => Ok(NodeType::MachineSet),
            "log_seq" => Ok(NodeType::LogSeq),
            "log_set" => Ok(NodeType::LogSet),
            "promql" => Ok(NodeType::PromQl),
            _ => Err(()),
        }
    }
}

/// Execution scope of an AST node, ordered narrowest to widest.
///
/// The ordering drives widest-wins scope selection for machine nodes:
/// `organization > cluster > node > default`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    Default,
    Node,
    Cluster,
    Organization,
}

impl Scope {
    pub fn as_str(&self) -> &'static str {
        match self {
            Scope::Default => "default",
            Scope::Node => "node",
            Scope::Cluster => "cluster",
            Scope::Organization => "organization",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scope {
    type Err = ();
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "default" => Ok(Scope::Default),
            "node" => Ok(Scope::Node),
            "cluster" => Ok(Scope::Cluster),
            "organization" => Ok(Scope::Organization),
            _ => Err(()),
        }
    }
}

/// Event source whose fields are matched as structured k8s events rather than
/// raw log lines.
pub const SOURCE_K8S: &str = "k8s";

pub const K8S_FIELD_REASON: &str = "reason";
pub const K8S_FIELD_TYPE: &str = "type";
pub const K8S_FIELD_REASON_DETAIL: &str = "reasonDetail";

/// Returns `true` if `field` is a recognized k8s event field.
pub fn is_k8s_field(field: &str) -> bool {
    matches!(
        field,
        K8S_FIELD_REASON | K8S_FIELD_TYPE | K8S_FIELD_REASON_DETAIL
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_type_round_trip() {
        for t in [
            NodeType::MachineSeq,
            NodeType::MachineSet,
            NodeType::LogSeq,
            NodeType::LogSet,
            NodeType::PromQl,
        ] {
            assert_eq!(t.as_str().parse::<NodeType>(), Ok(t));
        }
        assert!("machine".parse::<NodeType>().is_err());
    }

    #[test]
    fn test_scope_widest_wins_ordering() {
        assert!(Scope::Organization > Scope::Cluster);
        assert!(Scope::Cluster > Scope::Node);
        assert!(Scope::Node > Scope::Default);

        let widest = [Scope::Node, Scope::Cluster, Scope::Node]
            .into_iter()
            .max()
            .unwrap();
        assert_eq!(widest, Scope::Cluster);
    }

    #[test]
    fn test_k8s_field_allow_list() {
        assert!(is_k8s_field("reason"));
        assert!(is_k8s_field("type"));
        assert!(is_k8s_field("reasonDetail"));
        assert!(!is_k8s_field("message"));
    }
}
