//! AST builder: rewrites parse trees into a normalized forest of machine,
//! log-matcher, and promql nodes.
//!
//! Every rule's AST root is a machine node. Composite parse nodes without an
//! event descriptor become machines; composites with an event become
//! log-matchers that absorb their leaf matchers as flattened field lists.
//! Addresses are allocated deterministically with per-machine sibling
//! counters, so equivalent inputs produce byte-identical forests.

mod logmatch;
mod metrics;

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::time::Duration;

use serde::Serialize;

use crate::error::{Error, ErrorKind, Pos, Result};
use crate::schema::{NodeType, Scope};
use crate::tree::{
    self, Matcher, NegateOpts, NodeMetadata, ParseChild, ParseNode, ParseOptions, ParseTree,
};

pub use logmatch::{AstField, LogMatcher, TermValue};
pub use metrics::PromQl;

/// The compiled forest: one AST root per rule, in input order.
#[derive(Debug, Serialize)]
pub struct AstForest {
    pub roots: Vec<AstNode>,
}

/// Deterministic identity of an AST node within a compilation.
///
/// The owning machine's address is embedded by value; rendering the address
/// therefore encodes the whole machine chain, which is what makes addresses
/// unique across the forest.
#[derive(Debug, Clone, Serialize)]
pub struct NodeAddress {
    pub rule_hash: String,
    pub kind: NodeType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub machine: Option<Box<NodeAddress>>,
    pub term_index: u32,
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.machine {
            Some(machine) => write!(f, "{machine}/{}[{}]", self.kind, self.term_index),
            None => write!(f, "{}/{}[{}]", self.rule_hash, self.kind, self.term_index),
        }
    }
}

/// One node of the compiled AST.
#[derive(Debug, Serialize)]
pub struct AstNode {
    pub address: NodeAddress,
    /// Address of the owning machine node; `None` at the root.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_address: Option<NodeAddress>,
    pub scope: Scope,
    pub node_type: NodeType,
    pub metadata: AstMetadata,
    pub object: AstObject,
    /// Index where negated children begin; `None` when there are none.
    pub neg_idx: Option<usize>,
    pub children: Vec<AstNode>,
}

/// Rule identity and per-node context inherited from the parse tree.
#[derive(Debug, Clone, Serialize)]
pub struct AstMetadata {
    pub rule_id: String,
    pub rule_hash: String,
    pub cre_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negate_opts: Option<NegateOpts>,
    pub pos: Pos,
}

/// Variant payload of an AST node, determined by its type.
#[derive(Debug, Serialize)]
pub enum AstObject {
    Machine(Machine),
    LogMatcher(LogMatcher),
    PromQl(PromQl),
}

/// Payload of a machine (correlator) node.
#[derive(Debug, Serialize)]
pub struct Machine {
    pub window: Duration,
    pub correlations: Vec<String>,
}

/// Event descriptor carried into the AST.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AstEvent {
    pub source: String,
    pub origin: bool,
}

/// Compile an input with default options.
pub fn build(input: &str) -> Result<AstForest> {
    build_with(input, &ParseOptions::default())
}

/// Compile an input: document read, parse-tree build, AST rewrite.
pub fn build_with(input: &str, opts: &ParseOptions) -> Result<AstForest> {
    let tree = tree::parse(input, opts)?;
    build_forest(&tree)
}

/// Rewrite an already-built parse tree into an AST forest.
pub fn build_forest(tree: &ParseTree) -> Result<AstForest> {
    let mut builder = Builder::default();
    let mut roots = Vec::with_capacity(tree.roots.len());
    for node in &tree.roots {
        roots.push(builder.build_root(node)?);
    }
    Ok(AstForest { roots })
}

#[derive(Default)]
struct Builder {
    /// Rendered addresses of every node built so far; collisions abort.
    seen: HashSet<String>,
}

/// Per-kind sibling counters within one machine node.
#[derive(Default)]
struct KindCounters(HashMap<NodeType, u32>);

impl KindCounters {
    fn next(&mut self, kind: NodeType) -> u32 {
        let counter = self.0.entry(kind).or_insert(0);
        let index = *counter;
        *counter += 1;
        index
    }
}

impl Builder {
    /// Build the AST for one rule. The root is always a machine node; a
    /// log-flavored parse root gets a machine wrapper of the matching flavor.
    fn build_root(&mut self, node: &ParseNode) -> Result<AstNode> {
        match node.metadata.node_type {
            NodeType::MachineSeq | NodeType::MachineSet => {
                let address = NodeAddress {
                    rule_hash: node.metadata.rule_hash.clone(),
                    kind: node.metadata.node_type,
                    machine: None,
                    term_index: 0,
                };
                self.build_machine(node, address, None)
            }
            NodeType::LogSeq => self.build_wrapped_root(node, NodeType::MachineSeq),
            NodeType::LogSet => self.build_wrapped_root(node, NodeType::MachineSet),
            NodeType::PromQl => {
                log::error!("promql cannot be a rule root");
                Err(wrap_meta(&node.metadata, ErrorKind::InvalidNodeType))
            }
        }
    }

    /// Machine wrapper for a rule whose root is itself a log matcher.
    fn build_wrapped_root(&mut self, node: &ParseNode, machine_kind: NodeType) -> Result<AstNode> {
        let address = NodeAddress {
            rule_hash: node.metadata.rule_hash.clone(),
            kind: machine_kind,
            machine: None,
            term_index: 0,
        };
        self.register(&address, &node.metadata)?;

        let mut counters = KindCounters::default();
        let child = self.build_log_node(node, &address, &mut counters)?;
        let scope = child.scope;

        Ok(AstNode {
            address,
            parent_address: None,
            scope,
            node_type: machine_kind,
            metadata: ast_metadata(&node.metadata),
            object: AstObject::Machine(Machine {
                window: node.metadata.window,
                correlations: node.metadata.correlations.clone(),
            }),
            neg_idx: None,
            children: vec![child],
        })
    }

    fn build_machine(
        &mut self,
        node: &ParseNode,
        address: NodeAddress,
        parent: Option<&NodeAddress>,
    ) -> Result<AstNode> {
        self.register(&address, &node.metadata)?;

        let mut counters = KindCounters::default();
        let split = node.neg_idx.unwrap_or(node.children.len());
        let (pos_parse, neg_parse) = node.children.split_at(split.min(node.children.len()));

        let pos_children = self.build_group(node, pos_parse, &address, &mut counters)?;
        let neg_children = self.build_group(node, neg_parse, &address, &mut counters)?;

        let neg_idx = if neg_children.is_empty() {
            None
        } else {
            Some(pos_children.len())
        };
        let mut children = pos_children;
        children.extend(neg_children);

        // Widest-wins over the children's scopes.
        let scope = children
            .iter()
            .map(|child| child.scope)
            .max()
            .unwrap_or(Scope::Default);

        Ok(AstNode {
            address: address.clone(),
            parent_address: parent.cloned(),
            scope,
            node_type: address.kind,
            metadata: ast_metadata(&node.metadata),
            object: AstObject::Machine(Machine {
                window: node.metadata.window,
                correlations: node.metadata.correlations.clone(),
            }),
            neg_idx,
            children,
        })
    }

    /// Rewrite one polarity group of a machine's children. Composite children
    /// are rewritten in order; leaf matchers are absorbed into a single
    /// synthesized log-matcher node appended after them.
    fn build_group(
        &mut self,
        parent: &ParseNode,
        group: &[ParseChild],
        machine: &NodeAddress,
        counters: &mut KindCounters,
    ) -> Result<Vec<AstNode>> {
        let mut out = Vec::with_capacity(group.len());
        let mut leaves: Vec<&Matcher> = Vec::new();

        for child in group {
            match child {
                ParseChild::Node(composite) => match composite.metadata.node_type {
                    NodeType::LogSeq | NodeType::LogSet => {
                        out.push(self.build_log_node(composite, machine, counters)?);
                    }
                    NodeType::MachineSeq | NodeType::MachineSet => {
                        let kind = composite.metadata.node_type;
                        let address = NodeAddress {
                            rule_hash: composite.metadata.rule_hash.clone(),
                            kind,
                            machine: Some(Box::new(machine.clone())),
                            term_index: counters.next(kind),
                        };
                        out.push(self.build_machine(composite, address, Some(machine))?);
                    }
                    NodeType::PromQl => {
                        out.push(self.build_promql_node(composite, machine, counters)?);
                    }
                },
                ParseChild::Matcher(matcher) => leaves.push(matcher),
                ParseChild::PromQl(_) => {
                    log::error!("metric scalar outside a promql node");
                    return Err(wrap_meta(&parent.metadata, ErrorKind::InvalidNodeType));
                }
            }
        }

        if !leaves.is_empty() {
            let flavor = log_flavor(machine.kind);
            out.push(self.build_log_from_leaves(
                &parent.metadata,
                flavor,
                &leaves,
                machine,
                counters,
            )?);
        }

        Ok(out)
    }

    fn register(&mut self, address: &NodeAddress, meta: &NodeMetadata) -> Result<()> {
        let rendered = address.to_string();
        if !self.seen.insert(rendered.clone()) {
            return Err(wrap_meta(meta, ErrorKind::InvalidNodeType)
                .with_msg(format!("duplicate ast address {rendered}")));
        }
        Ok(())
    }
}

/// Log flavor matching a machine flavor.
fn log_flavor(machine_kind: NodeType) -> NodeType {
    if machine_kind == NodeType::MachineSeq {
        NodeType::LogSeq
    } else {
        NodeType::LogSet
    }
}

fn ast_metadata(meta: &NodeMetadata) -> AstMetadata {
    AstMetadata {
        rule_id: meta.rule_id.clone(),
        rule_hash: meta.rule_hash.clone(),
        cre_id: meta.cre_id.clone(),
        negate_opts: meta.negate_opts.clone(),
        pos: meta.pos,
    }
}

fn wrap_meta(meta: &NodeMetadata, kind: ErrorKind) -> Error {
    Error::wrap(meta.pos, &meta.rule_id, &meta.rule_hash, &meta.cre_id, kind)
}
