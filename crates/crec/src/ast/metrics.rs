//! Metric-expression node lowering.

use std::time::Duration;

use serde::Serialize;

use super::{
    AstEvent, AstNode, AstObject, Builder, KindCounters, NodeAddress, ast_metadata, wrap_meta,
};
use crate::error::{ErrorKind, Result};
use crate::schema::{NodeType, Scope};
use crate::tree::{ParseChild, ParseNode};

/// Payload of a `promql` node: the expression plus evaluation cadence.
#[derive(Debug, Clone, Serialize)]
pub struct PromQl {
    pub expr: String,
    #[serde(rename = "for")]
    pub for_: Duration,
    pub interval: Duration,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub event: Option<AstEvent>,
}

impl Builder {
    /// Build a promql node. Expects exactly one scalar child carrying the
    /// expression.
    pub(super) fn build_promql_node(
        &mut self,
        node: &ParseNode,
        machine: &NodeAddress,
        counters: &mut KindCounters,
    ) -> Result<AstNode> {
        if node.children.len() != 1 {
            log::error!(
                "promql node must have exactly one child (got {})",
                node.children.len()
            );
            return Err(wrap_meta(&node.metadata, ErrorKind::InvalidNodeType));
        }

        let ParseChild::PromQl(leaf) = &node.children[0] else {
            log::error!("promql node child is not a metric scalar");
            return Err(wrap_meta(&node.metadata, ErrorKind::MissingScalar));
        };

        if leaf.expr.is_empty() {
            log::error!("promql expr string is empty");
            return Err(wrap_meta(&node.metadata, ErrorKind::MissingScalar));
        }

        let address = NodeAddress {
            rule_hash: node.metadata.rule_hash.clone(),
            kind: NodeType::PromQl,
            machine: Some(Box::new(machine.clone())),
            term_index: counters.next(NodeType::PromQl),
        };
        self.register(&address, &node.metadata)?;

        let event = node.metadata.event.as_ref().map(|event| AstEvent {
            source: event.source.clone(),
            origin: event.origin,
        });

        Ok(AstNode {
            address,
            parent_address: Some(machine.clone()),
            scope: Scope::Cluster,
            node_type: NodeType::PromQl,
            metadata: ast_metadata(&node.metadata),
            object: AstObject::PromQl(PromQl {
                expr: leaf.expr.clone(),
                for_: leaf.for_,
                interval: leaf.interval,
                event,
            }),
            neg_idx: None,
            children: Vec::new(),
        })
    }
}
