//! Log-matcher lowering: flattens a log-flavored composite's leaf matchers
//! into positive and negated field lists, validates window/arity coupling,
//! and produces the matcher terms consumed by downstream engines.

use std::time::Duration;

use serde::Serialize;

use super::{
    AstEvent, AstNode, AstObject, Builder, KindCounters, NodeAddress, ast_metadata, wrap_meta,
};
use crate::error::{ErrorKind, Result};
use crate::schema::{self, NodeType, Scope};
use crate::tree::{Field, Matcher, NegateOpts, NodeMetadata, ParseChild, ParseNode};

/// Payload of a log-matcher node: one event-source match window with
/// flattened positive and negated fields.
#[derive(Debug, Clone, Serialize)]
pub struct LogMatcher {
    pub event: AstEvent,
    pub match_fields: Vec<AstField>,
    pub negate_fields: Vec<AstField>,
    pub window: Duration,
}

/// A lowered field: the term value to match plus optional negate geometry.
#[derive(Debug, Clone, Serialize)]
pub struct AstField {
    pub field: String,
    pub term: TermValue,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negate_opts: Option<NegateOpts>,
}

/// The matcher term produced for downstream engines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum TermValue {
    /// Literal substring match over the raw entry.
    Raw(String),
    /// jq expression evaluated against the structured entry.
    JqJson(String),
    /// Regular-expression match over the raw entry.
    Regex(String),
}

impl Builder {
    /// Build a log-matcher node from a log-flavored composite. All children
    /// must be leaf matchers.
    pub(super) fn build_log_node(
        &mut self,
        node: &ParseNode,
        machine: &NodeAddress,
        counters: &mut KindCounters,
    ) -> Result<AstNode> {
        let mut leaves = Vec::with_capacity(node.children.len());
        for child in &node.children {
            let ParseChild::Matcher(matcher) = child else {
                log::error!(
                    "expected scalar value under {} node",
                    node.metadata.node_type
                );
                return Err(wrap_meta(&node.metadata, ErrorKind::MissingScalar));
            };
            leaves.push(matcher);
        }

        self.build_log_from_leaves(
            &node.metadata,
            node.metadata.node_type,
            &leaves,
            machine,
            counters,
        )
    }

    /// Build a log-matcher node of `flavor` from collected leaf matchers.
    /// Used both for event-carrying composites and for leaves absorbed
    /// directly under a machine node.
    pub(super) fn build_log_from_leaves(
        &mut self,
        meta: &NodeMetadata,
        flavor: NodeType,
        leaves: &[&Matcher],
        machine: &NodeAddress,
        counters: &mut KindCounters,
    ) -> Result<AstNode> {
        let src = meta
            .event
            .as_ref()
            .map(|event| event.source.as_str())
            .unwrap_or_default();

        let mut match_fields = Vec::new();
        let mut negate_fields = Vec::new();

        for matcher in leaves {
            for field in &matcher.match_fields {
                let term = new_match_term(src, field).map_err(|kind| {
                    log::error!("invalid match field term");
                    wrap_meta(meta, kind)
                })?;
                for _ in 0..field.count.max(1) {
                    match_fields.push(term.clone());
                }
            }
            for field in &matcher.negate_fields {
                let term = new_negate_term(src, field).map_err(|kind| {
                    log::error!("invalid negate field term");
                    wrap_meta(meta, kind)
                })?;
                for _ in 0..field.count.max(1) {
                    negate_fields.push(term.clone());
                }
            }
        }

        match flavor {
            NodeType::LogSeq => validate_log_seq(meta, match_fields.len())?,
            NodeType::LogSet => validate_log_set(meta, match_fields.len())?,
            _ => {
                log::error!("invalid log matcher type {flavor}");
                return Err(wrap_meta(meta, ErrorKind::InvalidNodeType));
            }
        }

        let address = NodeAddress {
            rule_hash: meta.rule_hash.clone(),
            kind: flavor,
            machine: Some(Box::new(machine.clone())),
            term_index: counters.next(flavor),
        };
        self.register(&address, meta)?;

        let event = meta
            .event
            .as_ref()
            .map(|event| AstEvent {
                source: event.source.clone(),
                origin: event.origin,
            })
            .unwrap_or_default();

        Ok(AstNode {
            address,
            parent_address: Some(machine.clone()),
            scope: log_match_scope(src),
            node_type: flavor,
            metadata: ast_metadata(meta),
            object: AstObject::LogMatcher(LogMatcher {
                event,
                match_fields,
                negate_fields,
                window: meta.window,
            }),
            neg_idx: None,
            children: Vec::new(),
        })
    }
}

/// Sequences need at least two positive conditions and a window.
fn validate_log_seq(meta: &NodeMetadata, matches: usize) -> Result<()> {
    if matches <= 1 {
        log::error!("sequences require two or more positive conditions");
        return Err(wrap_meta(meta, ErrorKind::SeqPosConditions));
    }
    if meta.window.is_zero() {
        log::error!("sequence requires a window");
        return Err(wrap_meta(meta, ErrorKind::InvalidWindow));
    }
    Ok(())
}

/// Sets couple the window to the positive-condition count: a single
/// condition forbids a window, multiple conditions require one.
fn validate_log_set(meta: &NodeMetadata, matches: usize) -> Result<()> {
    if matches == 1 && !meta.window.is_zero() {
        log::error!("windows require two or more positive conditions");
        return Err(wrap_meta(meta, ErrorKind::InvalidWindow));
    }
    if matches > 1 && meta.window.is_zero() {
        log::error!("two or more positive conditions require a window");
        return Err(wrap_meta(meta, ErrorKind::InvalidWindow));
    }
    Ok(())
}

fn log_match_scope(src: &str) -> Scope {
    if src == schema::SOURCE_K8S {
        Scope::Cluster
    } else {
        Scope::Node
    }
}

/// Lower a field from a recognized structured source. k8s event fields are
/// rewritten into jq selections over the event object.
fn known_src_field(src: &str, field: &Field) -> std::result::Result<AstField, ErrorKind> {
    match src {
        schema::SOURCE_K8S => {
            if !schema::is_k8s_field(&field.field) {
                return Err(ErrorKind::UnknownField);
            }
            Ok(AstField {
                field: field.field.clone(),
                term: TermValue::JqJson(format!(
                    "select(.{} == \"{}\")",
                    field.field, field.str_value
                )),
                negate_opts: None,
            })
        }
        _ => Err(ErrorKind::UnknownSrc),
    }
}

fn new_match_term(src: &str, field: &Field) -> std::result::Result<AstField, ErrorKind> {
    match known_src_field(src, field) {
        Ok(term) => return Ok(term),
        // A recognized source with an unrecognized field is an error; an
        // unrecognized source falls back to raw term handling.
        Err(ErrorKind::UnknownField) => return Err(ErrorKind::UnknownField),
        Err(_) => {}
    }

    let mut term = None;
    let mut populated = 0;

    if !field.str_value.is_empty() {
        term = Some(TermValue::Raw(field.str_value.clone()));
        populated += 1;
    }
    if !field.jq_value.is_empty() {
        term = Some(TermValue::JqJson(field.jq_value.clone()));
        populated += 1;
    }
    if !field.regex_value.is_empty() {
        term = Some(TermValue::Regex(field.regex_value.clone()));
        populated += 1;
    }

    if populated > 1 {
        log::error!("only one of value, jq, or regex can be set");
        return Err(ErrorKind::InvalidNodeType);
    }
    let Some(term) = term else {
        return Err(ErrorKind::MissingScalar);
    };

    Ok(AstField {
        field: field.field.clone(),
        term,
        negate_opts: None,
    })
}

fn new_negate_term(src: &str, field: &Field) -> std::result::Result<AstField, ErrorKind> {
    let mut term = new_match_term(src, field)?;
    term.negate_opts = field.negate_opts.clone();
    Ok(term)
}
