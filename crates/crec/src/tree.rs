//! Parse-tree builder: rewrites each rule's document body into a recursive
//! tree of typed composite nodes and leaf matchers.
//!
//! Term references are expanded here: a child whose body is a plain string is
//! looked up in the terms index and substituted with a deep copy of the term
//! body, with reference-site negate options winning over term-site options.
//! Structural errors (shape, windows, identity) are all raised at this stage
//! with source positions attached.

use std::collections::HashMap;
use std::time::Duration;

use crate::duration;
use crate::error::{Error, ErrorKind, Pos, Result};
use crate::hash;
use crate::position::NodePath;
use crate::reader::{self, RuleSet};
use crate::rule::{
    NegateOptsDef, PromQlDef, Rule, SequenceDef, SetDef, TermDef, is_valid_base58_id,
    is_valid_cre_id, is_valid_extract_name,
};
use crate::schema::NodeType;

/// Options controlling parsing.
#[derive(Debug, Clone, Copy, Default)]
pub struct ParseOptions {
    pub(crate) gen_ids: bool,
}

impl ParseOptions {
    /// Allow rules without `metadata.id`/`metadata.hash`, synthesizing the id
    /// from the CRE id and the hash from the rule content.
    pub fn with_gen_ids(mut self) -> Self {
        self.gen_ids = true;
        self
    }
}

/// The parse tree of one compilation: one root per rule, in input order.
#[derive(Debug)]
pub struct ParseTree {
    pub roots: Vec<ParseNode>,
}

impl ParseTree {
    /// Root node of rule `idx`, in input order.
    pub fn rule(&self, idx: usize) -> Result<&ParseNode> {
        self.roots
            .get(idx)
            .ok_or_else(|| Error::new(ErrorKind::RuleNotFound))
    }
}

/// A composite parse node: a `sequence`, `set`, or `promql` block.
#[derive(Debug, Clone)]
pub struct ParseNode {
    pub metadata: NodeMetadata,
    /// Index where negated children begin; `None` when there are none.
    pub neg_idx: Option<usize>,
    pub children: Vec<ParseChild>,
}

/// Metadata attached to every composite node, inherited from the rule.
#[derive(Debug, Clone)]
pub struct NodeMetadata {
    pub rule_id: String,
    pub rule_hash: String,
    pub cre_id: String,
    pub node_type: NodeType,
    pub window: Duration,
    pub event: Option<Event>,
    pub correlations: Vec<String>,
    pub negate_opts: Option<NegateOpts>,
    pub pos: Pos,
}

/// Event descriptor of a log-flavored node.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct Event {
    pub source: String,
    pub origin: bool,
}

/// Parsed negate options: the anti-match window geometry.
#[derive(Debug, Clone, Default, serde::Serialize)]
pub struct NegateOpts {
    pub window: Duration,
    pub slide: Duration,
    pub anchor: u32,
    pub absolute: bool,
}

/// A child of a composite node: either a nested composite, a leaf matcher,
/// or a metric-expression scalar.
#[derive(Debug, Clone)]
pub enum ParseChild {
    Node(ParseNode),
    Matcher(Matcher),
    PromQl(PromQlLeaf),
}

/// A leaf matcher: positive and negated field specifications.
#[derive(Debug, Clone, Default)]
pub struct Matcher {
    pub match_fields: Vec<Field>,
    pub negate_fields: Vec<Field>,
}

/// One field specification of a leaf matcher.
#[derive(Debug, Clone)]
pub struct Field {
    pub field: String,
    pub str_value: String,
    pub jq_value: String,
    pub regex_value: String,
    pub count: usize,
    pub negate_opts: Option<NegateOpts>,
    pub extract: Vec<Extract>,
}

/// A named extraction binding on a positive field.
#[derive(Debug, Clone)]
pub struct Extract {
    pub name: String,
    pub jq_value: String,
    pub regex_value: String,
}

/// The scalar child of a `promql` node.
#[derive(Debug, Clone)]
pub struct PromQlLeaf {
    pub expr: String,
    pub for_: Duration,
    pub interval: Duration,
}

/// Decode `input` and build the parse tree for every rule it contains.
pub fn parse(input: &str, opts: &ParseOptions) -> Result<ParseTree> {
    let ruleset = reader::read(input, opts)?;
    parse_rules(ruleset, opts)
}

pub(crate) fn parse_rules(ruleset: RuleSet, opts: &ParseOptions) -> Result<ParseTree> {
    let RuleSet {
        rules,
        terms,
        term_paths,
    } = ruleset;

    let mut roots = Vec::with_capacity(rules.len());
    for entry in rules {
        let mut rule = entry.rule;

        if opts.gen_ids {
            if rule.metadata.id.is_empty() {
                rule.metadata.id = hash::id_from_cre(&rule.cre.id);
                log::warn!(
                    "rule id is empty, generated {} from cre id {}",
                    rule.metadata.id,
                    rule.cre.id
                );
            }
            if rule.metadata.hash.is_empty() {
                rule.metadata.hash = hash::hash_rule(&rule)?;
                log::warn!(
                    "rule hash is empty, generated {} from rule content (cre={})",
                    rule.metadata.hash,
                    rule.cre.id
                );
            }
        }

        roots.push(build_tree(&terms, &term_paths, &rule, &entry.path)?);
    }

    Ok(ParseTree { roots })
}

/// Build the parse tree for a single rule.
fn build_tree(
    terms: &HashMap<String, TermDef>,
    term_paths: &HashMap<String, NodePath>,
    rule: &Rule,
    rule_path: &NodePath,
) -> Result<ParseNode> {
    let mut ctx = TreeCtx {
        terms,
        term_paths,
        ids: RuleIds {
            rule_id: rule.metadata.id.clone(),
            rule_hash: rule.metadata.hash.clone(),
            cre_id: rule.cre.id.clone(),
        },
        stack: Vec::new(),
    };

    let Some(body) = rule.rule.as_ref() else {
        return Err(ctx.wrap(rule_path.pos(), ErrorKind::RuleRootNotFound));
    };

    let body_path = rule_path.key("rule");
    match (&body.sequence, &body.set) {
        (Some(seq), None) => ctx.build_sequence_node(seq, &body_path.key("sequence")),
        (None, Some(set)) => ctx.build_set_node(set, &body_path.key("set")),
        _ => Err(ctx.wrap(body_path.pos(), ErrorKind::NotSupported)),
    }
}

struct RuleIds {
    rule_id: String,
    rule_hash: String,
    cre_id: String,
}

struct TreeCtx<'a> {
    terms: &'a HashMap<String, TermDef>,
    term_paths: &'a HashMap<String, NodePath>,
    ids: RuleIds,
    /// Names of terms currently being expanded, for cycle detection.
    stack: Vec<String>,
}

impl TreeCtx<'_> {
    fn wrap(&self, pos: Pos, kind: ErrorKind) -> Error {
        Error::wrap(
            pos,
            &self.ids.rule_id,
            &self.ids.rule_hash,
            &self.ids.cre_id,
            kind,
        )
    }

    /// Validate rule identity and produce an empty node at `path`.
    fn init_node(&self, path: &NodePath) -> Result<ParseNode> {
        let pos = path.pos();

        if self.ids.rule_id.is_empty() {
            return Err(self.wrap(pos, ErrorKind::MissingRuleId));
        }
        if !is_valid_base58_id(&self.ids.rule_id) {
            return Err(self.wrap(pos, ErrorKind::InvalidRuleId));
        }
        if self.ids.rule_hash.is_empty() {
            return Err(self.wrap(pos, ErrorKind::MissingRuleHash));
        }
        if !is_valid_base58_id(&self.ids.rule_hash) {
            return Err(self.wrap(pos, ErrorKind::InvalidRuleHash));
        }
        if self.ids.cre_id.is_empty() {
            return Err(self.wrap(pos, ErrorKind::MissingCreId));
        }
        if !is_valid_cre_id(&self.ids.cre_id) {
            return Err(self.wrap(pos, ErrorKind::InvalidCreId));
        }

        Ok(ParseNode {
            metadata: NodeMetadata {
                rule_id: self.ids.rule_id.clone(),
                rule_hash: self.ids.rule_hash.clone(),
                cre_id: self.ids.cre_id.clone(),
                node_type: NodeType::MachineSeq,
                window: Duration::ZERO,
                event: None,
                correlations: Vec::new(),
                negate_opts: None,
                pos,
            },
            neg_idx: None,
            children: Vec::new(),
        })
    }

    fn build_sequence_node(&mut self, seq: &SequenceDef, path: &NodePath) -> Result<ParseNode> {
        let mut node = self.init_node(path)?;
        node.metadata.node_type = NodeType::MachineSeq;

        let order = match seq.order.as_ref().filter(|o| !o.is_empty()) {
            Some(order) => order,
            None => return Err(self.wrap(node.metadata.pos, ErrorKind::MissingOrder)),
        };

        if let Some(event) = &seq.event {
            node.metadata.node_type = NodeType::LogSeq;
            node.metadata.event = Some(Event {
                source: event.source.clone(),
                origin: event.origin,
            });
        }

        if !seq.window.is_empty() {
            // Window failures are attributed to the `window` key, not the
            // enclosing block.
            node.metadata.pos = path.key("window").pos();
            node.metadata.window = duration::parse(&seq.window)
                .ok_or_else(|| self.wrap(node.metadata.pos, ErrorKind::InvalidWindow))?;
        }

        if let Some(correlations) = &seq.correlations {
            node.metadata.correlations = correlations.clone();
        }

        let pos_children = self.build_children(&node, order, false, &path.key("order"))?;
        let neg_children = match &seq.negate {
            Some(negate) => self.build_children(&node, negate, true, &path.key("negate"))?,
            None => Vec::new(),
        };

        attach_children(&mut node, pos_children, neg_children);
        Ok(node)
    }

    fn build_set_node(&mut self, set: &SetDef, path: &NodePath) -> Result<ParseNode> {
        let mut node = self.init_node(path)?;
        node.metadata.node_type = NodeType::MachineSet;

        let Some(matches) = set.match_.as_ref() else {
            return Err(self.wrap(node.metadata.pos, ErrorKind::MissingMatch));
        };

        if let Some(event) = &set.event {
            node.metadata.node_type = NodeType::LogSet;
            node.metadata.event = Some(Event {
                source: event.source.clone(),
                origin: event.origin,
            });
        }

        if !set.window.is_empty() {
            node.metadata.pos = path.key("window").pos();
            node.metadata.window = duration::parse(&set.window)
                .ok_or_else(|| self.wrap(node.metadata.pos, ErrorKind::InvalidWindow))?;
        }

        if let Some(correlations) = &set.correlations {
            node.metadata.correlations = correlations.clone();
        }

        let pos_children = self.build_children(&node, matches, false, &path.key("match"))?;
        let neg_children = match &set.negate {
            Some(negate) => self.build_children(&node, negate, true, &path.key("negate"))?,
            None => Vec::new(),
        };

        attach_children(&mut node, pos_children, neg_children);
        Ok(node)
    }

    /// Build one polarity group of children, resolving term references.
    fn build_children(
        &mut self,
        parent: &ParseNode,
        terms: &[TermDef],
        negated: bool,
        base: &NodePath,
    ) -> Result<Vec<ParseChild>> {
        let mut children = Vec::with_capacity(terms.len());

        for (i, term) in terms.iter().enumerate() {
            let item_path = base.index(i);

            let child = if !term.str_value.is_empty() && self.terms.contains_key(&term.str_value) {
                let name = term.str_value.clone();
                if self.stack.contains(&name) {
                    return Err(self.wrap(item_path.pos(), ErrorKind::RecursiveTerm(name)));
                }

                let mut resolved = self.terms[&name].clone();
                if term.negate_opts.is_some() {
                    // Reference-site negate options win over term-site ones.
                    resolved.negate_opts = term.negate_opts.clone();
                }

                let term_path = match self.term_paths.get(&name) {
                    Some(path) => path.clone(),
                    None => return Err(self.wrap(parent.metadata.pos, ErrorKind::TermNotFound)),
                };

                self.stack.push(name);
                let child = self.node_from_term(parent, &resolved, negated, &term_path);
                self.stack.pop();
                child?
            } else {
                self.node_from_term(parent, term, negated, &item_path)?
            };

            children.push(child);
        }

        Ok(children)
    }

    /// Classify a term body: nested composite, metric expression, leaf
    /// matcher value, or unrecognizable.
    fn node_from_term(
        &mut self,
        parent: &ParseNode,
        term: &TermDef,
        negated: bool,
        path: &NodePath,
    ) -> Result<ParseChild> {
        if let Some(seq) = term.sequence.as_deref() {
            let mut node = self.build_sequence_node(seq, &path.key("sequence"))?;
            if let Some(opts) = &term.negate_opts {
                node.metadata.negate_opts = Some(self.parse_negate_opts(opts, path)?);
            }
            return Ok(ParseChild::Node(node));
        }

        if let Some(set) = term.set.as_deref() {
            let mut node = self.build_set_node(set, &path.key("set"))?;
            if let Some(opts) = &term.negate_opts {
                node.metadata.negate_opts = Some(self.parse_negate_opts(opts, path)?);
            }
            return Ok(ParseChild::Node(node));
        }

        if let Some(promql) = &term.promql {
            let node = self.build_promql_node(promql, &path.key("promql"))?;
            return Ok(ParseChild::Node(node));
        }

        if !term.str_value.is_empty() || !term.jq_value.is_empty() || !term.regex_value.is_empty() {
            return Ok(ParseChild::Matcher(self.leaf_matcher(term, negated, path)?));
        }

        if term.negate_opts.is_some() {
            // Negate options with nothing to attach them to, e.g. a dangling
            // window-only entry.
            return Err(self.wrap(path.pos(), ErrorKind::InvalidWindow));
        }

        Err(self.wrap(path.pos(), ErrorKind::TermNotFound))
    }

    fn build_promql_node(&mut self, def: &PromQlDef, path: &NodePath) -> Result<ParseNode> {
        let mut node = self.init_node(path)?;
        node.metadata.node_type = NodeType::PromQl;

        if let Some(event) = &def.event {
            node.metadata.event = Some(Event {
                source: event.source.clone(),
                origin: event.origin,
            });
        }

        let for_ = self.parse_optional_duration(&def.for_, &path.key("for"))?;
        let interval = self.parse_optional_duration(&def.interval, &path.key("interval"))?;

        node.children.push(ParseChild::PromQl(PromQlLeaf {
            expr: def.expr.clone(),
            for_,
            interval,
        }));
        Ok(node)
    }

    fn parse_optional_duration(&self, value: &str, path: &NodePath) -> Result<Duration> {
        if value.is_empty() {
            return Ok(Duration::ZERO);
        }
        duration::parse(value).ok_or_else(|| self.wrap(path.pos(), ErrorKind::InvalidWindow))
    }

    fn parse_negate_opts(&self, def: &NegateOptsDef, path: &NodePath) -> Result<NegateOpts> {
        let negate_path = path.key("negate");
        Ok(NegateOpts {
            window: self.parse_optional_duration(&def.window, &negate_path)?,
            slide: self.parse_optional_duration(&def.slide, &negate_path)?,
            anchor: def.anchor,
            absolute: def.absolute,
        })
    }

    /// Lower a scalar term into a leaf matcher with one field.
    fn leaf_matcher(&self, term: &TermDef, negated: bool, path: &NodePath) -> Result<Matcher> {
        let mut matcher = Matcher::default();

        if negated {
            let negate_opts = match &term.negate_opts {
                Some(opts) => Some(self.parse_negate_opts(opts, path)?),
                None => None,
            };
            matcher.negate_fields.push(Field {
                field: term.field.clone(),
                str_value: term.str_value.clone(),
                jq_value: term.jq_value.clone(),
                regex_value: term.regex_value.clone(),
                count: term.count,
                negate_opts,
                extract: Vec::new(),
            });
        } else {
            let mut extract = Vec::new();
            for e in &term.extract {
                if !is_valid_extract_name(&e.name) {
                    return Err(self.wrap(path.pos(), ErrorKind::ExtractName));
                }
                extract.push(Extract {
                    name: e.name.clone(),
                    jq_value: e.jq_value.clone(),
                    regex_value: e.regex_value.clone(),
                });
            }
            matcher.match_fields.push(Field {
                field: term.field.clone(),
                str_value: term.str_value.clone(),
                jq_value: term.jq_value.clone(),
                regex_value: term.regex_value.clone(),
                count: term.count,
                negate_opts: None,
                extract,
            });
        }

        Ok(matcher)
    }
}

fn attach_children(node: &mut ParseNode, pos: Vec<ParseChild>, neg: Vec<ParseChild>) {
    node.neg_idx = if neg.is_empty() {
        None
    } else {
        Some(pos.len())
    };
    node.children = pos;
    node.children.extend(neg);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids_block(cre: &str, id: &str, hash: &str) -> String {
        format!(
            "    metadata:\n      id: {id}\n      hash: {hash}\n    cre:\n      id: {cre}\n"
        )
    }

    fn one_rule(body: &str) -> String {
        let mut doc = String::from("rules:\n  -\n");
        doc.push_str(&ids_block("CRE-2024-0007", "2NEpo7TZRRrL", "8Q2mPkVx3yzA"));
        doc.push_str("    rule:\n");
        doc.push_str(body);
        doc
    }

    #[test]
    fn test_simple_sequence_shape() {
        let input = one_rule(
            "      sequence:\n        window: 10s\n        order:\n          - \"a\"\n          - \"b\"\n",
        );
        let tree = parse(&input, &ParseOptions::default()).unwrap();
        assert_eq!(tree.roots.len(), 1);

        let root = &tree.roots[0];
        assert_eq!(root.metadata.node_type, NodeType::MachineSeq);
        assert_eq!(root.metadata.window, Duration::from_secs(10));
        assert_eq!(root.neg_idx, None);
        assert_eq!(root.children.len(), 2);
        assert!(matches!(root.children[0], ParseChild::Matcher(_)));
    }

    #[test]
    fn test_event_promotes_to_log_flavor() {
        let input = one_rule(
            "      sequence:\n        window: 10s\n        event:\n          source: syslog\n          origin: true\n        order:\n          - \"a\"\n          - \"b\"\n",
        );
        let tree = parse(&input, &ParseOptions::default()).unwrap();
        let root = &tree.roots[0];
        assert_eq!(root.metadata.node_type, NodeType::LogSeq);
        let event = root.metadata.event.as_ref().unwrap();
        assert_eq!(event.source, "syslog");
        assert!(event.origin);
    }

    #[test]
    fn test_neg_idx_splits_children() {
        let input = one_rule(
            "      set:\n        window: 5s\n        match:\n          - \"a\"\n          - \"b\"\n        negate:\n          - \"c\"\n",
        );
        let tree = parse(&input, &ParseOptions::default()).unwrap();
        let root = &tree.roots[0];
        assert_eq!(root.metadata.node_type, NodeType::MachineSet);
        assert_eq!(root.neg_idx, Some(2));
        assert_eq!(root.children.len(), 3);
    }

    #[test]
    fn test_missing_order() {
        let input = one_rule("      sequence:\n        window: 10s\n        order: []\n");
        let err = parse(&input, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MissingOrder));
        assert_eq!(err.cre_id, "CRE-2024-0007");
    }

    #[test]
    fn test_missing_match() {
        let input = one_rule("      set:\n        window: 10s\n");
        let err = parse(&input, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MissingMatch));
    }

    #[test]
    fn test_neither_sequence_nor_set() {
        let input = one_rule("      {}\n");
        let err = parse(&input, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NotSupported));
    }

    #[test]
    fn test_both_sequence_and_set_rejected() {
        let input = one_rule(
            "      sequence:\n        order: [\"a\", \"b\"]\n      set:\n        match: [\"c\"]\n",
        );
        let err = parse(&input, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::NotSupported));
    }

    #[test]
    fn test_missing_rule_root() {
        let mut input = String::from("rules:\n  -\n");
        input.push_str(&ids_block("CRE-2024-0007", "2NEpo7TZRRrL", "8Q2mPkVx3yzA"));
        let err = parse(&input, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RuleRootNotFound));
    }

    #[test]
    fn test_invalid_window_points_at_window_key() {
        let input = one_rule(
            "      sequence:\n        window: banana\n        order:\n          - \"a\"\n          - \"b\"\n",
        );
        let err = parse(&input, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidWindow));
        // `window:` is on line 10 of the assembled document.
        assert_eq!(err.pos.line, 10);
    }

    #[test]
    fn test_term_reference_expansion() {
        let mut input = one_rule(
            "      sequence:\n        window: 30s\n        order:\n          - crash\n          - \"b\"\n",
        );
        input.push_str(
            "terms:\n  crash:\n    set:\n      event:\n        source: syslog\n      match:\n        - \"kernel panic\"\n",
        );
        let tree = parse(&input, &ParseOptions::default()).unwrap();
        let root = &tree.roots[0];
        assert_eq!(root.children.len(), 2);
        match &root.children[0] {
            ParseChild::Node(node) => {
                assert_eq!(node.metadata.node_type, NodeType::LogSet);
                assert_eq!(node.metadata.event.as_ref().unwrap().source, "syslog");
            }
            other => panic!("expected expanded term node, got {other:?}"),
        }
        // The unresolved string stays a raw matcher.
        assert!(matches!(root.children[1], ParseChild::Matcher(_)));
    }

    #[test]
    fn test_reference_site_negate_opts_override() {
        let mut input = one_rule(
            "      sequence:\n        window: 30s\n        order:\n          - \"a\"\n          - \"b\"\n        negate:\n          - value: quiet\n            negate:\n              window: 45s\n",
        );
        input.push_str(
            "terms:\n  quiet:\n    set:\n      event:\n        source: syslog\n      match:\n        - \"all clear\"\n",
        );
        let tree = parse(&input, &ParseOptions::default()).unwrap();
        let root = &tree.roots[0];
        assert_eq!(root.neg_idx, Some(2));
        match &root.children[2] {
            ParseChild::Node(node) => {
                let opts = node.metadata.negate_opts.as_ref().expect("negate opts");
                assert_eq!(opts.window, Duration::from_secs(45));
            }
            other => panic!("expected expanded negate node, got {other:?}"),
        }
    }

    #[test]
    fn test_recursive_term_fails() {
        let mut input = one_rule(
            "      sequence:\n        window: 30s\n        order:\n          - loop\n          - \"b\"\n",
        );
        input.push_str(
            "terms:\n  loop:\n    sequence:\n      window: 10s\n      order:\n        - loop\n        - \"x\"\n",
        );
        let err = parse(&input, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RecursiveTerm(name) if name == "loop"));
    }

    #[test]
    fn test_dangling_negate_opts_is_invalid_window() {
        let input = one_rule(
            "      set:\n        match:\n          - \"a\"\n        negate:\n          - negate:\n              window: 5s\n",
        );
        let err = parse(&input, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidWindow));
    }

    #[test]
    fn test_unresolvable_leaf_is_term_not_found() {
        let input = one_rule("      set:\n        match:\n          - count: 3\n");
        let err = parse(&input, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TermNotFound));
    }

    #[test]
    fn test_extract_name_validation() {
        let input = one_rule(
            "      set:\n        match:\n          - value: \"evicted\"\n            extract:\n              - name: 1bad\n                regex: \"pod (.*)\"\n",
        );
        let err = parse(&input, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::ExtractName));
    }

    #[test]
    fn test_missing_rule_id_without_gen() {
        let input = "\
rules:
  - cre:
      id: CRE-2024-0007
    rule:
      set:
        match:
          - \"a\"
";
        let err = parse(input, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::MissingRuleId));
    }

    #[test]
    fn test_gen_ids_synthesizes_identity() {
        let input = "\
rules:
  - cre:
      id: CRE-2024-0007
    rule:
      set:
        match:
          - \"a\"
";
        let opts = ParseOptions::default().with_gen_ids();
        let tree = parse(input, &opts).unwrap();
        let meta = &tree.roots[0].metadata;
        assert!(is_valid_base58_id(&meta.rule_id));
        assert!(is_valid_base58_id(&meta.rule_hash));
        assert_eq!(meta.rule_id, hash::id_from_cre("CRE-2024-0007"));
    }

    #[test]
    fn test_invalid_rule_id_rejected() {
        let mut input = String::from("rules:\n  -\n");
        input.push_str(&ids_block("CRE-2024-0007", "not-base58!", "8Q2mPkVx3yzA"));
        input.push_str("    rule:\n      set:\n        match: [\"a\"]\n");
        let err = parse(&input, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::InvalidRuleId));
    }

    #[test]
    fn test_rule_index_out_of_bounds() {
        let input = one_rule("      set:\n        match: [\"a\"]\n");
        let tree = parse(&input, &ParseOptions::default()).unwrap();
        assert!(tree.rule(0).is_ok());
        let err = tree.rule(5).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RuleNotFound));
    }
}
