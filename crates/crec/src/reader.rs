//! Streaming reader for rule document streams.
//!
//! An input may contain several YAML documents separated by `---`. Each
//! document carries a `rules:` sequence and an optional `terms:` mapping;
//! a document whose top-level `section` key is `version` is a footer and is
//! skipped. Rules and terms are aggregated across documents, with duplicate
//! detection, before tree building starts.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde_yaml::Value;

use crate::error::{Error, ErrorKind, Result};
use crate::position::NodePath;
use crate::rule::{Cre, Rule, TermDef};
use crate::tree::ParseOptions;

const DOC_RULES: &str = "rules";
const DOC_TERMS: &str = "terms";
const DOC_SECTION: &str = "section";
const DOC_VERSION: &str = "version";

/// Aggregated result of reading one input: all rules in input order plus the
/// terms index.
#[derive(Debug, Default)]
pub struct RuleSet {
    pub rules: Vec<RuleEntry>,
    pub terms: HashMap<String, TermDef>,
    pub term_paths: HashMap<String, NodePath>,
}

/// One rule plus the path used to attribute positions to it.
#[derive(Debug)]
pub struct RuleEntry {
    pub rule: Rule,
    pub path: NodePath,
}

/// Read every document in `input`, aggregating rules and terms.
pub fn read(input: &str, opts: &ParseOptions) -> Result<RuleSet> {
    let mut out = RuleSet::default();
    let mut seen_ids: HashSet<String> = HashSet::new();

    for (base_line, segment) in split_documents(input) {
        if !has_content(segment) {
            continue;
        }

        let value: Value = serde_yaml::from_str(segment).map_err(|e| {
            let mut err = Error::from(e);
            if err.pos.line > 0 {
                err.pos.line += base_line;
            }
            err
        })?;

        let text: Arc<str> = Arc::from(segment);
        let root = NodePath::root(Arc::clone(&text), base_line);

        let Some(mapping) = value.as_mapping() else {
            return Err(Error::at(root.pos(), ErrorKind::RulesSectionNotFound));
        };

        // Version footer documents carry no rules and are skipped wholesale.
        if mapping.get(key(DOC_SECTION)).and_then(Value::as_str) == Some(DOC_VERSION) {
            continue;
        }

        let Some(rules_value) = mapping.get(key(DOC_RULES)) else {
            return Err(Error::at(root.pos(), ErrorKind::RulesSectionNotFound));
        };

        let rules: Vec<Rule> = serde_yaml::from_value(rules_value.clone()).map_err(|e| {
            let mut err = Error::from(e);
            err.pos = root.key(DOC_RULES).pos();
            err
        })?;

        if !opts.gen_ids {
            check_duplicate_ids(&rules, &root, &mut seen_ids)?;
        }

        let rules_path = root.key(DOC_RULES);
        for (i, rule) in rules.into_iter().enumerate() {
            out.rules.push(RuleEntry {
                rule,
                path: rules_path.index(i),
            });
        }

        if let Some(terms_value) = mapping.get(key(DOC_TERMS)) {
            merge_terms(terms_value, &root, &mut out)?;
        }

        // Other top-level keys are ignored for forward compatibility.
    }

    Ok(out)
}

/// Map rule hash to the rule's CRE block, for consumers that only need the
/// human-facing metadata.
pub fn read_cres(input: &str) -> Result<BTreeMap<String, Cre>> {
    let set = read(input, &ParseOptions::default())?;
    Ok(set
        .rules
        .into_iter()
        .map(|entry| (entry.rule.metadata.hash, entry.rule.cre))
        .collect())
}

/// Identifier collision check across every document of the input. Empty
/// identifiers are skipped; they fail later with the missing-id errors.
fn check_duplicate_ids(
    rules: &[Rule],
    root: &NodePath,
    seen: &mut HashSet<String>,
) -> Result<()> {
    for (i, rule) in rules.iter().enumerate() {
        for id in [&rule.metadata.hash, &rule.metadata.id, &rule.cre.id] {
            if id.is_empty() {
                continue;
            }
            if !seen.insert(id.clone()) {
                log::error!("duplicate rule identifier id={id} (cre={})", rule.cre.id);
                return Err(Error::wrap(
                    root.key(DOC_RULES).index(i).pos(),
                    &rule.metadata.id,
                    &rule.metadata.hash,
                    &rule.cre.id,
                    ErrorKind::DuplicateId(id.clone()),
                ));
            }
        }
    }
    Ok(())
}

fn merge_terms(terms_value: &Value, root: &NodePath, out: &mut RuleSet) -> Result<()> {
    let terms_path = root.key(DOC_TERMS);

    let Some(mapping) = terms_value.as_mapping() else {
        log::error!("terms node is not a mapping");
        return Err(Error::at(terms_path.pos(), ErrorKind::TermsMapping));
    };

    for (name_value, body) in mapping {
        let Some(name) = name_value.as_str() else {
            return Err(Error::at(terms_path.pos(), ErrorKind::TermsMapping));
        };

        let path = terms_path.key(name);
        if out.terms.contains_key(name) {
            return Err(Error::at(
                path.pos(),
                ErrorKind::DuplicateTerm(name.to_string()),
            ));
        }

        let term: TermDef = serde_yaml::from_value(body.clone()).map_err(|e| {
            let mut err = Error::from(e);
            err.pos = path.pos();
            err
        })?;

        out.terms.insert(name.to_string(), term);
        out.term_paths.insert(name.to_string(), path);
    }

    Ok(())
}

/// Split the input into `---`-separated documents, keeping each document's
/// starting line for position attribution.
fn split_documents(input: &str) -> Vec<(u32, &str)> {
    let mut docs = Vec::new();
    let mut seg_start = 0usize;
    let mut seg_start_line = 0u32;
    let mut offset = 0usize;

    for (lineno, line) in input.split_inclusive('\n').enumerate() {
        if line.trim_end() == "---" {
            docs.push((seg_start_line, &input[seg_start..offset]));
            seg_start = offset + line.len();
            seg_start_line = lineno as u32 + 1;
        }
        offset += line.len();
    }

    docs.push((seg_start_line, &input[seg_start..]));
    docs
}

fn has_content(segment: &str) -> bool {
    segment.lines().any(|line| {
        let t = line.trim();
        !t.is_empty() && !t.starts_with('#')
    })
}

fn key(s: &str) -> Value {
    Value::String(s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_RULES: &str = "\
rules:
  - metadata:
      id: 2NEpo7TZRRrL
      hash: 8Q2mPkVx3yzA
    cre:
      id: CRE-2024-0007
    rule:
      set:
        match:
          - \"oom\"
---
rules:
  - metadata:
      id: 3FGpq8UaSSsM
      hash: 9R3nQlWy4zAB
    cre:
      id: CRE-2024-0008
    rule:
      set:
        match:
          - \"panic\"
terms:
  crash:
    set:
      event:
        source: syslog
      match:
        - \"kernel panic\"
---
section: version
version: \"1.2.3\"
";

    #[test]
    fn test_read_aggregates_documents() {
        let set = read(TWO_RULES, &ParseOptions::default()).unwrap();
        assert_eq!(set.rules.len(), 2);
        assert_eq!(set.rules[0].rule.cre.id, "CRE-2024-0007");
        assert_eq!(set.rules[1].rule.cre.id, "CRE-2024-0008");
        assert!(set.terms.contains_key("crash"));
        assert!(set.term_paths.contains_key("crash"));
    }

    #[test]
    fn test_version_footer_is_skipped() {
        // The footer document must not trip the missing-rules error.
        let set = read(TWO_RULES, &ParseOptions::default()).unwrap();
        assert_eq!(set.rules.len(), 2);
    }

    #[test]
    fn test_document_without_rules_fails() {
        let err = read("terms:\n  a:\n    value: x\n", &ParseOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::RulesSectionNotFound));
    }

    #[test]
    fn test_terms_must_be_mapping() {
        let input = "\
rules:
  - metadata:
      id: 2NEpo7TZRRrL
      hash: 8Q2mPkVx3yzA
    cre:
      id: CRE-2024-0007
    rule:
      set:
        match: [\"x\"]
terms:
  - not
  - a
  - mapping
";
        let err = read(input, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::TermsMapping));
    }

    #[test]
    fn test_duplicate_term_across_documents() {
        let input = "\
rules:
  - metadata:
      id: 2NEpo7TZRRrL
      hash: 8Q2mPkVx3yzA
    cre:
      id: CRE-2024-0007
    rule:
      set:
        match: [\"x\"]
terms:
  crash:
    value: \"a\"
---
rules: []
terms:
  crash:
    value: \"b\"
";
        let err = read(input, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DuplicateTerm(name) if name == "crash"));
    }

    #[test]
    fn test_duplicate_rule_id_across_documents() {
        let input = "\
rules:
  - metadata:
      id: 2NEpo7TZRRrL
      hash: 8Q2mPkVx3yzA
    cre:
      id: CRE-2024-0007
    rule:
      set:
        match: [\"x\"]
---
rules:
  - metadata:
      id: 2NEpo7TZRRrL
      hash: 9R3nQlWy4zAB
    cre:
      id: CRE-2024-0008
    rule:
      set:
        match: [\"y\"]
";
        let err = read(input, &ParseOptions::default()).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::DuplicateId(id) if id == "2NEpo7TZRRrL"));
    }

    #[test]
    fn test_duplicate_ids_allowed_when_generating() {
        // With id generation on, missing ids are filled in later; the
        // duplicate check is skipped entirely.
        let input = "\
rules:
  - cre:
      id: CRE-2024-0007
    rule:
      set:
        match: [\"x\"]
---
rules:
  - cre:
      id: CRE-2024-0008
    rule:
      set:
        match: [\"y\"]
";
        let opts = ParseOptions::default().with_gen_ids();
        let set = read(input, &opts).unwrap();
        assert_eq!(set.rules.len(), 2);
    }

    #[test]
    fn test_read_cres_keyed_by_hash() {
        let cres = read_cres(TWO_RULES).unwrap();
        assert_eq!(cres.len(), 2);
        assert_eq!(cres["8Q2mPkVx3yzA"].id, "CRE-2024-0007");
        assert_eq!(cres["9R3nQlWy4zAB"].id, "CRE-2024-0008");
    }

    #[test]
    fn test_split_documents_tracks_base_lines() {
        let docs = split_documents("a: 1\n---\nb: 2\n---\nc: 3\n");
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].0, 0);
        assert_eq!(docs[1].0, 2);
        assert_eq!(docs[2].0, 4);
        assert_eq!(docs[1].1, "b: 2\n");
    }
}
