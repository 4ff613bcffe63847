//! Serde model for the rule document grammar.
//!
//! A document is a mapping with a `rules:` sequence and an optional `terms:`
//! mapping. Unknown keys at any level are ignored for forward compatibility.
//! These types are also the canonical serialization used for content hashing,
//! so field order is load-bearing.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

static CRE_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9-]{4,}$").expect("cre id regex"));
static BASE58_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[1-9A-Za-z]{12,}$").expect("base58 id regex"));
static EXTRACT_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_]*$").expect("extract name regex"));

/// Returns `true` if `s` is a well-formed base58 rule id or hash.
pub fn is_valid_base58_id(s: &str) -> bool {
    BASE58_ID_RE.is_match(s)
}

/// Returns `true` if `s` is a well-formed CRE id.
pub fn is_valid_cre_id(s: &str) -> bool {
    CRE_ID_RE.is_match(s)
}

/// Returns `true` if `s` is a well-formed extract binding name.
pub fn is_valid_extract_name(s: &str) -> bool {
    EXTRACT_NAME_RE.is_match(s)
}

/// A single rule document entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Rule {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub cre: Cre,
    #[serde(default)]
    pub rule: Option<RuleBody>,
}

/// Rule identity and versioning metadata.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub hash: String,
    #[serde(default)]
    pub cre: String,
    #[serde(default, rename = "gen")]
    pub generation: u32,
    #[serde(default)]
    pub version: String,
}

/// The CRE block: the human-facing identity plus descriptive metadata carried
/// through to consumers of [`crate::read_cres`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cre {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

/// The `rule:` section. Exactly one of `sequence` or `set` must be populated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<SequenceDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<SetDef>,
}

/// An ordered-occurrence composite: `order` entries must match in order
/// within `window`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SequenceDef {
    #[serde(default)]
    pub window: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventDef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<Vec<TermDef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negate: Option<Vec<TermDef>>,
}

/// An unordered-occurrence composite: `match` entries may match in any order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SetDef {
    #[serde(default)]
    pub window: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correlations: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventDef>,
    #[serde(default, rename = "match", skip_serializing_if = "Option::is_none")]
    pub match_: Option<Vec<TermDef>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub negate: Option<Vec<TermDef>>,
}

/// Event descriptor attached to log-flavored composites.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EventDef {
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub origin: bool,
}

/// A child of `order`/`match`/`negate`, or the body of a named term.
///
/// A plain string deserializes as a term reference (or literal string value);
/// a mapping may carry a nested composite or a field specification.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(from = "TermRepr")]
pub struct TermDef {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sequence: Option<Box<SequenceDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub set: Option<Box<SetDef>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub promql: Option<PromQlDef>,
    pub field: String,
    #[serde(rename = "value")]
    pub str_value: String,
    #[serde(rename = "jq")]
    pub jq_value: String,
    #[serde(rename = "regex")]
    pub regex_value: String,
    pub count: usize,
    #[serde(rename = "negate", skip_serializing_if = "Option::is_none")]
    pub negate_opts: Option<NegateOptsDef>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extract: Vec<ExtractDef>,
}

impl Default for TermDef {
    fn default() -> Self {
        TermDef {
            sequence: None,
            set: None,
            promql: None,
            field: String::new(),
            str_value: String::new(),
            jq_value: String::new(),
            regex_value: String::new(),
            count: default_count(),
            negate_opts: None,
            extract: Vec::new(),
        }
    }
}

fn default_count() -> usize {
    1
}

/// Accepts both the shorthand string form (`- "term name"`) and the full
/// mapping form of a term.
#[derive(Deserialize)]
#[serde(untagged)]
enum TermRepr {
    Str(String),
    Full {
        #[serde(default)]
        sequence: Option<Box<SequenceDef>>,
        #[serde(default)]
        set: Option<Box<SetDef>>,
        #[serde(default)]
        promql: Option<PromQlDef>,
        #[serde(default)]
        field: String,
        #[serde(default, rename = "value")]
        value: String,
        #[serde(default, rename = "jq")]
        jq: String,
        #[serde(default, rename = "regex")]
        regex: String,
        #[serde(default = "default_count")]
        count: usize,
        #[serde(default, rename = "negate")]
        negate: Option<NegateOptsDef>,
        #[serde(default)]
        extract: Vec<ExtractDef>,
    },
}

impl From<TermRepr> for TermDef {
    fn from(repr: TermRepr) -> Self {
        match repr {
            TermRepr::Str(s) => TermDef {
                str_value: s,
                ..TermDef::default()
            },
            TermRepr::Full {
                sequence,
                set,
                promql,
                field,
                value,
                jq,
                regex,
                count,
                negate,
                extract,
            } => TermDef {
                sequence,
                set,
                promql,
                field,
                str_value: value,
                jq_value: jq,
                regex_value: regex,
                count,
                negate_opts: negate,
                extract,
            },
        }
    }
}

/// Options attached to negated children: the anti-match window geometry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NegateOptsDef {
    #[serde(default)]
    pub window: String,
    #[serde(default)]
    pub slide: String,
    #[serde(default)]
    pub anchor: u32,
    #[serde(default)]
    pub absolute: bool,
}

/// A named extraction binding on a leaf matcher.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExtractDef {
    #[serde(default)]
    pub name: String,
    #[serde(default, rename = "jq")]
    pub jq_value: String,
    #[serde(default, rename = "regex")]
    pub regex_value: String,
}

/// A metric-expression term body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromQlDef {
    #[serde(default)]
    pub expr: String,
    #[serde(default, rename = "for")]
    pub for_: String,
    #[serde(default)]
    pub interval: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event: Option<EventDef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_validators() {
        assert!(is_valid_cre_id("CRE-2024-0007"));
        assert!(is_valid_cre_id("abcd"));
        assert!(!is_valid_cre_id("ab"));
        assert!(!is_valid_cre_id("has space"));

        assert!(is_valid_base58_id("2NEpo7TZRRrL"));
        assert!(!is_valid_base58_id("short"));
        assert!(!is_valid_base58_id("has-dash-1234"));
        assert!(!is_valid_base58_id("contains0zero"));

        assert!(is_valid_extract_name("pod_name"));
        assert!(is_valid_extract_name("X1"));
        assert!(!is_valid_extract_name("1pod"));
        assert!(!is_valid_extract_name("pod-name"));
    }

    #[test]
    fn test_term_from_string_form() {
        let term: TermDef = serde_yaml::from_str("\"unit entered failed state\"").unwrap();
        assert_eq!(term.str_value, "unit entered failed state");
        assert_eq!(term.count, 1);
        assert!(term.sequence.is_none());
    }

    #[test]
    fn test_term_from_mapping_form() {
        let yaml = "value: \"Discarding message\"\ncount: 10\n";
        let term: TermDef = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(term.str_value, "Discarding message");
        assert_eq!(term.count, 10);
    }

    #[test]
    fn test_term_nested_composite() {
        let yaml = "\
set:
  window: 5s
  event:
    source: syslog
  match:
    - \"oom\"
    - \"killed\"
";
        let term: TermDef = serde_yaml::from_str(yaml).unwrap();
        let set = term.set.expect("set");
        assert_eq!(set.window, "5s");
        assert_eq!(set.event.as_ref().unwrap().source, "syslog");
        assert_eq!(set.match_.as_ref().unwrap().len(), 2);
    }

    #[test]
    fn test_rule_unknown_keys_ignored() {
        let yaml = "\
metadata:
  id: 2NEpo7TZRRrL
  hash: 8Q2mPkVx3yzA
  future_field: whatever
cre:
  id: CRE-2024-0007
rule:
  set:
    match:
      - \"oom\"
";
        let rule: Rule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.metadata.id, "2NEpo7TZRRrL");
        assert!(rule.rule.unwrap().set.is_some());
    }

    #[test]
    fn test_negate_opts_defaults() {
        let yaml = "negate:\n  window: 30s\n";
        let term: TermDef = serde_yaml::from_str(yaml).unwrap();
        let opts = term.negate_opts.expect("negate opts");
        assert_eq!(opts.window, "30s");
        assert_eq!(opts.slide, "");
        assert_eq!(opts.anchor, 0);
        assert!(!opts.absolute);
    }
}
