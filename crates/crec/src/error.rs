use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Source location within a rule document. Line and column are 1-indexed;
/// `0:0` means the position could not be attributed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Pos {
    pub line: u32,
    pub col: u32,
}

impl Pos {
    pub fn new(line: u32, col: u32) -> Self {
        Pos { line, col }
    }
}

impl fmt::Display for Pos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Sentinel causes for compilation failures.
///
/// Every failure surfaced by the compiler wraps one of these inside an
/// [`Error`], which adds the source position and rule identity. Callers
/// pattern-match on [`Error::kind`] to distinguish failure classes.
#[derive(Debug, Error)]
pub enum ErrorKind {
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rules not found")]
    RulesSectionNotFound,

    #[error("rule not found")]
    RuleNotFound,

    #[error("missing rule section")]
    RuleRootNotFound,

    #[error("not supported")]
    NotSupported,

    #[error("term not found")]
    TermNotFound,

    #[error("recursive term reference '{0}'")]
    RecursiveTerm(String),

    #[error("'sequence' missing 'order'")]
    MissingOrder,

    #[error("'set' missing 'match'")]
    MissingMatch,

    #[error("invalid 'window'")]
    InvalidWindow,

    #[error("'terms' must be a mapping")]
    TermsMapping,

    #[error("duplicate term name '{0}'")]
    DuplicateTerm(String),

    #[error("duplicate id '{0}'")]
    DuplicateId(String),

    #[error("missing rule id")]
    MissingRuleId,

    #[error("missing rule hash")]
    MissingRuleHash,

    #[error("missing cre id")]
    MissingCreId,

    #[error("invalid cre id")]
    InvalidCreId,

    #[error("invalid rule id (must be base58)")]
    InvalidRuleId,

    #[error("invalid rule hash (must be base58)")]
    InvalidRuleHash,

    #[error("invalid extract name (alphanumeric and underscores only)")]
    ExtractName,

    #[error("unknown source field")]
    UnknownField,

    #[error("unknown source")]
    UnknownSrc,

    #[error("sequences require two or more positive conditions")]
    SeqPosConditions,

    #[error("invalid node type")]
    InvalidNodeType,

    #[error("missing string, jq, or regex condition")]
    MissingScalar,
}

/// A compilation error: a sentinel cause plus the position and rule identity
/// of the node that raised it.
///
/// The identity fields may be empty when the failure happens before the rule
/// is identified (e.g. a YAML decode error). The cause is exposed through
/// [`Error::kind`] and through [`std::error::Error::source`].
#[derive(Debug)]
pub struct Error {
    pub pos: Pos,
    pub rule_id: String,
    pub rule_hash: String,
    pub cre_id: String,
    pub msg: Option<String>,
    kind: ErrorKind,
}

impl Error {
    /// Wrap a cause with no position or rule identity.
    pub fn new(kind: ErrorKind) -> Self {
        Error {
            pos: Pos::default(),
            rule_id: String::new(),
            rule_hash: String::new(),
            cre_id: String::new(),
            msg: None,
            kind,
        }
    }

    /// Wrap a cause at a known position, before rule identity is available.
    pub fn at(pos: Pos, kind: ErrorKind) -> Self {
        Error {
            pos,
            ..Error::new(kind)
        }
    }

    /// Wrap a cause with full attribution.
    pub fn wrap(pos: Pos, rule_id: &str, rule_hash: &str, cre_id: &str, kind: ErrorKind) -> Self {
        Error {
            pos,
            rule_id: rule_id.to_string(),
            rule_hash: rule_hash.to_string(),
            cre_id: cre_id.to_string(),
            msg: None,
            kind,
        }
    }

    pub fn with_msg(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }

    /// The sentinel cause.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line={}, col={}", self.pos.line, self.pos.col)?;
        if !self.cre_id.is_empty() {
            write!(f, ", cre_id={}", self.cre_id)?;
        }
        if !self.rule_id.is_empty() {
            write!(f, ", rule_id={}", self.rule_id)?;
        }
        if !self.rule_hash.is_empty() {
            write!(f, ", rule_hash={}", self.rule_hash)?;
        }
        if let Some(msg) = &self.msg {
            write!(f, ": {msg}")?;
        }
        write!(f, ": {}", self.kind)
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.kind)
    }
}

impl From<serde_yaml::Error> for Error {
    fn from(err: serde_yaml::Error) -> Self {
        let pos = err
            .location()
            .map(|loc| Pos::new(loc.line() as u32, loc.column() as u32))
            .unwrap_or_default();
        Error::at(pos, ErrorKind::Yaml(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::new(ErrorKind::Json(err))
    }
}

/// Convenience result type.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_identity() {
        let err = Error::wrap(
            Pos::new(7, 3),
            "2NEpo7TZRRrL",
            "8Q2mPkVx3yzA",
            "CRE-2024-0007",
            ErrorKind::InvalidWindow,
        );
        let text = err.to_string();
        assert!(text.contains("line=7, col=3"));
        assert!(text.contains("cre_id=CRE-2024-0007"));
        assert!(text.contains("rule_id=2NEpo7TZRRrL"));
        assert!(text.contains("rule_hash=8Q2mPkVx3yzA"));
        assert!(text.contains("invalid 'window'"));
    }

    #[test]
    fn test_source_exposes_kind() {
        use std::error::Error as _;

        let err = Error::new(ErrorKind::MissingOrder);
        let cause = err.source().expect("cause");
        assert!(cause.to_string().contains("missing 'order'"));
        assert!(matches!(err.kind(), ErrorKind::MissingOrder));
    }

    #[test]
    fn test_empty_identity_omitted_from_display() {
        let err = Error::at(Pos::new(1, 1), ErrorKind::TermsMapping);
        let text = err.to_string();
        assert!(!text.contains("cre_id"));
        assert!(!text.contains("rule_id"));
    }
}
