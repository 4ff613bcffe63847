//! # crec
//!
//! Compiler for CRE detection rules: ingests declarative YAML rule documents
//! and produces a validated, address-stable AST for downstream execution
//! engines (log-stream matchers, metric evaluators, correlation runtimes).
//!
//! Compilation runs in two stages:
//!
//! - **Parse stage** — decode the document stream into a parse tree of typed
//!   composite nodes (`sequence`, `set`, matcher leaves) with source-position
//!   tracking, expanding named term references along the way.
//! - **AST stage** — rewrite the parse tree into a normalized forest of
//!   *machine* and *log-matcher* nodes, validate semantic invariants
//!   (window/positive-condition coupling, minimum arities, source-field
//!   compatibility), and compute deterministic per-node addresses.
//!
//! The compiler is a pure, single-threaded transformer: no I/O, no shared
//! state, and byte-identical output for identical input.
//!
//! ## Quick Start
//!
//! ```rust
//! use crec::{NodeType, build};
//!
//! let yaml = r#"
//! rules:
//!   - metadata:
//!       id: 2NEpo7TZRRrL
//!       hash: 8Q2mPkVx3yzA
//!     cre:
//!       id: CRE-2024-0007
//!     rule:
//!       sequence:
//!         window: 30s
//!         event:
//!           source: systemd
//!         order:
//!           - "unit entered failed state"
//!           - "start request repeated too quickly"
//! "#;
//!
//! let forest = build(yaml).unwrap();
//! assert_eq!(forest.roots.len(), 1);
//!
//! let root = &forest.roots[0];
//! assert_eq!(root.node_type, NodeType::MachineSeq);
//! assert!(root.parent_address.is_none());
//! assert_eq!(root.children[0].node_type, NodeType::LogSeq);
//! ```
//!
//! ## Errors
//!
//! Every failure carries the source position and rule identity of the node
//! that raised it; match on [`Error::kind`] to distinguish failure classes:
//!
//! ```rust
//! use crec::{ErrorKind, build};
//!
//! let yaml = "\
//! rules:
//!   - cre:
//!       id: CRE-2024-0007
//!     rule:
//!       set:
//!         match: [\"oom\"]
//! ";
//! let err = build(yaml).unwrap_err();
//! assert!(matches!(err.kind(), ErrorKind::MissingRuleId));
//! ```

pub mod ast;
pub mod duration;
pub mod error;
pub mod hash;
pub mod position;
pub mod reader;
pub mod render;
pub mod rule;
pub mod schema;
pub mod tree;

// Re-export the most commonly used types and functions at crate root
pub use ast::{
    AstEvent, AstField, AstForest, AstMetadata, AstNode, AstObject, LogMatcher, Machine,
    NodeAddress, PromQl, TermValue, build, build_forest, build_with,
};
pub use error::{Error, ErrorKind, Pos, Result};
pub use hash::{hash_rule, stable_hash};
pub use reader::{RuleSet, read_cres};
pub use render::draw_tree;
pub use rule::{Cre, Metadata, Rule};
pub use schema::{NodeType, Scope};
pub use tree::{
    Matcher, NegateOpts, ParseChild, ParseNode, ParseOptions, ParseTree, parse,
};
