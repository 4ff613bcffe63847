//! Content hashing and identifier generation.
//!
//! Rule identity is content-derived: the rule is serialized to canonical JSON
//! (struct field order, no maps) and digested with SHA-256; the digest is
//! base58-encoded so it satisfies the rule-id alphabet. Generated rule ids
//! use SHA-1 over the CRE id, matching the shorter id format.

use sha1::Sha1;
use sha2::{Digest, Sha256};

use crate::error::Result;
use crate::rule::Rule;

/// Content hash of a rule. `metadata.hash` is zeroed first since it is the
/// value being derived.
pub fn hash_rule(rule: &Rule) -> Result<String> {
    let mut rule = rule.clone();
    rule.metadata.hash.clear();
    canonical_hash(&rule)
}

/// Stable content hash of a rule, suitable for dedup across revisions.
///
/// Zeroes `metadata.gen` and `metadata.version` in addition to the hash:
/// both are bumped on publication without changing what the rule means.
/// `metadata.id` stays in — it is part of the rule's identity.
pub fn stable_hash(rule: &Rule) -> Result<String> {
    let mut rule = rule.clone();
    rule.metadata.generation = 0;
    rule.metadata.version.clear();
    rule.metadata.hash.clear();
    canonical_hash(&rule)
}

/// Generate a rule id from a CRE id.
pub fn id_from_cre(cre_id: &str) -> String {
    let digest = Sha1::digest(cre_id.as_bytes());
    bs58::encode(digest).into_string()
}

fn canonical_hash(rule: &Rule) -> Result<String> {
    let bytes = serde_json::to_vec(rule)?;
    let digest = Sha256::digest(&bytes);
    Ok(bs58::encode(digest).into_string())
}
