//! Best-effort source-position resolution for YAML documents.
//!
//! `serde_yaml` values carry no source markers, so positions are recovered by
//! scanning the raw document text for the path of keys and list indices that
//! leads to a node. Resolution is indentation-based and deliberately
//! approximate: block scalars containing look-alike keys can shift a match,
//! in which case the nearest resolved ancestor is reported instead.

use std::sync::Arc;

use crate::error::Pos;

/// One step of a YAML path: a mapping key or a sequence index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Seg {
    Key(String),
    Index(usize),
}

/// A path into one YAML document, carrying the document text and the line
/// offset of the document within the input stream.
///
/// Paths are cheap to extend; the text is shared. Position resolution happens
/// on demand via [`NodePath::pos`].
#[derive(Debug, Clone)]
pub struct NodePath {
    text: Arc<str>,
    base_line: u32,
    segs: Vec<Seg>,
}

impl NodePath {
    /// Path to the root of a document starting at 0-indexed `base_line` of
    /// the input stream.
    pub fn root(text: Arc<str>, base_line: u32) -> Self {
        NodePath {
            text,
            base_line,
            segs: Vec::new(),
        }
    }

    /// Extend the path with a mapping key.
    pub fn key(&self, key: &str) -> Self {
        let mut segs = self.segs.clone();
        segs.push(Seg::Key(key.to_string()));
        NodePath {
            text: Arc::clone(&self.text),
            base_line: self.base_line,
            segs,
        }
    }

    /// Extend the path with a sequence index.
    pub fn index(&self, idx: usize) -> Self {
        let mut segs = self.segs.clone();
        segs.push(Seg::Index(idx));
        NodePath {
            text: Arc::clone(&self.text),
            base_line: self.base_line,
            segs,
        }
    }

    /// Resolve the path to a 1-indexed position in the input stream.
    ///
    /// Falls back to the nearest resolved ancestor, and to the first line of
    /// the document when nothing matches.
    pub fn pos(&self) -> Pos {
        match resolve(&self.text, &self.segs) {
            Some((line, col)) => Pos::new(self.base_line + line as u32 + 1, col as u32 + 1),
            None => Pos::new(self.base_line + 1, 1),
        }
    }
}

/// Walk `segs` through `text`, returning the 0-indexed (line, column) of the
/// deepest segment that could be located.
fn resolve(text: &str, segs: &[Seg]) -> Option<(usize, usize)> {
    let lines: Vec<&str> = text.lines().collect();
    let mut cur_indent: i32 = -1;
    let mut scan_from = 0usize;
    let mut best: Option<(usize, usize)> = None;

    for seg in segs {
        match seg {
            Seg::Key(key) => {
                let mut found = false;
                let mut i = scan_from;
                while i < lines.len() {
                    let Some((body, indent)) = significant(lines[i]) else {
                        i += 1;
                        continue;
                    };
                    // A bare `-` item marker carries no key.
                    if body == "-" {
                        i += 1;
                        continue;
                    }
                    // Keys inside list items appear after `- ` markers.
                    let (body, indent) = strip_item_markers(body, indent);
                    if (indent as i32) <= cur_indent {
                        break;
                    }
                    if body.starts_with(key.as_str()) && body[key.len()..].starts_with(':') {
                        best = Some((i, indent));
                        cur_indent = indent as i32;
                        scan_from = i + 1;
                        found = true;
                        break;
                    }
                    i += 1;
                }
                if !found {
                    return best;
                }
            }
            Seg::Index(want) => {
                let mut found = false;
                let mut item_indent: Option<usize> = None;
                let mut count = 0usize;
                let mut i = scan_from;
                while i < lines.len() {
                    let Some((body, indent)) = significant(lines[i]) else {
                        i += 1;
                        continue;
                    };
                    if (indent as i32) <= cur_indent {
                        break;
                    }
                    if body == "-" || body.starts_with("- ") {
                        let item_indent = *item_indent.get_or_insert(indent);
                        if indent == item_indent {
                            if count == *want {
                                best = Some((i, indent + 2));
                                cur_indent = indent as i32;
                                // Stay on the item line: a mapping value may
                                // start right after the `- ` marker.
                                scan_from = i;
                                found = true;
                                break;
                            }
                            count += 1;
                        }
                    }
                    i += 1;
                }
                if !found {
                    return best;
                }
            }
        }
    }

    best
}

/// Trimmed body and indent of a line; `None` for blanks and comments.
fn significant(line: &str) -> Option<(&str, usize)> {
    let body = line.trim_start();
    if body.is_empty() || body.starts_with('#') {
        return None;
    }
    let indent = line.len() - body.len();
    Some((body.trim_end(), indent))
}

fn strip_item_markers(mut body: &str, mut indent: usize) -> (&str, usize) {
    while let Some(rest) = body.strip_prefix("- ") {
        body = rest;
        indent += 2;
    }
    (body, indent)
}
