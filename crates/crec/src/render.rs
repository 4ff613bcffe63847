//! Graphviz rendering of an AST forest, for debugging compiled rules.

use std::io::{self, Write};

use crate::ast::{AstForest, AstNode};

/// Emit a DOT digraph of the forest to `sink`: one node per AST node labeled
/// with its kind and address, one edge per parent/child pair.
///
/// Pure function of the forest; output is byte-stable across runs.
pub fn draw_tree<W: Write>(forest: &AstForest, sink: &mut W) -> io::Result<()> {
    writeln!(sink, "digraph rules {{")?;
    writeln!(sink, "  rankdir=TB;")?;
    writeln!(sink, "  node [shape=box, fontname=\"monospace\"];")?;
    for root in &forest.roots {
        draw_node(root, sink)?;
    }
    writeln!(sink, "}}")
}

fn draw_node<W: Write>(node: &AstNode, sink: &mut W) -> io::Result<()> {
    writeln!(
        sink,
        "  \"{}\" [label=\"{}\\nscope={}\"];",
        node.address, node.node_type, node.scope
    )?;
    for child in &node.children {
        writeln!(sink, "  \"{}\" -> \"{}\";", node.address, child.address)?;
        draw_node(child, sink)?;
    }
    Ok(())
}
