//! AST inspection output.
//!
//! [`dump`] renders the arena as an indented tree with node ids and flags,
//! for debugging and snapshot tests. [`to_source`] re-emits parseable
//! source text; it normalizes whitespace, so `parse(to_source(p))` yields
//! a structurally identical program rather than the original text.

use std::fmt::Write as _;

use sprig_ir::{NodeFlags, NodeId, Program};

/// Render the program as an indented node tree.
pub fn dump(program: &Program) -> String {
    let mut out = String::new();
    dump_node(program, program.root(), 0, &mut out);
    out
}

fn dump_node(program: &Program, id: NodeId, depth: usize, out: &mut String) {
    let node = program.node(id);
    for _ in 0..depth {
        out.push_str("  ");
    }
    let _ = write!(out, "#{}", id.index());
    if node.token.is_some() {
        let _ = write!(out, " {:?}", program.token_text(id));
    }
    if !node.flags.is_empty() {
        let _ = write!(out, " [{:?}]", node.flags);
    }
    out.push('\n');
    for &child in &node.children {
        dump_node(program, child, depth + 1, out);
    }
}

/// Re-emit the program as source text, one top-level form per line.
pub fn to_source(program: &Program) -> String {
    let root = program.node(program.root());
    let mut out = String::new();
    for (i, &child) in root.children.iter().enumerate() {
        if i > 0 {
            out.push('\n');
        }
        emit(program, child, &mut out);
    }
    out
}

fn emit(program: &Program, id: NodeId, out: &mut String) {
    let node = program.node(id);
    if node.flags.contains(NodeFlags::STRING) {
        let _ = write!(out, "\"{}\"", program.token_text(id));
        return;
    }
    if node.is_leaf() && node.token.is_some() {
        out.push_str(program.token_text(id));
        return;
    }
    // A form. Token-less forms (parameter lists, direct applications)
    // emit their children only.
    out.push('(');
    let mut first = true;
    if node.token.is_some() {
        out.push_str(program.token_text(id));
        first = false;
    }
    for &child in &node.children {
        if !first {
            out.push(' ');
        }
        emit(program, child, out);
        first = false;
    }
    out.push(')');
}
