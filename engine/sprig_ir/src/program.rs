//! A parsed program: the syntax tree plus its string pool.

use crate::node::{Ast, AstNode, NodeId};
use crate::pool::{PoolStr, StringPool};

/// A parsed program.
///
/// Owned by whoever parsed it and *borrowed* read-only by every execution
/// state that runs it; several execution states may walk one program at
/// once because all mutable bookkeeping lives on the execution state.
#[derive(Debug)]
pub struct Program {
    pool: StringPool,
    ast: Ast,
}

impl Program {
    pub fn new(pool: StringPool, ast: Ast) -> Self {
        debug_assert!(!ast.is_empty(), "a program always has a root node");
        Program { pool, ast }
    }

    /// The synthetic root node; top-level forms are its children.
    #[inline]
    pub fn root(&self) -> NodeId {
        NodeId::ROOT
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &AstNode {
        self.ast.node(id)
    }

    /// Number of nodes; execution states size their per-node vectors to it.
    pub fn node_count(&self) -> usize {
        self.ast.len()
    }

    /// Resolve pooled text.
    #[inline]
    pub fn text(&self, s: PoolStr) -> &str {
        self.pool.resolve(s)
    }

    /// A node's token text, or `""` for synthetic nodes.
    pub fn token_text(&self, id: NodeId) -> &str {
        match self.node(id).token {
            Some(tok) => self.text(tok),
            None => "",
        }
    }
}
