//! Flat AST types using arena allocation.
//!
//! No `Box<Node>`: nodes live in one contiguous `Vec` and refer to each
//! other by `NodeId(u32)` index. Indices are stable for a node's lifetime
//! and never reused, which is what lets an execution state keep per-node
//! cursors in parallel vectors of its own.

use bitflags::bitflags;
use smallvec::SmallVec;

use crate::pool::PoolStr;

/// Inline capacity of a node's child list.
///
/// Matches the default per-node child maximum; the parser enforces the
/// configured [`Limits`](crate::Limits) so the inline buffer never spills
/// in practice.
pub(crate) const CHILDREN_INLINE: usize = 10;

/// Index of a node inside an [`Ast`] arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeId(u32);

impl NodeId {
    /// The root node. The parser always allocates it first.
    pub const ROOT: NodeId = NodeId(0);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    /// Per-node classification bits, set at parse time.
    ///
    /// The special-form bits drive the evaluator's dispatch; `STRING` marks
    /// a string-literal leaf so its token is never resolved as a symbol.
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct NodeFlags: u8 {
        /// `lambda` form: children are the parameter list then the body.
        const LAMBDA = 1 << 1;
        /// `if` form: children are condition, then-branch, optional else.
        const IF     = 1 << 2;
        /// `define` form: children are name and value expression.
        const DEFINE = 1 << 3;
        /// `begin` form: children evaluate in order, last value survives.
        const BEGIN  = 1 << 5;
        /// String-literal leaf; token text is the literal contents.
        const STRING = 1 << 6;
    }
}

/// One node of the syntax tree.
#[derive(Clone, Debug, Default)]
pub struct AstNode {
    /// Special-form / literal classification.
    pub flags: NodeFlags,
    /// Operator or atom text; `None` for synthetic nodes (the root, a
    /// lambda's parameter-list holder).
    pub token: Option<PoolStr>,
    /// Parent node; `None` only for the root.
    pub parent: Option<NodeId>,
    /// Child indices in insertion order (= argument/body order).
    pub children: SmallVec<[NodeId; CHILDREN_INLINE]>,
}

impl AstNode {
    /// True if the node has no children.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }
}

/// Arena of [`AstNode`]s addressed by [`NodeId`].
#[derive(Debug, Default)]
pub struct Ast {
    nodes: Vec<AstNode>,
}

impl Ast {
    pub fn new() -> Self {
        Ast { nodes: Vec::new() }
    }

    /// Append a node, returning its index.
    ///
    /// Returns `None` if the arena is full (more than `u32::MAX` nodes).
    pub fn alloc(&mut self, node: AstNode) -> Option<NodeId> {
        let idx = u32::try_from(self.nodes.len()).ok()?;
        self.nodes.push(node);
        Some(NodeId(idx))
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.index()]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut AstNode {
        &mut self.nodes[id.index()]
    }

    /// Number of nodes in the arena.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}
