//! The tagged value type shared by environment bindings and the
//! evaluation stack.
//!
//! A sum type rather than a tag byte next to a union: an invalid-tag
//! access is a compile error instead of a runtime footgun.

use crate::node::NodeId;
use crate::pool::PoolStr;

/// Index of a native callback inside the environment table that
/// registered it.
///
/// The function pointer itself lives in the table's callback registry;
/// values only carry the index, keeping this crate free of the
/// evaluator's callback signature.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NativeId(pub u32);

impl NativeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A runtime value.
///
/// `ArgsStart`/`ArgsEnd`/`Begin` are scope markers: they never result
/// from evaluating an expression, but segment the environment table into
/// call frames and the evaluation stack into `begin` scopes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Value {
    Int(i32),
    Float(f32),
    Bool(bool),
    /// String contents, pooled in the owning program.
    Str(PoolStr),
    /// Native callback registered by the host.
    Native(NativeId),
    /// A closure: the `lambda` node whose children are its parameter
    /// list and body.
    Lambda(NodeId),
    /// Start-of-arguments frame marker for the given lambda node.
    ArgsStart(NodeId),
    /// End-of-arguments frame marker for the given lambda node.
    ArgsEnd(NodeId),
    /// `begin` scope marker for the given node.
    Begin(NodeId),
}

impl Value {
    /// Short kind name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "string",
            Value::Native(_) => "native",
            Value::Lambda(_) => "lambda",
            Value::ArgsStart(_) => "args-start",
            Value::ArgsEnd(_) => "args-end",
            Value::Begin(_) => "begin",
        }
    }

    /// True for the frame/scope marker kinds.
    pub fn is_marker(&self) -> bool {
        matches!(
            self,
            Value::ArgsStart(_) | Value::ArgsEnd(_) | Value::Begin(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_names() {
        assert_eq!(Value::Int(3).kind(), "int");
        assert_eq!(Value::Lambda(NodeId::ROOT).kind(), "lambda");
    }

    #[test]
    fn markers_are_markers() {
        assert!(Value::Begin(NodeId::ROOT).is_marker());
        assert!(!Value::Bool(true).is_marker());
    }
}
