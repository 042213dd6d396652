//! Sprig IR - shared data model for the Sprig scripting engine.
//!
//! This crate holds the types every other engine crate speaks in:
//!
//! - `StringPool` / `PoolStr`: append-only, index-addressed string storage
//! - `Ast` / `AstNode` / `NodeId` / `NodeFlags`: the flat, arena-allocated
//!   syntax tree
//! - `Value`: the tagged value type shared between environment bindings and
//!   the evaluation stack
//! - `Program`: a parsed tree plus its pool, owned here and *borrowed*
//!   read-only by every execution state that runs it
//! - `Limits`: capacity and budget knobs
//!
//! Indices, not pointers, are the stable reference type throughout: the
//! backing buffers may reallocate on append without invalidating references
//! held elsewhere.

mod limits;
mod node;
mod pool;
mod program;
mod value;

pub use limits::Limits;
pub use node::{Ast, AstNode, NodeFlags, NodeId};
pub use pool::{PoolOverflow, PoolStr, StringPool};
pub use program::Program;
pub use value::{NativeId, Value};
