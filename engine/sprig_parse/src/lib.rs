//! Sprig Parse - character-stream s-expression parser.
//!
//! Two layers:
//!
//! - [`core`]: a reusable pushdown automaton (state stack + bounded token
//!   buffer) with no domain knowledge, fed one character at a time. The
//!   wider engine family shares this layer across unrelated grammars.
//! - [`Parser`]: the s-expression layer that drives the automaton and
//!   grows the AST arena, tagging special forms as it goes.
//!
//! Parsing is incremental by construction -- [`Parser::feed`] accepts one
//! character and never looks ahead -- but the usual entry point is the
//! one-shot [`parse`].

pub mod core;
mod dump;
mod error;
mod expr;

pub use dump::{dump, to_source};
pub use error::ParseError;
pub use expr::{parse, parse_with_limits, Parser, PState};
