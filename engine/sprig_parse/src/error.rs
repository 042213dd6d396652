//! Parse error types.

use thiserror::Error;

/// Error aborting a parse. No partial-program recovery is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// A fixed capacity (token buffer, state stack, pool, child list)
    /// would be exceeded.
    #[error("{what} capacity exceeded at position {position}")]
    Overflow {
        what: &'static str,
        position: usize,
    },

    /// Character is illegal in the current parser state.
    #[error("invalid character {ch:?} at position {position} in state {state}")]
    InvalidCharacter {
        ch: char,
        position: usize,
        state: &'static str,
    },

    /// Input ended with unclosed forms on the state stack.
    #[error("source ended with an unterminated form (position {position})")]
    Truncated { position: usize },
}
