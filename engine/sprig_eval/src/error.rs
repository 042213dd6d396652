//! Execution error types.

use thiserror::Error;

/// Error aborting the current `step()`.
///
/// The engine makes no recovery attempt; retry or abandon policy belongs
/// to the host.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecError {
    /// Symbol applied or referenced with no binding in scope.
    #[error("undefined symbol `{name}`")]
    UndefinedSymbol { name: String },

    /// A form or call received the wrong number of children/arguments.
    #[error("`{name}` expects {expected} argument(s), got {got}")]
    ArityMismatch {
        name: String,
        expected: usize,
        got: usize,
    },

    /// A value of the wrong kind reached an operation.
    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        expected: &'static str,
        got: &'static str,
    },

    /// Environment table is at its entry limit.
    #[error("environment table full")]
    EnvOverflow,

    /// Non-tail call depth exceeded the configured budget.
    #[error("call depth budget exceeded")]
    StackOverflow,

    /// Evaluation stack popped while empty: unbalanced native callback
    /// or malformed program.
    #[error("evaluation stack underflow")]
    StackUnderflow,
}
