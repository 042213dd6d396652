//! Capacity and budget knobs.
//!
//! Defaults are sized for desktop use; hosts on constrained targets can
//! tighten them, tests can loosen them.

/// Engine capacities and budgets.
#[derive(Clone, Copy, Debug)]
pub struct Limits {
    /// Maximum length of one token, in characters.
    pub token_len: usize,
    /// Maximum parser state-stack depth (bounds paren nesting).
    pub state_depth: usize,
    /// Maximum children per AST node.
    pub max_children: usize,
    /// Maximum strings in a program's pool.
    pub pool_strings: usize,
    /// Maximum entries in one environment table.
    pub env_entries: usize,
    /// Maximum *non-tail* call depth per step; tail calls don't count.
    pub call_depth: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            token_len: 4096,
            state_depth: 64,
            max_children: 10,
            pool_strings: 16 * 1024,
            env_entries: 4096,
            call_depth: 64,
        }
    }
}
