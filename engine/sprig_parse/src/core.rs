//! Generic pushdown parser core.
//!
//! A stack of small states plus a growing token buffer, fed one character
//! at a time. Pure bookkeeping with no grammar knowledge: the same machine
//! drives unrelated character-level parsers. Both the state stack and the
//! token buffer have fixed capacities so a hostile input cannot grow them
//! without bound; exceeding either is an [`Overflow`](CoreError::Overflow).

use tracing::trace;

/// Capacity failure inside the core machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreError {
    /// The state stack is at capacity.
    StateOverflow,
    /// The token buffer is at capacity.
    TokenOverflow,
}

/// The pushdown machine.
///
/// `S` is the caller's state type; the machine never inspects it.
#[derive(Debug)]
pub struct StateMachine<S> {
    stack: Vec<S>,
    token: String,
    state_depth: usize,
    token_len: usize,
    /// Characters consumed so far (error positions).
    position: usize,
    /// Previously consumed character; used by tokenizers to suppress
    /// empty tokens after a run of terminators.
    last_char: Option<char>,
}

impl<S: Copy> StateMachine<S> {
    /// Create a machine with the given stack depth and token capacity.
    pub fn new(state_depth: usize, token_len: usize) -> Self {
        StateMachine {
            stack: Vec::with_capacity(state_depth.min(64)),
            token: String::new(),
            state_depth,
            token_len,
            position: 0,
            last_char: None,
        }
    }

    /// Current (topmost) state, or `None` when the stack is empty.
    #[inline]
    pub fn state(&self) -> Option<S> {
        self.stack.last().copied()
    }

    /// Push a new state.
    pub fn push_state(&mut self, state: S) -> Result<(), CoreError> {
        if self.stack.len() >= self.state_depth {
            return Err(CoreError::StateOverflow);
        }
        self.stack.push(state);
        Ok(())
    }

    /// Pop the current state.
    ///
    /// Callers only pop states they pushed; popping an empty stack is a
    /// logic error, checked in debug builds.
    pub fn pop_state(&mut self) {
        debug_assert!(!self.stack.is_empty(), "pop on empty state stack");
        self.stack.pop();
    }

    /// Depth of the state stack.
    #[inline]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Append one character to the token in progress.
    pub fn append_token_char(&mut self, c: char) -> Result<(), CoreError> {
        // Capacity is in bytes; the source grammar is ASCII.
        if self.token.len() >= self.token_len {
            return Err(CoreError::TokenOverflow);
        }
        self.token.push(c);
        Ok(())
    }

    /// Clear the token in progress.
    #[inline]
    pub fn reset_token(&mut self) {
        self.token.clear();
    }

    /// The token accumulated so far.
    #[inline]
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Character index of the character being consumed.
    #[inline]
    pub fn position(&self) -> usize {
        self.position
    }

    /// The previously consumed character.
    #[inline]
    pub fn last_char(&self) -> Option<char> {
        self.last_char
    }

    /// Record that `c` has been consumed.
    pub fn advance(&mut self, c: char) {
        trace!(pos = self.position, ch = ?c, depth = self.stack.len(), "advance");
        self.position += 1;
        self.last_char = Some(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn push_pop_state() {
        let mut m: StateMachine<u8> = StateMachine::new(2, 8);
        assert_eq!(m.state(), None);
        m.push_state(1).unwrap();
        m.push_state(2).unwrap();
        assert_eq!(m.state(), Some(2));
        assert_eq!(m.push_state(3), Err(CoreError::StateOverflow));
        m.pop_state();
        assert_eq!(m.state(), Some(1));
    }

    #[test]
    fn token_buffer_bounds() {
        let mut m: StateMachine<u8> = StateMachine::new(2, 3);
        m.append_token_char('a').unwrap();
        m.append_token_char('b').unwrap();
        m.append_token_char('c').unwrap();
        assert_eq!(m.append_token_char('d'), Err(CoreError::TokenOverflow));
        assert_eq!(m.token(), "abc");
        m.reset_token();
        assert_eq!(m.token(), "");
    }

    #[test]
    fn advance_tracks_position_and_last_char() {
        let mut m: StateMachine<u8> = StateMachine::new(2, 8);
        m.advance('x');
        m.advance('y');
        assert_eq!(m.position(), 2);
        assert_eq!(m.last_char(), Some('y'));
    }
}
