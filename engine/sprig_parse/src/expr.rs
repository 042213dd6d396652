//! The s-expression AST parser.
//!
//! Drives the [`core`](crate::core) pushdown machine one character at a
//! time while growing the AST arena. The "current node" cursor tracks the
//! innermost open list; `(` descends, `)` ascends, whitespace finalizes
//! tokens.
//!
//! State progression for an ordinary form:
//! `None -> SymbolOrOperator -> Symbol` -- the first token after `(`
//! becomes the node's operator, subsequent tokens become leaf children.
//! A `(` opened directly under a childless `lambda` node collects
//! parameter names instead (`LambdaArgs`).

use tracing::{debug, trace};

use sprig_ir::{Ast, AstNode, Limits, NodeFlags, NodeId, Program, StringPool};

use crate::core::{CoreError, StateMachine};
use crate::error::ParseError;

/// Parser states, stacked on the core machine.
///
/// The empty stack is the implicit `None` state (top level, between
/// forms).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PState {
    /// After `(`: the next token is the node's operator.
    SymbolOrOperator,
    /// Inside a form: tokens become leaf children.
    Symbol,
    /// Inside `"…"`: everything accumulates verbatim.
    String,
    /// Inside a lambda's parameter list.
    LambdaArgs,
    /// After `;`: everything to end-of-line is swallowed.
    Comment,
}

impl PState {
    /// State name for diagnostics.
    fn name(state: Option<PState>) -> &'static str {
        match state {
            None => "None",
            Some(PState::SymbolOrOperator) => "SymbolOrOperator",
            Some(PState::Symbol) => "Symbol",
            Some(PState::String) => "String",
            Some(PState::LambdaArgs) => "LambdaArgs",
            Some(PState::Comment) => "Comment",
        }
    }
}

/// Incremental s-expression parser.
///
/// Feed characters with [`feed`](Parser::feed), then [`finish`](Parser::finish)
/// to obtain the [`Program`].
#[derive(Debug)]
pub struct Parser {
    core: StateMachine<PState>,
    pool: StringPool,
    ast: Ast,
    /// Innermost open node; starts (and ends) at the synthetic root.
    cursor: NodeId,
    limits: Limits,
}

impl Parser {
    pub fn new(limits: Limits) -> Self {
        let mut ast = Ast::new();
        // Node 0 is a synthetic `begin`: top-level forms become its
        // children, so a file of several forms evaluates in order and
        // yields the last value.
        let root = ast.alloc(AstNode {
            flags: NodeFlags::BEGIN,
            ..AstNode::default()
        });
        debug_assert_eq!(root, Some(NodeId::ROOT));
        Parser {
            core: StateMachine::new(limits.state_depth, limits.token_len),
            pool: StringPool::with_capacity_limit(limits.pool_strings),
            ast,
            cursor: NodeId::ROOT,
            limits,
        }
    }

    /// Consume one character.
    pub fn feed(&mut self, c: char) -> Result<(), ParseError> {
        let state = self.core.state();
        trace!(pos = self.core.position(), ch = ?c, state = PState::name(state), "feed");

        match state {
            // Comments swallow everything, parens and quotes included,
            // until end-of-line.
            Some(PState::Comment) => {
                if c == '\n' || c == '\r' {
                    self.core.pop_state();
                }
            }

            // Strings accumulate everything verbatim until the closing
            // quote, delimiters included.
            Some(PState::String) => {
                if c == '"' {
                    self.finish_string()?;
                } else {
                    self.append_char(c)?;
                }
            }

            _ => match c {
                '\r' | '\n' | '\t' | ' ' => self.end_token()?,
                '(' => self.open_paren(c, state)?,
                ')' => self.close_paren(c, state)?,
                ';' => {
                    self.end_token()?;
                    self.push_state(PState::Comment)?;
                }
                '"' => {
                    self.end_token()?;
                    self.push_state(PState::String)?;
                    self.core.reset_token();
                }
                _ => self.append_char(c)?,
            },
        }

        self.core.advance(c);
        Ok(())
    }

    /// Finish parsing: fails if any form is still open.
    pub fn finish(mut self) -> Result<Program, ParseError> {
        // End of input acts as a terminator: it closes a trailing
        // comment and flushes a pending token just as a newline would.
        if self.core.state() == Some(PState::Comment) {
            self.core.pop_state();
        }
        self.end_token()?;
        if self.core.depth() > 0 {
            return Err(ParseError::Truncated {
                position: self.core.position(),
            });
        }
        debug_assert_eq!(self.cursor, NodeId::ROOT);
        debug!(nodes = self.ast.len(), strings = self.pool.len(), "parse finished");
        Ok(Program::new(self.pool, self.ast))
    }

    // === character handlers ===

    fn open_paren(&mut self, c: char, state: Option<PState>) -> Result<(), ParseError> {
        match state {
            Some(PState::SymbolOrOperator) => {
                // `(` before the operator arrived. With a pending token,
                // flush it as the operator; with none, the cursor node
                // stays token-less and the new form is its first child
                // (direct lambda application, `((lambda (x) x) 5)`).
                if !self.core.token().is_empty() {
                    self.set_cursor_token()?;
                    self.core.reset_token();
                }
                self.core.pop_state();
                self.push_state(PState::Symbol)?;
                self.descend()
            }
            None | Some(PState::Symbol) => {
                // `a(b …)`: the `(` terminates a pending token exactly
                // as whitespace would.
                self.end_token()?;
                self.descend()
            }
            _ => Err(self.invalid(c, state)),
        }
    }

    /// Open a new child node under the cursor and move into it.
    fn descend(&mut self) -> Result<(), ParseError> {
        let cur = self.ast.node(self.cursor);
        if cur.flags.contains(NodeFlags::LAMBDA) && cur.children.is_empty() {
            // All tokens in this child are the lambda's parameter names.
            self.push_state(PState::LambdaArgs)?;
        } else {
            // First token after `(` is the operator.
            self.push_state(PState::SymbolOrOperator)?;
        }
        self.core.reset_token();
        // New empty child, filled out as tokens arrive.
        self.add_child()
    }

    fn close_paren(&mut self, c: char, state: Option<PState>) -> Result<(), ParseError> {
        match state {
            Some(PState::SymbolOrOperator) => {
                // `(foo)`: the pending token is the node's operator, so
                // the form is equivalent to the bare leaf `foo`.
                if !self.core.token().is_empty() {
                    self.set_cursor_token()?;
                    self.core.reset_token();
                }
                self.core.pop_state();
                self.ascend();
                Ok(())
            }
            Some(PState::Symbol | PState::LambdaArgs) => {
                if !self.core.token().is_empty() {
                    // Flush the pending token as one final leaf child.
                    // This applies in LambdaArgs too: a bare identifier
                    // before `)` is an ordinary leaf of the parameter
                    // list, and nothing after `)` is a parameter.
                    self.add_raw_token()?;
                }
                self.core.pop_state();
                self.ascend();
                Ok(())
            }
            // `)` with no open node.
            _ => Err(self.invalid(c, state)),
        }
    }

    /// Whitespace: finalize the token in progress, if any.
    ///
    /// Suppressed when the previous character was itself a terminator,
    /// so runs of whitespace or `) (` boundaries don't produce empty
    /// tokens.
    fn end_token(&mut self) -> Result<(), ParseError> {
        if self.core.token().is_empty() || is_terminator(self.core.last_char()) {
            return Ok(());
        }
        match self.core.state() {
            Some(PState::SymbolOrOperator) => {
                trace!(token = self.core.token(), "operator");
                // The token is the operator of the node the last `(`
                // opened; subsequent tokens are siblings under it.
                self.set_cursor_token()?;
                self.core.reset_token();
                self.core.pop_state();
                self.push_state(PState::Symbol)?;
            }
            Some(PState::Symbol | PState::LambdaArgs) | None => {
                trace!(token = self.core.token(), "leaf");
                // A raw token can't have children: one-off leaf child.
                self.add_raw_token()?;
            }
            // Comment/String never reach here.
            _ => {}
        }
        Ok(())
    }

    // === AST building ===

    /// Append a new empty node under the cursor and descend into it.
    fn add_child(&mut self) -> Result<(), ParseError> {
        let parent = self.cursor;
        if self.ast.node(parent).children.len() >= self.limits.max_children {
            return Err(self.overflow("node children"));
        }
        let child = self
            .ast
            .alloc(AstNode {
                parent: Some(parent),
                ..AstNode::default()
            })
            .ok_or_else(|| self.overflow("ast arena"))?;
        self.ast.node_mut(parent).children.push(child);
        self.cursor = child;
        trace!(node = ?child, parent = ?parent, "add child");
        Ok(())
    }

    /// Move the cursor up to the parent of the current node.
    fn ascend(&mut self) {
        if let Some(parent) = self.ast.node(self.cursor).parent {
            self.cursor = parent;
        }
        trace!(node = ?self.cursor, "ascend");
    }

    /// Pool the pending token and set it on the cursor node, classifying
    /// special forms by exact text match.
    fn set_cursor_token(&mut self) -> Result<(), ParseError> {
        let flags = classify(self.core.token());
        let tok = self
            .pool
            .intern(self.core.token())
            .map_err(|_| self.overflow("string pool"))?;
        let node = self.ast.node_mut(self.cursor);
        node.token = Some(tok);
        node.flags |= flags;
        Ok(())
    }

    /// A whitespace-terminated raw token: one-off leaf child.
    fn add_raw_token(&mut self) -> Result<(), ParseError> {
        self.add_child()?;
        self.set_cursor_token()?;
        self.core.reset_token();
        self.ascend();
        Ok(())
    }

    /// Closing `"`: the accumulated text becomes a STRING-flagged leaf.
    fn finish_string(&mut self) -> Result<(), ParseError> {
        let tok = self
            .pool
            .intern(self.core.token())
            .map_err(|_| self.overflow("string pool"))?;
        self.add_child()?;
        let node = self.ast.node_mut(self.cursor);
        node.token = Some(tok);
        node.flags |= NodeFlags::STRING;
        self.core.reset_token();
        self.ascend();
        self.core.pop_state();
        Ok(())
    }

    // === plumbing ===

    fn push_state(&mut self, state: PState) -> Result<(), ParseError> {
        self.core.push_state(state).map_err(|e| self.core_err(e))
    }

    fn append_char(&mut self, c: char) -> Result<(), ParseError> {
        self.core.append_token_char(c).map_err(|e| self.core_err(e))
    }

    fn core_err(&self, e: CoreError) -> ParseError {
        match e {
            CoreError::StateOverflow => self.overflow("state stack"),
            CoreError::TokenOverflow => self.overflow("token buffer"),
        }
    }

    fn overflow(&self, what: &'static str) -> ParseError {
        ParseError::Overflow {
            what,
            position: self.core.position(),
        }
    }

    fn invalid(&self, c: char, state: Option<PState>) -> ParseError {
        ParseError::InvalidCharacter {
            ch: c,
            position: self.core.position(),
            state: PState::name(state),
        }
    }
}

/// Characters that terminate a token. A pending token is only flushed
/// when the *previous* character was not itself one of these.
fn is_terminator(c: Option<char>) -> bool {
    matches!(c, None | Some('\r' | '\n' | '\t' | ' ' | '(' | ')'))
}

/// Special-form classification by exact token text.
fn classify(token: &str) -> NodeFlags {
    match token {
        "lambda" => NodeFlags::LAMBDA,
        "if" => NodeFlags::IF,
        "begin" => NodeFlags::BEGIN,
        "define" => NodeFlags::DEFINE,
        _ => NodeFlags::empty(),
    }
}

/// Parse a complete source text with default limits.
pub fn parse(source: &str) -> Result<Program, ParseError> {
    parse_with_limits(source, Limits::default())
}

/// Parse a complete source text.
pub fn parse_with_limits(source: &str, limits: Limits) -> Result<Program, ParseError> {
    let mut parser = Parser::new(limits);
    for c in source.chars() {
        parser.feed(c)?;
    }
    parser.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sprig_ir::NodeId;

    fn child(program: &Program, id: NodeId, i: usize) -> NodeId {
        program.node(id).children[i]
    }

    #[test]
    fn define_form_structure() {
        let p = parse("(define x 5)").unwrap();
        let root = p.root();
        assert_eq!(p.node(root).children.len(), 1);

        let form = child(&p, root, 0);
        assert_eq!(p.token_text(form), "define");
        assert!(p.node(form).flags.contains(NodeFlags::DEFINE));
        assert_eq!(p.node(form).children.len(), 2);
        assert_eq!(p.token_text(child(&p, form, 0)), "x");
        assert_eq!(p.token_text(child(&p, form, 1)), "5");
    }

    #[test]
    fn lambda_parameter_list() {
        let p = parse("(lambda (a b) (+ a b))").unwrap();
        let lam = child(&p, p.root(), 0);
        assert!(p.node(lam).flags.contains(NodeFlags::LAMBDA));
        assert_eq!(p.node(lam).children.len(), 2);

        // children[0] is the token-less parameter-list holder.
        let params = child(&p, lam, 0);
        assert_eq!(p.node(params).token, None);
        assert_eq!(p.node(params).children.len(), 2);
        assert_eq!(p.token_text(child(&p, params, 0)), "a");
        assert_eq!(p.token_text(child(&p, params, 1)), "b");

        let body = child(&p, lam, 1);
        assert_eq!(p.token_text(body), "+");
    }

    #[test]
    fn whitespace_runs_do_not_create_empty_tokens() {
        let p = parse("( begin   1\n\t 2 )").unwrap();
        let form = child(&p, p.root(), 0);
        assert_eq!(p.token_text(form), "begin");
        assert_eq!(p.node(form).children.len(), 2);
    }

    #[test]
    fn multiple_top_level_forms_share_the_root() {
        let p = parse("(define x 1) (define y 2)").unwrap();
        assert_eq!(p.node(p.root()).children.len(), 2);
        assert!(p.node(p.root()).flags.contains(NodeFlags::BEGIN));
    }

    #[test]
    fn comment_swallows_parens() {
        let p = parse("(begin 1 ; )(nonsense\n 2)").unwrap();
        let form = child(&p, p.root(), 0);
        assert_eq!(p.node(form).children.len(), 2);
        assert_eq!(p.token_text(child(&p, form, 1)), "2");
    }

    #[test]
    fn string_literal_accumulates_delimiters() {
        let p = parse("(say \"hi (there); ok\")").unwrap();
        let form = child(&p, p.root(), 0);
        let lit = child(&p, form, 0);
        assert!(p.node(lit).flags.contains(NodeFlags::STRING));
        assert_eq!(p.token_text(lit), "hi (there); ok");
    }

    #[test]
    fn stray_close_paren_is_invalid_character() {
        let err = parse(")").unwrap_err();
        assert_eq!(
            err,
            ParseError::InvalidCharacter {
                ch: ')',
                position: 0,
                state: "None",
            }
        );
    }

    #[test]
    fn unterminated_form_is_truncated() {
        let err = parse("(begin 1 2").unwrap_err();
        assert!(matches!(err, ParseError::Truncated { .. }));
    }

    #[test]
    fn nesting_deeper_than_state_stack_overflows() {
        let deep = "(".repeat(100);
        let err = parse(&deep).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Overflow {
                what: "state stack",
                ..
            }
        ));
    }

    #[test]
    fn direct_lambda_application_leaves_the_node_tokenless() {
        let p = parse("((lambda (x) x) 5)").unwrap();
        let app = child(&p, p.root(), 0);
        assert_eq!(p.node(app).token, None);
        assert_eq!(p.node(app).children.len(), 2);
        assert!(p.node(child(&p, app, 0)).flags.contains(NodeFlags::LAMBDA));
        assert_eq!(p.token_text(child(&p, app, 1)), "5");
    }

    #[test]
    fn trailing_atom_without_terminator_is_kept() {
        let p = parse("42").unwrap();
        assert_eq!(p.node(p.root()).children.len(), 1);
        assert_eq!(p.token_text(child(&p, p.root(), 0)), "42");

        let p = parse("(define x 1) x").unwrap();
        assert_eq!(p.node(p.root()).children.len(), 2);
        assert_eq!(p.token_text(child(&p, p.root(), 1)), "x");
    }

    #[test]
    fn trailing_comment_without_newline_is_fine() {
        let p = parse("7 ; done").unwrap();
        assert_eq!(p.node(p.root()).children.len(), 1);
        assert_eq!(p.token_text(child(&p, p.root(), 0)), "7");
    }

    #[test]
    fn open_paren_terminates_a_pending_token() {
        let p = parse("(f a(g 1))").unwrap();
        let form = child(&p, p.root(), 0);
        assert_eq!(p.token_text(form), "f");
        assert_eq!(p.node(form).children.len(), 2);
        assert_eq!(p.token_text(child(&p, form, 0)), "a");
        assert_eq!(p.token_text(child(&p, form, 1)), "g");
    }

    #[test]
    fn token_longer_than_the_buffer_overflows() {
        let limits = Limits {
            token_len: 4,
            ..Limits::default()
        };
        let err = parse_with_limits("(verylongtoken)", limits).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Overflow {
                what: "token buffer",
                ..
            }
        ));
    }

    #[test]
    fn form_wider_than_the_child_limit_overflows() {
        let limits = Limits {
            max_children: 2,
            ..Limits::default()
        };
        let err = parse_with_limits("(f 1 2 3)", limits).unwrap_err();
        assert!(matches!(
            err,
            ParseError::Overflow {
                what: "node children",
                ..
            }
        ));
    }

    #[test]
    fn trailing_identifier_in_lambda_args_is_a_plain_leaf() {
        // `c` is flushed by `)` exactly as in Symbol state: a leaf of
        // the parameter-list node, not of the lambda.
        let p = parse("(lambda (a b c) a)").unwrap();
        let lam = child(&p, p.root(), 0);
        let params = child(&p, lam, 0);
        assert_eq!(p.node(params).children.len(), 3);
        assert_eq!(p.token_text(child(&p, params, 2)), "c");
    }
}
