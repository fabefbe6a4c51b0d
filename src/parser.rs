use tracing::{debug, trace};

use crate::ast::{Ast, FLAG_BEGIN, FLAG_IF, FLAG_LAMBDA, FLAG_STRING};
use crate::error::{ParseError, Result};
use crate::strpool::{StrPool, StrRef};

/// Maximum length of a single symbol or string token, in bytes.
pub const TOKEN_MAX: usize = 4096;

//===----------------------------------------------------------------------===//
// Lexical states
//
// The parser is a character-at-a-time pushdown automaton. An empty state
// stack means top level. `SymbolOp` expects the operator symbol right after
// an opening paren; `LambdaArgs` treats every symbol under a fresh lambda
// child as an argument name.
//===----------------------------------------------------------------------===//

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum PState {
    SymbolOp,
    Symbol,
    Str,
    LambdaArgs,
    Comment,
}

impl PState {
    fn name(self) -> &'static str {
        match self {
            PState::SymbolOp => "symbol-op",
            PState::Symbol => "symbol",
            PState::Str => "string",
            PState::LambdaArgs => "lambda-args",
            PState::Comment => "comment",
        }
    }
}

//===----------------------------------------------------------------------===//
// Parser
//===----------------------------------------------------------------------===//

/// S-expression parser. Feed it one character at a time; it owns the string
/// pool and the AST it builds.
#[derive(Debug)]
pub struct Parser {
    strpool: StrPool,
    ast: Ast,
    /// Node currently under construction; `None` at top level.
    cursor: Option<usize>,
    pstate: Vec<PState>,
    token: String,
    last_c: char,
    pos: usize,
}

impl Parser {
    pub fn new() -> Self {
        Self {
            strpool: StrPool::new(),
            ast: Ast::new(),
            cursor: None,
            pstate: Vec::new(),
            token: String::new(),
            last_c: '\0',
            pos: 0,
        }
    }

    /// Parses a complete source string. Convenience wrapper over
    /// [`Parser::feed`] + [`Parser::finish`].
    pub fn parse(source: &str) -> Result<Parser> {
        let mut parser = Parser::new();
        for c in source.chars() {
            parser.feed(c)?;
        }
        parser.finish()?;
        Ok(parser)
    }

    pub fn strpool(&self) -> &StrPool {
        &self.strpool
    }

    pub(crate) fn strpool_mut(&mut self) -> &mut StrPool {
        &mut self.strpool
    }

    pub fn ast(&self) -> &Ast {
        &self.ast
    }

    pub(crate) fn intern(&mut self, s: &str) -> StrRef {
        self.strpool.intern(s)
    }

    fn state(&self) -> Option<PState> {
        self.pstate.last().copied()
    }

    /// Consumes one character of source text.
    pub fn feed(&mut self, c: char) -> Result<()> {
        trace!(pos = self.pos, ?c, state = ?self.state(), "feed");
        match c {
            '\r' | '\n' => {
                if self.state() == Some(PState::Comment) {
                    self.pstate.pop();
                } else {
                    self.on_whitespace(c)?;
                }
            }
            '\t' | ' ' => {
                if self.state() != Some(PState::Comment) {
                    self.on_whitespace(c)?;
                }
            }
            '(' => match self.state() {
                Some(PState::Str) => self.push_token_char(c)?,
                Some(PState::Comment) => {}
                None | Some(PState::Symbol) => {
                    // Under a fresh lambda node, the first parenthesized
                    // child is its argument-name list.
                    let lambda_args = self.cursor.is_some_and(|i| {
                        let n = self.ast.node(i);
                        n.is_lambda() && n.children().is_empty()
                    });
                    self.pstate.push(if lambda_args {
                        PState::LambdaArgs
                    } else {
                        PState::SymbolOp
                    });
                    self.token.clear();
                    self.open_child()?;
                }
                Some(_) => return Err(self.invalid(c)),
            },
            ')' => match self.state() {
                Some(PState::Str) => self.push_token_char(c)?,
                Some(PState::Comment) => {}
                Some(PState::SymbolOp) => {
                    // `(foo)`: the pending token is the operator of the node
                    // being closed.
                    if !self.token.is_empty() {
                        let tok = self.take_token();
                        self.set_cursor_token(tok, true)?;
                    }
                    self.pstate.pop();
                    self.to_parent();
                }
                Some(PState::Symbol) | Some(PState::LambdaArgs) => {
                    if !self.token.is_empty() {
                        self.add_leaf()?;
                    }
                    self.pstate.pop();
                    self.to_parent();
                }
                None => return Err(self.invalid(c)),
            },
            '"' => match self.state() {
                Some(PState::Comment) => {}
                Some(PState::Str) => {
                    // Closing quote: the accumulated bytes become a one-off
                    // string leaf, flagged so dumps can restore the quotes.
                    let tok = self.take_token();
                    self.pstate.pop();
                    self.open_child()?;
                    self.set_cursor_token_raw(tok, FLAG_STRING);
                    self.to_parent();
                }
                _ => {
                    self.pstate.push(PState::Str);
                    self.token.clear();
                }
            },
            ';' => match self.state() {
                Some(PState::Str) => self.push_token_char(c)?,
                Some(PState::Comment) => {}
                _ => self.pstate.push(PState::Comment),
            },
            _ => {
                if self.state() != Some(PState::Comment) {
                    self.push_token_char(c)?;
                }
            }
        }

        self.last_c = c;
        self.pos += c.len_utf8();
        Ok(())
    }

    /// Errors if any lexical state is still open (unbalanced parens, an
    /// unterminated string, or a trailing comment).
    pub fn finish(&self) -> Result<()> {
        let depth =
            self.pstate.iter().filter(|s| **s != PState::Comment).count();
        if depth > 0 {
            return Err(ParseError::UnterminatedInput { depth }.into());
        }
        Ok(())
    }

    //===------------------------------------------------------------------===//
    // Transitions
    //===------------------------------------------------------------------===//

    fn on_whitespace(&mut self, c: char) -> Result<()> {
        // A symbol only terminates if the previous character was not itself
        // a terminator; otherwise this whitespace is redundant.
        let after_terminator =
            matches!(self.last_c, '\r' | '\n' | '\t' | ' ' | '(' | ')');
        match self.state() {
            Some(PState::SymbolOp) if !after_terminator && !self.token.is_empty() => {
                // Operator symbol for the node opened by the last `(`.
                let tok = self.take_token();
                self.set_cursor_token(tok, true)?;
                self.pstate.pop();
                self.pstate.push(PState::Symbol);
            }
            Some(PState::Symbol) | Some(PState::LambdaArgs)
                if !after_terminator && !self.token.is_empty() =>
            {
                // A bare token terminated by whitespace cannot have children,
                // so it becomes a one-off leaf.
                self.add_leaf()?;
            }
            Some(PState::Str) => self.push_token_char(c)?,
            _ => {}
        }
        Ok(())
    }

    /// Allocates an empty node under the cursor and descends into it.
    fn open_child(&mut self) -> Result<()> {
        let idx = self.ast.add_child(self.cursor)?;
        trace!(node = idx, parent = ?self.cursor, "open child");
        self.cursor = Some(idx);
        Ok(())
    }

    /// Interns the pending token as a leaf child of the cursor node.
    fn add_leaf(&mut self) -> Result<()> {
        let tok = self.take_token();
        self.open_child()?;
        self.set_cursor_token(tok, true)?;
        self.to_parent();
        Ok(())
    }

    fn to_parent(&mut self) {
        if let Some(idx) = self.cursor {
            self.cursor = self.ast.node(idx).parent();
            trace!(node = ?self.cursor, "moved up");
        }
    }

    fn take_token(&mut self) -> StrRef {
        let tok = self.strpool.intern(&self.token);
        self.token.clear();
        tok
    }

    /// Attaches `tok` to the cursor node, detecting special forms by name
    /// when `special` is set.
    fn set_cursor_token(&mut self, tok: StrRef, special: bool) -> Result<()> {
        let flags = if special {
            match self.strpool.get(tok) {
                "lambda" => FLAG_LAMBDA,
                "if" => FLAG_IF,
                "begin" => FLAG_BEGIN,
                _ => 0,
            }
        } else {
            0
        };
        debug!(token = self.strpool.get(tok), flags, "symbol");
        self.set_cursor_token_raw(tok, flags);
        Ok(())
    }

    fn set_cursor_token_raw(&mut self, tok: StrRef, flags: u8) {
        if let Some(idx) = self.cursor {
            self.ast.set_token(idx, tok, flags);
        }
    }

    fn push_token_char(&mut self, c: char) -> Result<()> {
        if self.token.len() + c.len_utf8() > TOKEN_MAX {
            return Err(ParseError::TokenCapacity { position: self.pos }.into());
        }
        self.token.push(c);
        Ok(())
    }

    fn invalid(&self, c: char) -> crate::error::Error {
        let state = self.state().map_or("top-level", PState::name);
        ParseError::UnexpectedChar { c, state, position: self.pos }.into()
    }
}

impl Default for Parser {
    fn default() -> Self {
        Self::new()
    }
}
