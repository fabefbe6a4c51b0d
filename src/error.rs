use std::fmt;

//===----------------------------------------------------------------------===//
// Error
//===----------------------------------------------------------------------===//

pub type Result<T> = std::result::Result<T, Error>;

/// Interpreter error taxonomy. Parse errors surface from the per-character
/// feed; everything else is fatal for the execution state that produced it,
/// since the stack and environment invariants may already be violated.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    Parse(ParseError),
    /// A builtin was handed an operand of the wrong type.
    Type(String),
    /// Popping from an empty evaluation stack.
    StackUnderflow,
    /// No `ArgsStart`/`ArgsEnd` bracket found while unwinding a lambda call.
    /// Internal consistency failure, not a user error.
    MissingArgsFrame,
    /// Evaluation failure that is not a type error (malformed special form,
    /// exhausted step budget, ...).
    Eval(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Parse(e) => write!(f, "{}", e),
            Error::Type(e) => write!(f, "Type error: {}", e),
            Error::StackUnderflow => write!(f, "Evaluation stack underflow"),
            Error::MissingArgsFrame => {
                write!(f, "No argument frame found in the environment")
            }
            Error::Eval(e) => write!(f, "Evaluation error: {}", e),
        }
    }
}

impl From<ParseError> for Error {
    fn from(e: ParseError) -> Self {
        Error::Parse(e)
    }
}

//===----------------------------------------------------------------------===//
// ParseError
//===----------------------------------------------------------------------===//

#[derive(Debug, Clone, PartialEq)]
pub enum ParseError {
    /// A character the current lexical state does not allow (e.g. an
    /// unmatched `)` at top level).
    UnexpectedChar { c: char, state: &'static str, position: usize },
    /// Input ended with lexical states still open (unclosed parens or an
    /// unterminated string).
    UnterminatedInput { depth: usize },
    /// A single token exceeded the fixed token-length limit.
    TokenCapacity { position: usize },
    /// A node exceeded the fixed per-node child-count limit.
    ChildCapacity { node: usize },
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseError::UnexpectedChar { c, state, position } => {
                write!(
                    f,
                    "Parse error: unexpected {:?} at byte {} (state: {})",
                    c, position, state
                )
            }
            ParseError::UnterminatedInput { depth } => {
                write!(f, "Parse error: input ended with {} open form(s)", depth)
            }
            ParseError::TokenCapacity { position } => {
                write!(f, "Parse error: token too long at byte {}", position)
            }
            ParseError::ChildCapacity { node } => {
                write!(f, "Parse error: too many children under node {}", node)
            }
        }
    }
}
