//! An embeddable, resumable S-expression interpreter.
//!
//! The pipeline is deliberately incremental at both ends: the parser accepts
//! one character at a time and the evaluator performs one unit of work per
//! step, so a host can drive parsing and evaluation from any event loop and
//! interleave them with its own work.
//!
//! The building blocks are small and index-based. Text is interned once in a
//! [`strpool::StrPool`]; the [`ast::Ast`] is an arena of nodes referring to
//! interned tokens; [`exec::ExecState`] holds every bit of evaluation
//! progress (cursors, value stack, environment) outside the AST, which stays
//! read-only during execution.

pub mod ast;
pub mod builtins;
pub mod devtools;
pub mod env;
pub mod error;
pub mod exec;
pub mod parser;
pub mod repl;
pub mod strpool;
pub mod value;

pub use error::{Error, ParseError, Result};
pub use exec::{ExecState, StepOutcome};
pub use parser::Parser;
pub use value::Value;
