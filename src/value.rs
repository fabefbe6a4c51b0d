use crate::error::Result;
use crate::exec::ExecState;
use crate::parser::Parser;
use crate::strpool::{StrPool, StrRef};

/// Signature of a builtin. The flags byte carries the variant baked into the
/// environment entry at registration time, so one function can serve a family
/// of operators. Operands arrive on the evaluation stack; every builtin pops
/// a fixed number of them.
pub type NativeFn = fn(&Parser, &mut ExecState, u8) -> Result<()>;

//===----------------------------------------------------------------------===//
// Value
//===----------------------------------------------------------------------===//

/// A runtime value. Everything is `Copy`: text lives in the string pool and
/// lambdas are AST node indices, so values move freely between the stack and
/// the environment without allocation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Value {
    Int(i16),
    Float(f32),
    Bool(bool),
    /// Interned text. Also what an unbound symbol evaluates to, which is how
    /// `define` receives its key.
    Str(StrRef),
    Native { f: NativeFn, flags: u8 },
    /// A callable, identified by the AST node of its `lambda` form.
    Lambda(usize),
    /// Sentinel bracketing the argument bindings of an active call to the
    /// lambda at this node index.
    ArgsStart(usize),
    ArgsEnd(usize),
    /// Stack marker pushed when a `begin` node at this index starts, so its
    /// cleanup knows how far down to discard.
    Begin(usize),
}

impl Value {
    /// Widens to `i32` for arithmetic. Bools count as 0/1 and floats are
    /// truncated; anything else is not a number.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(n) => Some(i32::from(*n)),
            Value::Bool(b) => Some(i32::from(*b)),
            Value::Float(x) => Some(*x as i32),
            _ => None,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Bool(_) => "bool",
            Value::Str(_) => "str",
            Value::Native { .. } => "native",
            Value::Lambda(_) => "lambda",
            Value::ArgsStart(_) => "args-start",
            Value::ArgsEnd(_) => "args-end",
            Value::Begin(_) => "begin-marker",
        }
    }

    /// Human-readable rendering, resolving interned text against `pool`.
    pub fn render(&self, pool: &StrPool) -> String {
        match self {
            Value::Int(n) => n.to_string(),
            Value::Float(x) => x.to_string(),
            Value::Bool(b) => if *b { "#t" } else { "#f" }.to_owned(),
            Value::Str(r) => pool.get(*r).to_owned(),
            Value::Native { flags, .. } => format!("#<native:{:#04x}>", flags),
            Value::Lambda(idx) => format!("#<lambda:{}>", idx),
            Value::ArgsStart(idx) => format!("#<args-start:{}>", idx),
            Value::ArgsEnd(idx) => format!("#<args-end:{}>", idx),
            Value::Begin(idx) => format!("#<begin:{}>", idx),
        }
    }
}
