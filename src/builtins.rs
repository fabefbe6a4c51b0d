use tracing::trace;

use crate::env::{Env, ENV_FLAG_BUILTIN};
use crate::error::{Error, Result};
use crate::exec::ExecState;
use crate::parser::Parser;
use crate::value::Value;

//===----------------------------------------------------------------------===//
// Operator variant flags
//
// One arithmetic callback and one comparison callback serve the whole
// operator family; the flags stored next to the function pointer select the
// variant.
//===----------------------------------------------------------------------===//

pub const ARI_ADD: u8 = 0x10;
pub const ARI_MUL: u8 = 0x20;

pub const CMP_GT: u8 = 0x10;
pub const CMP_LT: u8 = 0x20;
pub const CMP_EQ: u8 = 0x40;

/// Seeds `env` with the builtin bindings. Interns each operator name so the
/// AST's operator tokens resolve to the same references.
pub fn register(parser: &mut Parser, env: &mut Env) {
    let mut seed = |name: &str, value: Value| {
        let name = parser.strpool_mut().intern(name);
        env.define_flagged(name, value, ENV_FLAG_BUILTIN);
    };
    seed("define", Value::Native { f: native_define, flags: 0 });
    seed("+", Value::Native { f: native_arithmetic, flags: ARI_ADD });
    seed("*", Value::Native { f: native_arithmetic, flags: ARI_MUL });
    seed(">", Value::Native { f: native_cmp, flags: CMP_GT });
    seed("<", Value::Native { f: native_cmp, flags: CMP_LT });
    seed("=", Value::Native { f: native_cmp, flags: CMP_EQ });
}

//===----------------------------------------------------------------------===//
// Callbacks
//
// Every builtin pops a fixed two operands. Surplus call-site operands are
// left on the stack; missing ones surface as an underflow error.
//===----------------------------------------------------------------------===//

/// `(define key value)`. The key arrives on the stack as bare text because an
/// unbound symbol evaluates to itself. The bound value is pushed back as the
/// form's result.
fn native_define(parser: &Parser, exec: &mut ExecState, _flags: u8) -> Result<()> {
    let value = exec.pop()?;
    let key = match exec.pop()? {
        Value::Str(r) => r,
        other => {
            return Err(Error::Type(format!(
                "define key must be an unbound symbol, got {}",
                other.type_name()
            )))
        }
    };
    trace!(key = parser.strpool().get(key), ?value, "define");
    exec.env_mut().define(key, value);
    exec.push(value);
    Ok(())
}

/// Binary `+` and `*`. Accumulates in `i32` with wrapping and narrows the
/// result back to the value width.
fn native_arithmetic(_parser: &Parser, exec: &mut ExecState, flags: u8) -> Result<()> {
    let b = pop_int(exec)?;
    let a = pop_int(exec)?;
    let acc = if flags & ARI_MUL != 0 {
        a.wrapping_mul(b)
    } else {
        a.wrapping_add(b)
    };
    exec.push(Value::Int(acc as i16));
    Ok(())
}

/// Binary `<`, `>` and `=` over numbers, producing a bool.
fn native_cmp(_parser: &Parser, exec: &mut ExecState, flags: u8) -> Result<()> {
    let b = pop_int(exec)?;
    let a = pop_int(exec)?;
    let result = if flags & CMP_GT != 0 {
        a > b
    } else if flags & CMP_LT != 0 {
        a < b
    } else {
        a == b
    };
    exec.push(Value::Bool(result));
    Ok(())
}

fn pop_int(exec: &mut ExecState) -> Result<i32> {
    let operand = exec.pop()?;
    operand.as_int().ok_or_else(|| {
        Error::Type(format!(
            "expected a numeric operand, got {}",
            operand.type_name()
        ))
    })
}
