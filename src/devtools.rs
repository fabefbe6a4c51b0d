//! Introspection helpers for debugging programs and the interpreter itself.
//! Everything renders to a `String` so callers decide where it goes.

use std::fmt::Write;

use colored::Colorize;

use crate::ast::Ast;
use crate::env::{Env, ENV_FLAG_BUILTIN};
use crate::exec::ExecState;
use crate::parser::Parser;
use crate::strpool::StrPool;

/// Renders the AST as an indented tree, one node per line.
pub fn dump_ast(parser: &Parser) -> String {
    let mut out = String::new();
    if !parser.ast().is_empty() {
        dump_node(parser.ast(), parser.strpool(), 0, 0, &mut out);
    }
    out
}

fn dump_node(ast: &Ast, pool: &StrPool, idx: usize, depth: usize, out: &mut String) {
    let node = ast.node(idx);
    let token = match node.token() {
        Some(t) => pool.get(t),
        None => "()",
    };
    let _ = writeln!(
        out,
        "{:indent$}{} {} [{:#04x}]",
        "",
        format!("#{}", idx).dimmed(),
        token.bold(),
        node.flags(),
        indent = depth * 2
    );
    for &child in node.children() {
        dump_node(ast, pool, child, depth + 1, out);
    }
}

/// Re-serializes the AST back to source text. Round-trips through the parser:
/// parsing the output again yields a structurally identical tree.
pub fn ast_to_source(parser: &Parser) -> String {
    let mut out = String::new();
    if !parser.ast().is_empty() {
        write_node(parser.ast(), parser.strpool(), 0, &mut out);
    }
    out
}

fn write_node(ast: &Ast, pool: &StrPool, idx: usize, out: &mut String) {
    let node = ast.node(idx);
    if node.is_string() {
        if let Some(t) = node.token() {
            let _ = write!(out, "\"{}\"", pool.get(t));
        }
        return;
    }
    match (node.token(), node.children().is_empty()) {
        (Some(t), true) => out.push_str(pool.get(t)),
        (token, _) => {
            out.push('(');
            if let Some(t) = token {
                out.push_str(pool.get(t));
            }
            for (i, &child) in node.children().iter().enumerate() {
                if i > 0 || token.is_some() {
                    out.push(' ');
                }
                write_node(ast, pool, child, out);
            }
            out.push(')');
        }
    }
}

/// Renders the user-visible environment, oldest binding first. Builtin
/// entries are skipped.
pub fn dump_env(exec: &ExecState, pool: &StrPool) -> String {
    let mut out = String::new();
    for (slot, entry) in exec.env().entries().iter().enumerate() {
        if entry.flags & ENV_FLAG_BUILTIN != 0 {
            continue;
        }
        let _ = writeln!(
            out,
            "{} {} = {}",
            format!("[{}]", slot).dimmed(),
            pool.get(entry.name).bold(),
            entry.value.render(pool)
        );
    }
    out
}

/// Renders the value stack, top last.
pub fn dump_stack(exec: &ExecState, pool: &StrPool) -> String {
    let mut out = String::new();
    for (depth, value) in exec.stack().iter().enumerate() {
        let _ = writeln!(
            out,
            "{} {}",
            format!("[{}]", depth).dimmed(),
            value.render(pool)
        );
    }
    out
}

/// Exposes [`Env`] in the signature so the helper also works on an
/// environment detached from an execution state.
pub fn dump_env_entries(env: &Env, pool: &StrPool) -> String {
    let mut out = String::new();
    for entry in env.entries() {
        let _ = writeln!(
            out,
            "{} = {} ({:#04x})",
            pool.get(entry.name),
            entry.value.render(pool),
            entry.flags
        );
    }
    out
}
