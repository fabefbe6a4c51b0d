use tracing::debug;

use crate::error::{Error, Result};
use crate::strpool::{StrPool, StrRef};
use crate::value::Value;

/// Entry created at interpreter startup rather than by user code. Dump
/// helpers skip these.
pub const ENV_FLAG_BUILTIN: u8 = 0x01;

//===----------------------------------------------------------------------===//
// Env
//===----------------------------------------------------------------------===//

#[derive(Copy, Clone, Debug)]
pub struct EnvEntry {
    pub flags: u8,
    pub name: StrRef,
    pub value: Value,
}

/// Flat binding list. Lambda calls do not get nested scopes; their argument
/// bindings are appended between `ArgsStart`/`ArgsEnd` sentinel entries and
/// pruned again when the call returns.
#[derive(Debug)]
pub struct Env {
    entries: Vec<EnvEntry>,
    args_start_name: StrRef,
    args_end_name: StrRef,
}

impl Env {
    pub fn new(pool: &mut StrPool) -> Self {
        Self {
            entries: Vec::new(),
            args_start_name: pool.intern("$args-start$"),
            args_end_name: pool.intern("$args-end$"),
        }
    }

    pub fn entries(&self) -> &[EnvEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks `name` up by scanning oldest entry first.
    ///
    /// Front-to-back scan order means the FIRST definition of a name wins
    /// over later ones, so lambda arguments cannot shadow an existing global
    /// of the same name. Redefinition appends but never takes effect.
    pub fn resolve(&self, name: StrRef) -> Option<Value> {
        self.entries.iter().find(|e| e.name == name).map(|e| e.value)
    }

    /// Appends a binding unconditionally. Existing entries for the same name
    /// are kept (see [`Env::resolve`] for which one wins).
    pub fn define(&mut self, name: StrRef, value: Value) {
        self.define_flagged(name, value, 0);
    }

    pub(crate) fn define_flagged(&mut self, name: StrRef, value: Value, flags: u8) {
        debug!(slot = self.entries.len(), ?value, "define");
        self.entries.push(EnvEntry { flags, name, value });
    }

    /// Opens an argument frame for a call to the lambda at `node`.
    pub(crate) fn push_args_start(&mut self, node: usize) {
        let name = self.args_start_name;
        self.define(name, Value::ArgsStart(node));
    }

    /// Seals the argument frame opened by [`Env::push_args_start`].
    pub(crate) fn push_args_end(&mut self, node: usize) {
        let name = self.args_end_name;
        self.define(name, Value::ArgsEnd(node));
    }

    /// Removes the most recent `ArgsStart`..`ArgsEnd` frame, including the
    /// sentinels, unbinding that call's arguments.
    pub(crate) fn prune_call_frame(&mut self) -> Result<()> {
        let start = self
            .entries
            .iter()
            .rposition(|e| matches!(e.value, Value::ArgsStart(_)))
            .ok_or(Error::MissingArgsFrame)?;
        let end = self.entries[start..]
            .iter()
            .position(|e| matches!(e.value, Value::ArgsEnd(_)))
            .map(|i| start + i)
            .ok_or(Error::MissingArgsFrame)?;
        debug!(start, end, "pruning call frame");
        self.entries.drain(start..=end);
        Ok(())
    }
}
