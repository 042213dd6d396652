//! Environment tables and the native-callback registry.
//!
//! One table is a flat `Vec` of name/value entries searched from the
//! tail, so the most recent binding of a name wins. Lambda calls append
//! their argument bindings between `ArgsStart`/`ArgsEnd` marker entries
//! and prune that segment when the frame is discarded; `define`d
//! bindings land after the markers and survive the call.

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use tracing::trace;

use sprig_ir::{NativeId, NodeId, Program, Value};

use crate::error::ExecError;
use crate::exec::ExecState;

bitflags! {
    /// Per-entry classification bits, mainly used by native callbacks to
    /// dispatch one function body over several registered names.
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct EnvFlags: u16 {
        /// Installed by [`crate::builtins::install`].
        const BUILTIN = 1 << 0;
        /// `>` comparison.
        const CMP_GT  = 1 << 1;
        /// `<` comparison.
        const CMP_LT  = 1 << 2;
        /// `=` comparison.
        const CMP_EQ  = 1 << 3;
        /// `+` arithmetic.
        const ARI_ADD = 1 << 4;
        /// `-` arithmetic.
        const ARI_SUB = 1 << 5;
        /// `*` arithmetic.
        const ARI_MUL = 1 << 6;
        /// `/` arithmetic.
        const ARI_DIV = 1 << 7;
    }
}

/// Host-provided callback invoked when a [`Value::Native`] is applied.
///
/// The callback pops its `ctx.argc` evaluated arguments off the state's
/// stack (last argument on top) and pushes exactly one result.
pub type NativeFn = fn(&mut ExecState, ctx: NativeCtx<'_>) -> Result<(), ExecError>;

/// Call context passed to a [`NativeFn`].
pub struct NativeCtx<'a> {
    /// The program being executed.
    pub program: &'a Program,
    /// The application node; its token is the name the callback was
    /// applied under.
    pub node: NodeId,
    /// Number of evaluated arguments on the stack.
    pub argc: usize,
    /// Opaque payload supplied at registration.
    pub payload: Option<Rc<dyn Any>>,
    /// Flags of the registered entry.
    pub flags: EnvFlags,
}

impl NativeCtx<'_> {
    /// The name this callback was applied under.
    pub fn name(&self) -> &str {
        self.program.token_text(self.node)
    }
}

/// One registered native callback.
#[derive(Clone)]
pub(crate) struct NativeEntry {
    pub(crate) func: NativeFn,
    pub(crate) payload: Option<Rc<dyn Any>>,
    pub(crate) flags: EnvFlags,
}

impl fmt::Debug for NativeEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeEntry")
            .field("flags", &self.flags)
            .field("payload", &self.payload.is_some())
            .finish()
    }
}

/// One binding.
#[derive(Clone, Debug)]
pub struct EnvEntry {
    /// Binding name; empty for marker entries.
    pub name: String,
    pub value: Value,
}

/// A flat environment table plus its native-callback registry.
#[derive(Debug)]
pub struct EnvTable {
    entries: Vec<EnvEntry>,
    natives: Vec<NativeEntry>,
    /// Maximum number of entries; appends past it are `EnvOverflow`.
    limit: usize,
}

impl EnvTable {
    /// An empty table. Callers wanting the default builtins go through
    /// [`crate::builtins::install`].
    pub fn new(limit: usize) -> Self {
        EnvTable {
            entries: Vec::new(),
            natives: Vec::new(),
            limit,
        }
    }

    /// Look up the most recent non-marker binding of `name`.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        self.entries
            .iter()
            .rev()
            .find(|e| !e.value.is_marker() && e.name == name)
            .map(|e| e.value)
    }

    /// Bind `name`, overwriting its most recent binding if one exists.
    pub fn define(&mut self, name: &str, value: Value) -> Result<(), ExecError> {
        trace!(name, value = ?value, "define");
        if let Some(entry) = self
            .entries
            .iter_mut()
            .rev()
            .find(|e| !e.value.is_marker() && e.name == name)
        {
            entry.value = value;
            return Ok(());
        }
        self.append(EnvEntry {
            name: name.to_owned(),
            value,
        })
    }

    /// Append a binding unconditionally: argument bindings shadow, never
    /// overwrite, so recursion levels keep distinct entries.
    pub(crate) fn bind_arg(&mut self, name: &str, value: Value) -> Result<(), ExecError> {
        self.append(EnvEntry {
            name: name.to_owned(),
            value,
        })
    }

    /// Append a frame/scope marker entry.
    pub(crate) fn push_marker(&mut self, marker: Value) -> Result<(), ExecError> {
        debug_assert!(marker.is_marker());
        self.append(EnvEntry {
            name: String::new(),
            value: marker,
        })
    }

    fn append(&mut self, entry: EnvEntry) -> Result<(), ExecError> {
        if self.entries.len() >= self.limit {
            return Err(ExecError::EnvOverflow);
        }
        self.entries.push(entry);
        Ok(())
    }

    /// Drop the most recent `ArgsStart(lambda) ..= ArgsEnd(lambda)`
    /// segment. Entries appended after the frame (`define`s made by the
    /// body) survive.
    pub(crate) fn prune_args(&mut self, lambda: NodeId) {
        let Some(start) = self
            .entries
            .iter()
            .rposition(|e| e.value == Value::ArgsStart(lambda))
        else {
            return;
        };
        let end = self.entries[start..]
            .iter()
            .position(|e| e.value == Value::ArgsEnd(lambda))
            .map_or(self.entries.len(), |off| start + off + 1);
        trace!(lambda = ?lambda, pruned = end - start, "prune args");
        self.entries.drain(start..end);
    }

    /// Register a native callback and bind `name` to it.
    pub fn register(
        &mut self,
        name: &str,
        func: NativeFn,
        payload: Option<Rc<dyn Any>>,
        flags: EnvFlags,
    ) -> Result<NativeId, ExecError> {
        let id = NativeId(u32::try_from(self.natives.len()).map_err(|_| ExecError::EnvOverflow)?);
        self.natives.push(NativeEntry {
            func,
            payload,
            flags,
        });
        self.define(name, Value::Native(id))?;
        Ok(id)
    }

    pub(crate) fn native(&self, id: NativeId) -> Option<NativeEntry> {
        self.natives.get(id.index()).cloned()
    }

    /// Number of entries, markers included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A single-threaded shared handle to an [`EnvTable`].
///
/// Several execution states may target one table (a host-wide global
/// scope); `Rc<RefCell<_>>` because execution is single-threaded and
/// suspension points are only ever between `step()` calls, so no borrow
/// is held across them.
#[derive(Clone, Debug)]
pub struct SharedEnv(Rc<RefCell<EnvTable>>);

impl SharedEnv {
    pub fn new(table: EnvTable) -> Self {
        SharedEnv(Rc::new(RefCell::new(table)))
    }

    #[inline]
    pub fn borrow(&self) -> Ref<'_, EnvTable> {
        self.0.borrow()
    }

    #[inline]
    pub fn borrow_mut(&self) -> RefMut<'_, EnvTable> {
        self.0.borrow_mut()
    }
}

/// Which environment an execution state binds into.
#[derive(Clone, Debug, Default)]
pub enum EnvTarget {
    /// A fresh private table with the default builtins installed.
    #[default]
    Local,
    /// A host-provided table, shared between execution states.
    Shared(SharedEnv),
}
