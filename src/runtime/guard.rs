//! RAII guards for interpreter bookkeeping.
//!
//! Each guard holds `&mut Interpreter` and derefs to it, so evaluation goes
//! through the guard while it is alive. Dropping a guard undoes exactly what
//! creating it did, on normal exit, on `?`, and during unwinding.
//!
//! ```text
//! let mut call = interpreter.enter_call(frame)?;
//! call.env.set(param, arg);
//! call.execute(stmt)?;
//! // frame and scope popped here
//! ```

use std::{
    mem,
    ops::{Deref, DerefMut},
};

use super::Interpreter;
use crate::{callstack::CallFrame, diagnostics::RuntimeError, environment::Scope};

/// Pops one environment scope on drop.
pub(crate) struct ScopeGuard<'a> {
    interpreter: &'a mut Interpreter,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.interpreter.env.pop_scope();
    }
}

impl Deref for ScopeGuard<'_> {
    type Target = Interpreter;

    fn deref(&self) -> &Self::Target {
        self.interpreter
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.interpreter
    }
}

/// One active user-function call: pops its scope and its frame on drop.
pub(crate) struct CallGuard<'a> {
    interpreter: &'a mut Interpreter,
}

impl Drop for CallGuard<'_> {
    fn drop(&mut self) {
        self.interpreter.env.pop_scope();
        self.interpreter.call_stack.pop();
    }
}

impl Deref for CallGuard<'_> {
    type Target = Interpreter;

    fn deref(&self) -> &Self::Target {
        self.interpreter
    }
}

impl DerefMut for CallGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.interpreter
    }
}

/// Module execution context: only the global scope is visible and frames are
/// attributed to the module's file. Both are restored on drop.
pub(crate) struct ModuleGuard<'a> {
    interpreter: &'a mut Interpreter,
    saved_locals: Vec<Scope>,
    saved_file: String,
}

impl Drop for ModuleGuard<'_> {
    fn drop(&mut self) {
        let locals = mem::take(&mut self.saved_locals);
        self.interpreter.env.restore_locals(locals);
        self.interpreter.current_file = mem::take(&mut self.saved_file);
    }
}

impl Deref for ModuleGuard<'_> {
    type Target = Interpreter;

    fn deref(&self) -> &Self::Target {
        self.interpreter
    }
}

impl DerefMut for ModuleGuard<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.interpreter
    }
}

impl Interpreter {
    pub(crate) fn scoped(&mut self) -> ScopeGuard<'_> {
        self.env.push_scope();
        ScopeGuard { interpreter: self }
    }

    /// Push `frame` and a fresh scope together.
    ///
    /// Fails with `StackOverflow` when the recursion limit is reached, in
    /// which case neither is pushed.
    pub(crate) fn enter_call(&mut self, frame: CallFrame) -> Result<CallGuard<'_>, RuntimeError> {
        self.call_stack.push(frame)?;
        self.env.push_scope();
        Ok(CallGuard { interpreter: self })
    }

    pub(crate) fn enter_module(&mut self, origin: String) -> ModuleGuard<'_> {
        let saved_locals = self.env.detach_locals();
        let saved_file = mem::replace(&mut self.current_file, origin);
        ModuleGuard {
            interpreter: self,
            saved_locals,
            saved_file,
        }
    }
}
