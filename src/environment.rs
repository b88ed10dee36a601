use std::io::{self, Write};

use indexmap::IndexMap;

use crate::value::Value;

pub type Scope = IndexMap<String, Value>;

/// Stack of variable scopes; index 0 is the permanent global scope.
#[derive(Debug, Clone)]
pub struct Environment {
    scopes: Vec<Scope>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::new());
    }

    /// Pop the innermost scope. The global scope is never removed.
    pub fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "attempted to pop the global scope");
        if self.scopes.len() > 1 {
            self.scopes.pop();
        }
    }

    /// Number of scopes, counting the global one.
    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Bind `name` in the innermost scope, shadowing any outer binding.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.innermost_mut().insert(name.into(), value);
    }

    pub fn set_global(&mut self, name: impl Into<String>, value: Value) {
        self.scopes[0].insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scopes.iter().rev().find_map(|scope| scope.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Overwrite the nearest existing binding of `name`.
    ///
    /// Returns `false` when no scope binds it; nothing is created in that case.
    pub fn assign(&mut self, name: &str, value: Value) -> bool {
        match self
            .scopes
            .iter_mut()
            .rev()
            .find_map(|scope| scope.get_mut(name))
        {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn scopes(&self) -> &[Scope] {
        &self.scopes
    }

    /// Remove every non-global scope, leaving only globals visible.
    pub(crate) fn detach_locals(&mut self) -> Vec<Scope> {
        self.scopes.split_off(1)
    }

    /// Reattach scopes taken by [`Environment::detach_locals`].
    ///
    /// Anything pushed since the detach is discarded first.
    pub(crate) fn restore_locals(&mut self, locals: Vec<Scope>) {
        self.scopes.truncate(1);
        self.scopes.extend(locals);
    }

    pub fn write_variables<W: Write>(&self, out: &mut W) -> io::Result<()> {
        for (depth, scope) in self.scopes.iter().enumerate() {
            if depth == 0 {
                writeln!(out, "scope 0 (global):")?;
            } else {
                writeln!(out, "scope {depth}:")?;
            }
            for (name, value) in scope {
                writeln!(out, "  {name} = {value:?}")?;
            }
        }
        Ok(())
    }

    fn innermost_mut(&mut self) -> &mut Scope {
        let last = self.scopes.len() - 1;
        &mut self.scopes[last]
    }
}
