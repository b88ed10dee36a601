use std::{fmt, rc::Rc};

use indexmap::IndexMap;

use crate::{
    ast::FunctionDef,
    diagnostics::RuntimeError,
    runtime::Interpreter,
    value::Value,
};

/// Arity accepted by variadic builtins.
pub const VARIADIC: usize = usize::MAX;

pub type BuiltinCallback = dyn Fn(&mut Interpreter, &[Value]) -> Result<Value, RuntimeError>;

/// A native function installed by the standard library or an extension.
pub struct NativeFunction {
    pub name: String,
    pub arity: usize,
    pub callback: Rc<BuiltinCallback>,
}

impl NativeFunction {
    pub fn call(
        &self,
        interpreter: &mut Interpreter,
        args: &[Value],
    ) -> Result<Value, RuntimeError> {
        if self.arity != VARIADIC && args.len() != self.arity {
            return Err(RuntimeError::runtime(format!(
                "function `{}` expected {} arguments but received {}",
                self.name,
                self.arity,
                args.len()
            )));
        }
        (self.callback)(interpreter, args)
    }
}

impl fmt::Debug for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFunction")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish_non_exhaustive()
    }
}

/// What a call name resolved to.
#[derive(Debug, Clone)]
pub enum Callable {
    User(Rc<FunctionDef>),
    Builtin(Rc<NativeFunction>),
}

/// Name-keyed function tables. User definitions shadow builtins of the same name.
#[derive(Debug, Default)]
pub struct FunctionRegistry {
    user: IndexMap<String, Rc<FunctionDef>>,
    builtins: IndexMap<String, Rc<NativeFunction>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a user-defined function; returns the definition it replaced.
    pub fn add_function(
        &mut self,
        name: impl Into<String>,
        definition: Rc<FunctionDef>,
    ) -> Option<Rc<FunctionDef>> {
        self.user.insert(name.into(), definition)
    }

    pub fn add_builtin(&mut self, function: NativeFunction) -> Option<Rc<NativeFunction>> {
        self.builtins
            .insert(function.name.clone(), Rc::new(function))
    }

    pub fn resolve(&self, name: &str) -> Option<Callable> {
        if let Some(definition) = self.user.get(name) {
            return Some(Callable::User(Rc::clone(definition)));
        }
        self.builtins
            .get(name)
            .map(|native| Callable::Builtin(Rc::clone(native)))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.user.contains_key(name) || self.builtins.contains_key(name)
    }

    pub fn is_builtin(&self, name: &str) -> bool {
        self.builtins.contains_key(name)
    }

    pub fn user_function_names(&self) -> impl Iterator<Item = &str> {
        self.user.keys().map(String::as_str)
    }

    pub fn builtin_names(&self) -> impl Iterator<Item = &str> {
        self.builtins.keys().map(String::as_str)
    }
}
