use std::rc::Rc;

use super::Interpreter;
use crate::{
    diagnostics::{ErrorKind, ModuleError, RuntimeError, SourceSpan},
    parser,
};

impl Interpreter {
    /// Load and run module `name` unless it has been seen before.
    ///
    /// The name is recorded before anything else happens, so a module that
    /// includes itself (directly or through others) terminates, and a module
    /// whose load failed is not retried.
    pub fn load_module(&mut self, name: &str) -> Result<(), ModuleError> {
        if !self.modules.mark_loaded(name) {
            tracing::debug!(module = name, "module already loaded");
            return Ok(());
        }

        let text = self.module_source.fetch(name)?;
        tracing::debug!(module = name, origin = %text.origin, "loading module");
        let program = parser::parse_program(&text.source).map_err(|diagnostic| {
            ModuleError::Parse {
                name: name.to_string(),
                diagnostic,
            }
        })?;
        let program = Rc::new(program);
        self.modules.retain(Rc::clone(&program));

        let mut module = self.enter_module(text.origin);
        module
            .run_top_level(&program.items)
            .map_err(|source| ModuleError::Execution {
                name: name.to_string(),
                source: Box::new(source),
            })?;
        Ok(())
    }

    /// `include "name"`: module failures surface as runtime errors, keeping the
    /// trace of a failure raised inside the module's code.
    pub(super) fn include(&mut self, name: &str, span: SourceSpan) -> Result<(), RuntimeError> {
        match self.load_module(name) {
            Ok(()) => Ok(()),
            Err(ModuleError::Execution { source, .. }) => Err(*source),
            Err(err) => Err(self.error(ErrorKind::Module, err.to_string(), span)),
        }
    }
}
