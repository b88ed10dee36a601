use std::io::{self, Write};

use rustyline::{DefaultEditor, error::ReadlineError};

use crate::{
    diagnostics::{self, LaminaError, Result},
    runtime::Interpreter,
};

pub struct Repl {
    interpreter: Interpreter,
    use_colors: bool,
}

impl Repl {
    pub fn new(interpreter: Interpreter, use_colors: bool) -> Self {
        Self {
            interpreter,
            use_colors,
        }
    }

    pub fn interpreter(&self) -> &Interpreter {
        &self.interpreter
    }

    pub fn run(&mut self) -> Result<()> {
        let mut editor = DefaultEditor::new().map_err(readline_error)?;
        loop {
            match editor.readline(">> ") {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed == ":quit" || trimmed == ":exit" {
                        break;
                    }
                    if trimmed.is_empty() {
                        continue;
                    }
                    editor.add_history_entry(trimmed).ok();
                    match trimmed {
                        ":vars" => {
                            self.interpreter.print_variables(&mut io::stdout().lock())?;
                            continue;
                        }
                        ":funcs" => {
                            self.print_functions()?;
                            continue;
                        }
                        _ => {}
                    }
                    self.eval_line(trimmed)?;
                }
                Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => break,
                Err(err) => return Err(readline_error(err)),
            }
        }
        Ok(())
    }

    /// Evaluate one line, echoing a non-null result. Evaluation errors are
    /// reported and the session continues; only terminal I/O failures escape.
    pub fn eval_line(&mut self, line: &str) -> Result<()> {
        match self.interpreter.eval_source(line) {
            Ok(value) if value.is_null() => {}
            Ok(value) => writeln!(io::stdout().lock(), "{value:?}")?,
            Err(LaminaError::Runtime(err)) => {
                diagnostics::print_stack_trace(&mut io::stderr().lock(), &err, self.use_colors)?;
            }
            Err(other) => {
                let message = other.to_string();
                diagnostics::print_error(&mut io::stderr().lock(), &message, self.use_colors)?;
            }
        }
        Ok(())
    }

    fn print_functions(&self) -> Result<()> {
        let mut out = io::stdout().lock();
        for name in self.interpreter.functions().user_function_names() {
            writeln!(out, "{name}")?;
        }
        Ok(())
    }
}

fn readline_error(err: ReadlineError) -> LaminaError {
    LaminaError::from(io::Error::other(err))
}
