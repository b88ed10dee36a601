//! Core library for the Lamina scripting language.
//! Implements lexing, parsing, and a tree-walking evaluator with explicit
//! scope, call-stack, and module bookkeeping, plus the REPL used by the
//! `lamina` binary.

pub mod ast;
pub mod callstack;
pub mod diagnostics;
pub mod environment;
pub mod extensions;
pub mod functions;
pub mod lexer;
pub mod modules;
pub mod parser;
pub mod repl;
pub mod runtime;
pub mod stack;
pub mod stdlib;
pub mod value;

pub use callstack::{CallFrame, DEFAULT_RECURSION_LIMIT};
pub use diagnostics::{
    ColorMode, Diagnostic, DiagnosticKind, ErrorKind, LaminaError, ModuleError, RuntimeError,
    SourceSpan,
};
pub use extensions::{EntryFunction, ExtensionRegistry};
pub use modules::{FileSystemSource, MemorySource, ModuleSource, ModuleText};
pub use repl::Repl;
pub use runtime::{ExecutionContext, Interpreter, Signal};
pub use value::{Value, ValueKind};
