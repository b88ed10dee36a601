use std::{
    env, fmt,
    io::{self, IsTerminal, Write},
    path::PathBuf,
};

use thiserror::Error;

use crate::callstack::CallFrame;

/// Represents a byte span within a source file, plus the 1-based line it starts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceSpan {
    pub start: usize,
    pub end: usize,
    pub line: usize,
}

impl SourceSpan {
    pub const fn new(start: usize, end: usize, line: usize) -> Self {
        Self { start, end, line }
    }

    /// Span covering `self` through `other`, keeping the starting line.
    pub const fn to(self, other: SourceSpan) -> Self {
        Self {
            start: self.start,
            end: other.end,
            line: self.line,
        }
    }
}

/// Classification of a front-end diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticKind {
    Lexer,
    Parser,
}

/// Rich diagnostic information surfaced to end users.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    pub span: Option<SourceSpan>,
    pub notes: Vec<String>,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            notes: Vec::new(),
        }
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)?;
        if let Some(span) = self.span {
            write!(f, " (line {})", span.line)?;
        }
        for note in &self.notes {
            write!(f, "\n  note: {note}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Diagnostic {}

/// Taxonomy of evaluation failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Undefined variable or function.
    Name,
    /// The recursion limit was reached.
    StackOverflow,
    /// Any other evaluation failure.
    Runtime,
    /// `return`, `break` or `continue` escaped the construct that consumes it.
    ControlFlow,
    /// An `include` failed to locate or parse its module.
    Module,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::Name => "NameError",
            ErrorKind::StackOverflow => "StackOverflow",
            ErrorKind::Runtime => "RuntimeError",
            ErrorKind::ControlFlow => "ControlFlowError",
            ErrorKind::Module => "ModuleError",
        };
        f.write_str(label)
    }
}

/// Evaluation failure carrying the call chain that was active when it was raised.
///
/// `stack_trace` is ordered outermost call first, innermost last.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct RuntimeError {
    pub kind: ErrorKind,
    pub message: String,
    pub span: Option<SourceSpan>,
    pub stack_trace: Vec<CallFrame>,
}

impl RuntimeError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            span: None,
            stack_trace: Vec::new(),
        }
    }

    /// Shorthand for a plain [`ErrorKind::Runtime`] failure, the usual builtin error.
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Runtime, message)
    }

    pub fn with_span(mut self, span: SourceSpan) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_trace(mut self, trace: Vec<CallFrame>) -> Self {
        self.stack_trace = trace;
        self
    }
}

/// Failure to bring a module into the interpreter.
///
/// Returned by `Interpreter::load_module`; the caller decides whether to abort.
#[derive(Debug, Error)]
pub enum ModuleError {
    #[error("module `{name}` could not be located")]
    NotFound {
        name: String,
        searched: Vec<PathBuf>,
    },
    #[error("failed reading module `{name}`: {source}")]
    Io {
        name: String,
        #[source]
        source: io::Error,
    },
    #[error("failed parsing module `{name}`: {diagnostic}")]
    Parse { name: String, diagnostic: Diagnostic },
    #[error("module `{name}` failed during execution: {source}")]
    Execution {
        name: String,
        #[source]
        source: Box<RuntimeError>,
    },
}

/// Unified error type for the Lamina toolchain.
#[derive(Debug, Error)]
pub enum LaminaError {
    #[error("{0}")]
    Diagnostic(#[from] Diagnostic),
    #[error("{0}")]
    Runtime(#[from] RuntimeError),
    #[error("{0}")]
    Module(#[from] ModuleError),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, LaminaError>;

/// ANSI color codes for terminal output.
mod colors {
    pub const ERROR: &str = "\x1b[1;31m";
    pub const WARNING: &str = "\x1b[1;33m";
    pub const FRAME: &str = "\x1b[36m";
    pub const DIM: &str = "\x1b[2m";
    pub const RESET: &str = "\x1b[0m";
}

/// Color output mode selected by the host.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ColorMode {
    /// Ask [`supports_colors`].
    #[default]
    Auto,
    Always,
    Never,
}

impl ColorMode {
    /// Resolve to the explicit flag the printers take.
    ///
    /// The probe is only consulted for `Auto`; an explicit choice always wins.
    pub fn should_use_colors(self, probe: impl FnOnce() -> bool) -> bool {
        match self {
            ColorMode::Auto => probe(),
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

/// Capability probe: stderr is a terminal, `NO_COLOR` is unset and `TERM` is not `dumb`.
pub fn supports_colors() -> bool {
    if env::var_os("NO_COLOR").is_some() {
        return false;
    }
    if env::var("TERM").is_ok_and(|term| term == "dumb") {
        return false;
    }
    io::stderr().is_terminal()
}

fn paint<W: Write>(out: &mut W, color: &str, text: &str, use_colors: bool) -> io::Result<()> {
    if use_colors {
        write!(out, "{color}{text}{}", colors::RESET)
    } else {
        write!(out, "{text}")
    }
}

pub fn print_error<W: Write>(out: &mut W, message: &str, use_colors: bool) -> io::Result<()> {
    paint(out, colors::ERROR, "error", use_colors)?;
    writeln!(out, ": {message}")
}

pub fn print_warning<W: Write>(out: &mut W, message: &str, use_colors: bool) -> io::Result<()> {
    paint(out, colors::WARNING, "warning", use_colors)?;
    writeln!(out, ": {message}")
}

/// Render `error` followed by one line per captured frame, outermost call first.
pub fn print_stack_trace<W: Write>(
    out: &mut W,
    error: &RuntimeError,
    use_colors: bool,
) -> io::Result<()> {
    print_error(out, &error.to_string(), use_colors)?;
    if error.stack_trace.is_empty() {
        return Ok(());
    }
    paint(
        out,
        colors::DIM,
        "stack trace (most recent call last):",
        use_colors,
    )?;
    writeln!(out)?;
    for frame in &error.stack_trace {
        write!(out, "  at ")?;
        paint(out, colors::FRAME, &frame.function_name, use_colors)?;
        writeln!(out, " ({}:{})", frame.file_name, frame.line)?;
    }
    Ok(())
}

/// [`print_stack_trace`] into a `String`.
pub fn render_stack_trace(error: &RuntimeError, use_colors: bool) -> String {
    let mut buffer = Vec::new();
    // Writing into a Vec cannot fail.
    let _ = print_stack_trace(&mut buffer, error, use_colors);
    String::from_utf8_lossy(&buffer).into_owned()
}
