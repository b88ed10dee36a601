//! Lamina command-line interpreter.
//!
//! ```bash
//! lamina run script.lm -I lib/
//! lamina eval 'println(1 + 2)'
//! lamina repl --color never
//! ```

use std::{fs, io, path::PathBuf, process::ExitCode};

use clap::{Parser, Subcommand, ValueEnum};
use lamina::{
    ColorMode, DEFAULT_RECURSION_LIMIT, ExecutionContext, FileSystemSource, Interpreter,
    LaminaError, Repl, diagnostics,
};

#[derive(Parser)]
#[command(name = "lamina", version, about = "Lamina language interpreter")]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Maximum number of active function calls
    #[arg(
        long,
        global = true,
        env = "LAMINA_RECURSION_LIMIT",
        default_value_t = DEFAULT_RECURSION_LIMIT,
        value_parser = parse_limit
    )]
    recursion_limit: usize,

    /// Directory searched for included modules (repeatable)
    #[arg(
        short = 'I',
        long = "include-path",
        global = true,
        env = "LAMINA_PATH",
        value_delimiter = ':'
    )]
    include_paths: Vec<PathBuf>,

    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    color: ColorChoice,

    /// Overrides the LAMINA_LOG filter
    #[arg(long, global = true, value_enum)]
    log_level: Option<LogLevel>,
}

#[derive(Subcommand)]
enum Command {
    /// Run a Lamina script file
    Run { script: PathBuf },
    /// Start an interactive REPL session
    Repl,
    /// Evaluate a snippet of Lamina code
    Eval { source: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum ColorChoice {
    Auto,
    Always,
    Never,
}

impl From<ColorChoice> for ColorMode {
    fn from(choice: ColorChoice) -> Self {
        match choice {
            ColorChoice::Auto => ColorMode::Auto,
            ColorChoice::Always => ColorMode::Always,
            ColorChoice::Never => ColorMode::Never,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

fn parse_limit(raw: &str) -> Result<usize, String> {
    match raw.parse::<usize>() {
        Ok(0) => Err("recursion limit must be at least 1".to_string()),
        Ok(limit) => Ok(limit),
        Err(err) => Err(err.to_string()),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let use_colors = ColorMode::from(args.color).should_use_colors(diagnostics::supports_colors);
    setup_logging(args.log_level, use_colors);

    match run(args, use_colors) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            report(&err, use_colors);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args, use_colors: bool) -> Result<(), LaminaError> {
    match args.command.unwrap_or(Command::Repl) {
        Command::Run { script } => {
            let source = fs::read_to_string(&script)?;
            let script_dir = script
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .map_or_else(|| PathBuf::from("."), PathBuf::from);
            let mut search_paths = vec![script_dir];
            search_paths.extend(args.include_paths);
            let context = ExecutionContext {
                file_name: script.display().to_string(),
                recursion_limit: args.recursion_limit,
            };
            let mut interpreter = Interpreter::with_context(context)
                .with_module_source(FileSystemSource::new(search_paths));
            tracing::info!(script = %script.display(), "running script");
            interpreter.eval_source(&source)?;
            Ok(())
        }
        Command::Eval { source } => {
            let mut interpreter = interactive_interpreter(args.recursion_limit, args.include_paths);
            interpreter.eval_source(&source)?;
            Ok(())
        }
        Command::Repl => {
            let interpreter = interactive_interpreter(args.recursion_limit, args.include_paths);
            Repl::new(interpreter, use_colors).run()
        }
    }
}

fn interactive_interpreter(recursion_limit: usize, include_paths: Vec<PathBuf>) -> Interpreter {
    let mut search_paths = vec![PathBuf::from(".")];
    search_paths.extend(include_paths);
    let context = ExecutionContext {
        recursion_limit,
        ..ExecutionContext::default()
    };
    Interpreter::with_context(context).with_module_source(FileSystemSource::new(search_paths))
}

fn report(err: &LaminaError, use_colors: bool) {
    let mut stderr = io::stderr().lock();
    // Nothing sensible is left to do if stderr itself is gone.
    let _ = match err {
        LaminaError::Runtime(runtime) => {
            diagnostics::print_stack_trace(&mut stderr, runtime, use_colors)
        }
        other => diagnostics::print_error(&mut stderr, &other.to_string(), use_colors),
    };
}

fn setup_logging(log_level: Option<LogLevel>, use_colors: bool) {
    use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

    let filter = match log_level {
        Some(level) => EnvFilter::new(match level {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }),
        None => EnvFilter::try_from_env("LAMINA_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
    };

    let formatter = tracing_subscriber::fmt::layer()
        .with_writer(io::stderr)
        .with_ansi(use_colors)
        .with_target(false)
        .with_level(true);

    tracing_subscriber::registry()
        .with(formatter)
        .with(filter)
        .init();
}
