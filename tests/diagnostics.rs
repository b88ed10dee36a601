use lamina::{
    callstack::CallFrame,
    diagnostics::{
        self, ColorMode, Diagnostic, DiagnosticKind, ErrorKind, RuntimeError, SourceSpan,
    },
    runtime::Interpreter,
    LaminaError,
};
use pretty_assertions::assert_eq;

fn sample_error() -> RuntimeError {
    RuntimeError::new(ErrorKind::Runtime, "division by zero").with_trace(vec![
        CallFrame::new("main", "app.lm", 12),
        CallFrame::new("divide", "math.lm", 3),
    ])
}

#[test]
fn renders_trace_outermost_first() {
    let rendered = diagnostics::render_stack_trace(&sample_error(), false);
    assert_eq!(
        rendered,
        "error: RuntimeError: division by zero\n\
         stack trace (most recent call last):\n  \
         at main (app.lm:12)\n  \
         at divide (math.lm:3)\n"
    );
}

#[test]
fn trace_without_frames_prints_only_the_header() {
    let error = RuntimeError::new(ErrorKind::Name, "undefined variable `x`");
    assert_eq!(
        diagnostics::render_stack_trace(&error, false),
        "error: NameError: undefined variable `x`\n"
    );
}

#[test]
fn colors_are_explicit() {
    let colored = diagnostics::render_stack_trace(&sample_error(), true);
    assert!(colored.contains("\x1b["));
    assert!(colored.contains("divide"));

    let plain = diagnostics::render_stack_trace(&sample_error(), false);
    assert!(!plain.contains('\x1b'));
}

#[test]
fn error_and_warning_lines() {
    let mut out = Vec::new();
    diagnostics::print_error(&mut out, "bad thing", false).expect("write");
    diagnostics::print_warning(&mut out, "odd thing", false).expect("write");
    assert_eq!(
        String::from_utf8(out).expect("utf-8"),
        "error: bad thing\nwarning: odd thing\n"
    );
}

#[test]
fn color_mode_only_probes_when_auto() {
    assert!(ColorMode::Always.should_use_colors(|| panic!("probe must not run")));
    assert!(!ColorMode::Never.should_use_colors(|| panic!("probe must not run")));
    assert!(ColorMode::Auto.should_use_colors(|| true));
    assert!(!ColorMode::Auto.should_use_colors(|| false));
    assert_eq!(ColorMode::default(), ColorMode::Auto);
}

#[test]
fn captured_runtime_trace_renders_with_lines() {
    let mut interpreter = Interpreter::new();
    let source = "func check(x) {\n    assert(x > 0, \"x must be positive\")\n}\ncheck(-3)\n";
    let err = match interpreter.eval_source(source) {
        Err(LaminaError::Runtime(err)) => err,
        other => panic!("expected runtime error, found {other:?}"),
    };
    assert_eq!(
        diagnostics::render_stack_trace(&err, false),
        "error: RuntimeError: assertion failed: x must be positive\n\
         stack trace (most recent call last):\n  \
         at check (<script>:4)\n"
    );
}

#[test]
fn diagnostic_display_includes_line_and_notes() {
    let diagnostic = Diagnostic::new(DiagnosticKind::Parser, "expected `)` after arguments")
        .with_span(SourceSpan::new(10, 11, 3))
        .with_note("found `;`");
    assert_eq!(
        diagnostic.to_string(),
        "Parser: expected `)` after arguments (line 3)\n  note: found `;`"
    );
}

#[test]
fn error_kinds_use_their_report_names() {
    let names: Vec<String> = [
        ErrorKind::Name,
        ErrorKind::StackOverflow,
        ErrorKind::Runtime,
        ErrorKind::ControlFlow,
        ErrorKind::Module,
    ]
    .iter()
    .map(ToString::to_string)
    .collect();
    assert_eq!(
        names,
        vec![
            "NameError",
            "StackOverflow",
            "RuntimeError",
            "ControlFlowError",
            "ModuleError"
        ]
    );
}
