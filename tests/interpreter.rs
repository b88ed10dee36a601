use std::{cell::Cell, rc::Rc};

use lamina::{
    callstack::{CallFrame, CallStack},
    diagnostics::{ErrorKind, LaminaError, RuntimeError},
    parser,
    runtime::{ExecutionContext, Interpreter, Signal},
    value::{Value, ValueKind},
};

fn eval(source: &str) -> Value {
    let mut interpreter = Interpreter::new();
    interpreter
        .eval_source(source)
        .expect("evaluation should succeed")
}

fn runtime_error(interpreter: &mut Interpreter, source: &str) -> RuntimeError {
    match interpreter.eval_source(source) {
        Ok(value) => panic!("expected error, received value {value:?}"),
        Err(LaminaError::Runtime(err)) => err,
        Err(other) => panic!("expected runtime error, received {other}"),
    }
}

fn eval_error(source: &str) -> RuntimeError {
    runtime_error(&mut Interpreter::new(), source)
}

fn expect_int(value: &Value) -> i64 {
    match value.kind() {
        ValueKind::Int(n) => *n,
        _ => panic!("expected Int, found {}", value.type_name()),
    }
}

fn frame_names(err: &RuntimeError) -> Vec<&str> {
    err.stack_trace
        .iter()
        .map(|frame| frame.function_name.as_str())
        .collect()
}

const FACTORIAL: &str = r#"
func factorial(n) {
    if n == 0 {
        return 1
    }
    return n * factorial(n - 1)
}
"#;

#[test]
fn evaluates_basic_arithmetic() {
    assert_eq!(expect_int(&eval("2 + 2 * 3")), 8);
    assert_eq!(eval("7 / 2"), Value::float(3.5));
    assert_eq!(eval("\"n = \" + 4"), Value::string("n = 4"));
}

#[test]
fn returns_last_expression_from_script() {
    let value = eval(
        r#"
        var x = 40
        x + 2
        "#,
    );
    assert_eq!(expect_int(&value), 42);
    assert!(eval("var y = 1").is_null());
}

#[test]
fn if_else_chain_picks_first_true_branch() {
    let value = eval(
        r#"
        var x = 0
        var label = "none"
        if x > 1 {
            label = "big"
        } else if x == 0 {
            label = "zero"
        } else {
            label = "small"
        }
        label
        "#,
    );
    assert_eq!(value, Value::string("zero"));
}

#[test]
fn while_loop_consumes_break_and_continue() {
    let value = eval(
        r#"
        var i = 0
        var odd_sum = 0
        while true {
            i = i + 1
            if i > 9 {
                break
            }
            if i % 2 == 0 {
                continue
            }
            odd_sum = odd_sum + i
        }
        odd_sum
        "#,
    );
    assert_eq!(expect_int(&value), 25);
}

#[test]
fn loop_runs_until_break() {
    let value = eval(
        r#"
        var n = 1
        loop {
            n = n * 2
            if n > 100 { break }
        }
        n
        "#,
    );
    assert_eq!(expect_int(&value), 128);
}

#[test]
fn for_loop_accumulates_sum() {
    let value = eval(
        r#"
        var sum = 0
        for item in [1, 2, 3, 4] {
            sum = sum + item
        }
        sum
        "#,
    );
    assert_eq!(expect_int(&value), 10);
}

#[test]
fn return_inside_loop_leaves_function() {
    let value = eval(
        r#"
        func first_over(xs, limit) {
            for x in xs {
                if x > limit {
                    return x
                }
            }
            return -1
        }
        first_over([3, 8, 12, 20], 10)
        "#,
    );
    assert_eq!(expect_int(&value), 12);
}

#[test]
fn array_element_assignment_updates_value() {
    let value = eval(
        r#"
        var grid = [[1, 2], [3, 4]]
        grid[1][0] = grid[1][0] + 5
        grid
        "#,
    );
    let expected = Value::array(vec![
        Value::array(vec![Value::int(1), Value::int(2)]),
        Value::array(vec![Value::int(8), Value::int(4)]),
    ]);
    assert_eq!(value, expected);
}

#[test]
fn nested_element_assignment_evaluates_each_index_once() {
    let mut interpreter = Interpreter::new();
    interpreter
        .eval_source(
            r#"
            var calls = 0
            func pick() {
                calls = calls + 1
                return calls - 1
            }
            var rows = [[1, 2], [3, 4]]
            rows[pick()][pick()] = 9
            "#,
        )
        .expect("assignment");

    assert_eq!(interpreter.get_variable("calls").expect("calls"), Value::int(2));
    let expected = Value::array(vec![
        Value::array(vec![Value::int(1), Value::int(9)]),
        Value::array(vec![Value::int(3), Value::int(4)]),
    ]);
    assert_eq!(interpreter.get_variable("rows").expect("rows"), expected);
}

#[test]
fn element_assignment_out_of_bounds_leaves_variable_unchanged() {
    let mut interpreter = Interpreter::new();
    interpreter
        .eval_source("var rows = [[1], [2]]")
        .expect("setup");
    let err = runtime_error(&mut interpreter, "rows[1][4] = 0");
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert_eq!(err.message, "index 4 out of bounds for length 1");
    let expected = Value::array(vec![
        Value::array(vec![Value::int(1)]),
        Value::array(vec![Value::int(2)]),
    ]);
    assert_eq!(interpreter.get_variable("rows").expect("rows"), expected);
}

#[test]
fn recursive_function_evaluates() {
    let value = eval(
        r#"
        func fib(n) {
            if n <= 1 {
                return n
            }
            return fib(n - 1) + fib(n - 2)
        }

        fib(6)
        "#,
    );
    assert_eq!(expect_int(&value), 8);
}

#[test]
fn factorial_restores_call_stack() {
    let mut interpreter = Interpreter::new();
    interpreter.eval_source(FACTORIAL).expect("define factorial");
    let value = interpreter.eval_source("factorial(5)").expect("factorial(5)");
    assert_eq!(expect_int(&value), 120);
    assert_eq!(interpreter.call_depth(), 0);
    assert_eq!(interpreter.scope_depth(), 1);
}

#[test]
fn runaway_recursion_overflows_at_exactly_the_limit() {
    let mut interpreter = Interpreter::new();
    interpreter.set_recursion_limit(5);
    interpreter.eval_source(FACTORIAL).expect("define factorial");

    let err = runtime_error(&mut interpreter, "factorial(-1)");
    assert_eq!(err.kind, ErrorKind::StackOverflow);
    assert_eq!(err.message, "maximum recursion depth 5 exceeded");
    assert_eq!(frame_names(&err), vec!["factorial"; 5]);

    assert_eq!(interpreter.call_depth(), 0);
    assert_eq!(interpreter.scope_depth(), 1);
}

#[test]
fn call_stack_rejects_frames_past_its_limit() {
    let mut stack = CallStack::new(2);
    assert!(stack.is_empty());
    stack.push(CallFrame::new("outer", "main.lm", 3)).expect("first frame");
    stack.push(CallFrame::new("inner", "main.lm", 7)).expect("second frame");

    let err = stack
        .push(CallFrame::new("deepest", "main.lm", 9))
        .expect_err("limit reached");
    assert_eq!(err.kind, ErrorKind::StackOverflow);
    assert_eq!(err.stack_trace, stack.frames());
    assert_eq!(stack.depth(), 2);

    stack.pop();
    stack.pop();
    assert!(stack.is_empty());
}

#[test]
fn context_configures_new_instances() {
    let context = ExecutionContext {
        file_name: "job.lm".to_string(),
        recursion_limit: 7,
    };
    let interpreter = Interpreter::with_context(context);
    assert_eq!(interpreter.context().file_name, "job.lm");
    assert_eq!(interpreter.context().recursion_limit, 7);
    assert_eq!(interpreter.recursion_limit(), 7);
    assert_eq!(interpreter.current_file(), "job.lm");
}

#[test]
fn default_recursion_limit_is_one_hundred() {
    let err = eval_error(
        r#"
        func forever(n) { return forever(n + 1) }
        forever(0)
        "#,
    );
    assert_eq!(err.kind, ErrorKind::StackOverflow);
    assert_eq!(err.stack_trace.len(), 100);
}

#[test]
fn raised_limit_allows_deep_recursion() {
    let mut interpreter = Interpreter::new();
    interpreter.set_recursion_limit(5_000);
    let value = interpreter
        .eval_source(
            r#"
            func count(n) {
                if n == 0 { return 0 }
                return 1 + count(n - 1)
            }
            count(4000)
            "#,
        )
        .expect("deep recursion within the limit");
    assert_eq!(expect_int(&value), 4000);
}

#[test]
fn trace_lists_active_frames_outermost_first() {
    let source = "func inner() {\n    return 1 / 0\n}\nfunc outer() {\n    return inner()\n}\nouter()\n";
    let mut interpreter = Interpreter::new();
    let err = runtime_error(&mut interpreter, source);

    assert_eq!(err.kind, ErrorKind::Runtime);
    assert_eq!(err.message, "division by zero");
    let frames: Vec<String> = err.stack_trace.iter().map(ToString::to_string).collect();
    assert_eq!(frames, vec!["outer (<script>:7)", "inner (<script>:5)"]);

    assert_eq!(interpreter.call_depth(), 0);
    assert_eq!(interpreter.scope_depth(), 1);
}

#[test]
fn redefining_function_replaces_it() {
    let value = eval(
        r#"
        func answer() { return 1 }
        var before = answer()
        func answer() { return 2 }
        [before, answer()]
        "#,
    );
    assert_eq!(value, Value::array(vec![Value::int(1), Value::int(2)]));
}

#[test]
fn user_function_shadows_builtin() {
    let value = eval(
        r#"
        func len(x) { return 99 }
        len([1, 2, 3])
        "#,
    );
    assert_eq!(expect_int(&value), 99);
}

#[test]
fn functions_resolve_at_call_time() {
    let value = eval(
        r#"
        func caller() { return later() }
        func later() { return 5 }
        caller()
        "#,
    );
    assert_eq!(expect_int(&value), 5);
}

#[test]
fn top_level_control_flow_is_an_error() {
    for (source, keyword) in [
        ("return 1", "return"),
        ("break", "break"),
        ("var i = 0\nif i == 0 { continue }", "continue"),
    ] {
        let mut interpreter = Interpreter::new();
        let err = runtime_error(&mut interpreter, source);
        assert_eq!(err.kind, ErrorKind::ControlFlow, "{source}");
        assert!(err.message.contains(keyword), "{}", err.message);
        assert_eq!(interpreter.scope_depth(), 1);
    }
}

#[test]
fn break_escaping_function_is_an_error() {
    let err = eval_error(
        r#"
        func stray() { break }
        while true { stray() }
        "#,
    );
    assert_eq!(err.kind, ErrorKind::ControlFlow);
    assert_eq!(err.message, "`break` outside of loop in function `stray`");
    assert_eq!(frame_names(&err), vec!["stray"]);
}

#[test]
fn undefined_names_are_name_errors() {
    let err = eval_error("missing + 1");
    assert_eq!(err.kind, ErrorKind::Name);
    assert_eq!(err.message, "undefined variable `missing`");

    let err = eval_error("nowhere(1)");
    assert_eq!(err.kind, ErrorKind::Name);
    assert_eq!(err.message, "undefined function `nowhere`");

    let err = eval_error("fresh = 3");
    assert_eq!(err.kind, ErrorKind::Name);
}

#[test]
fn var_in_block_shadows_while_assignment_updates_outer() {
    let value = eval(
        r#"
        var x = 1
        var y = 1
        {
            var x = 2
            y = 2
        }
        [x, y]
        "#,
    );
    assert_eq!(value, Value::array(vec![Value::int(1), Value::int(2)]));
}

#[test]
fn define_binds_globally_from_inside_function() {
    let mut interpreter = Interpreter::new();
    interpreter
        .eval_source(
            r#"
            func setup() {
                var local = 7
                define SETTING = local * 6
            }
            setup()
            "#,
        )
        .expect("run setup");
    assert_eq!(interpreter.get_variable("SETTING").expect("global"), Value::int(42));
    assert!(interpreter.get_variable("local").is_err());
}

#[test]
fn function_bodies_see_caller_scopes() {
    let value = eval(
        r#"
        func show() { return visible }
        func outer() {
            var visible = 5
            return show()
        }
        outer()
        "#,
    );
    assert_eq!(expect_int(&value), 5);
}

#[test]
fn logical_operators_short_circuit() {
    assert_eq!(eval("false && error(\"evaluated\")"), Value::bool(false));
    assert_eq!(eval("true || error(\"evaluated\")"), Value::bool(true));
    assert_eq!(eval("1 && \"x\""), Value::bool(true));
}

#[test]
fn builtin_errors_carry_the_caller_trace() {
    let err = eval_error(
        r#"
        func fail() { error("boom") }
        fail()
        "#,
    );
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert_eq!(err.message, "boom");
    assert_eq!(frame_names(&err), vec!["fail"]);
    assert!(err.span.is_some());
}

#[test]
fn arity_mismatch_is_reported() {
    let err = eval_error(
        r#"
        func pair(a, b) { return [a, b] }
        pair(1)
        "#,
    );
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert_eq!(
        err.message,
        "function `pair` expected 2 arguments but received 1"
    );

    let err = eval_error("len(1, 2)");
    assert!(err.message.contains("expected 1 arguments"), "{}", err.message);
}

#[test]
fn runtime_introspection_builtins() {
    let value = eval(
        r#"
        func depth_at(n) {
            if n == 0 { return call_depth() }
            return depth_at(n - 1)
        }
        depth_at(3)
        "#,
    );
    assert_eq!(expect_int(&value), 4);

    let value = eval(
        r#"
        func where() {
            return stack_trace()
        }
        where()
        "#,
    );
    assert_eq!(
        value,
        Value::array(vec![Value::string("where (<script>:5)")])
    );

    let mut interpreter = Interpreter::new();
    let value = interpreter
        .eval_source("set_recursion_limit(12)\nget_recursion_limit()")
        .expect("limit builtins");
    assert_eq!(expect_int(&value), 12);
    assert_eq!(interpreter.recursion_limit(), 12);

    let err = eval_error("set_recursion_limit(0)");
    assert_eq!(err.kind, ErrorKind::Runtime);
}

#[test]
fn standard_builtins() {
    assert_eq!(eval("len(\"héllo\")"), Value::int(5));
    assert_eq!(eval("len(push([1, 2], 3))"), Value::int(3));
    assert_eq!(
        eval("range(3)"),
        Value::array(vec![Value::int(0), Value::int(1), Value::int(2)])
    );
    assert_eq!(
        eval("range(5, 0, -2)"),
        Value::array(vec![Value::int(5), Value::int(3), Value::int(1)])
    );
    assert_eq!(eval("str(12) + str([1, \"a\"])"), Value::string("12[1, \"a\"]"));
    assert_eq!(eval("int(\" 42 \") + int(3.9)"), Value::int(45));
    assert_eq!(eval("float(2)"), Value::float(2.0));
    assert_eq!(eval("typeof(null)"), Value::string("Null"));
    assert_eq!(eval("abs(-42)"), Value::int(42));
    assert_eq!(eval("sqrt(49)"), Value::float(7.0));
    assert_eq!(eval("pow(2, 10)"), Value::int(1024));
    assert_eq!(eval("pow(2, -1)"), Value::float(0.5));
}

#[test]
fn assert_builtin_fails_with_message() {
    assert!(eval("assert(1 < 2)").is_null());
    let err = eval_error("assert(1 > 2, \"math is broken\")");
    assert_eq!(err.kind, ErrorKind::Runtime);
    assert_eq!(err.message, "assertion failed: math is broken");
}

#[test]
fn operation_errors_are_runtime_errors() {
    assert_eq!(eval_error("[1, 2][5]").kind, ErrorKind::Runtime);
    assert_eq!(eval_error("1 - \"a\"").kind, ErrorKind::Runtime);
    assert_eq!(eval_error("for x in 5 { }").kind, ErrorKind::Runtime);
}

#[test]
fn execute_and_eval_drive_single_nodes() {
    let program = parser::parse_program("var a = 2\na * 21\nbreak\n").expect("parse");
    let mut interpreter = Interpreter::new();

    assert_eq!(
        interpreter.execute(&program.items[0]).expect("var"),
        Signal::Normal(None)
    );
    assert_eq!(
        interpreter.execute(&program.items[1]).expect("expr"),
        Signal::Normal(Some(Value::int(42)))
    );
    assert_eq!(
        interpreter.execute(&program.items[2]).expect("break"),
        Signal::Break
    );

    let expr = parser::parse_program("a + 1").expect("parse");
    let value = match &expr.items[0].kind {
        lamina::ast::StmtKind::Expr(expr) => interpreter.eval(expr).expect("eval"),
        other => panic!("expected expression statement, found {other:?}"),
    };
    assert_eq!(value, Value::int(3));
}

#[test]
fn host_builtins_receive_the_interpreter() {
    let calls = Rc::new(Cell::new(0));
    let counter = Rc::clone(&calls);
    let mut interpreter = Interpreter::new();
    interpreter.add_builtin("tick", 0, move |interp, _| {
        counter.set(counter.get() + 1);
        Ok(Value::int(interp.call_depth() as i64))
    });
    assert!(interpreter.has_function("tick"));

    let value = interpreter
        .eval_source(
            r#"
            func wrapped() { return tick() }
            [tick(), wrapped()]
            "#,
        )
        .expect("call host builtin");
    assert_eq!(value, Value::array(vec![Value::int(0), Value::int(1)]));
    assert_eq!(calls.get(), 2);
}

#[test]
fn host_variables_round_trip() {
    let mut interpreter = Interpreter::new();
    interpreter.set_variable("greeting", Value::string("hi"));
    let value = interpreter
        .eval_source("greeting + \" there\"")
        .expect("read host variable");
    assert_eq!(value, Value::string("hi there"));

    interpreter
        .assign_variable("greeting", Value::string("bye"))
        .expect("assign existing");
    assert_eq!(
        interpreter.get_variable("greeting").expect("read back"),
        Value::string("bye")
    );
    let err = interpreter
        .assign_variable("absent", Value::null())
        .expect_err("absent binding");
    assert_eq!(err.kind, ErrorKind::Name);
}

#[test]
fn parse_errors_surface_as_diagnostics() {
    let mut interpreter = Interpreter::new();
    match interpreter.eval_source("var = 3") {
        Err(LaminaError::Diagnostic(diagnostic)) => {
            assert!(diagnostic.span.is_some());
        }
        other => panic!("expected diagnostic, found {other:?}"),
    }
}

#[test]
fn registry_tracks_user_functions_separately_from_builtins() {
    let mut interpreter = Interpreter::new();
    interpreter
        .eval_source("func helper() { return 1 }\nfunc len(x) { return 0 }")
        .expect("define functions");

    let functions = interpreter.functions();
    let user: Vec<&str> = functions.user_function_names().collect();
    assert_eq!(user, vec!["helper", "len"]);
    assert!(functions.is_builtin("len"));
    assert!(!functions.is_builtin("helper"));
    assert!(functions.builtin_names().any(|name| name == "stack_trace"));
}
