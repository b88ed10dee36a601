use lamina::{
    diagnostics::ErrorKind, environment::Environment, runtime::Interpreter, value::Value,
};

#[test]
fn binding_is_visible_in_nested_scopes_until_popped() {
    let mut interpreter = Interpreter::new();
    interpreter.push_scope();
    interpreter.set_variable("x", Value::int(1));
    interpreter.push_scope();
    interpreter.push_scope();
    assert_eq!(interpreter.get_variable("x").expect("visible"), Value::int(1));

    interpreter.pop_scope();
    interpreter.pop_scope();
    assert_eq!(interpreter.get_variable("x").expect("still visible"), Value::int(1));

    interpreter.pop_scope();
    let err = interpreter.get_variable("x").expect_err("gone with its scope");
    assert_eq!(err.kind, ErrorKind::Name);
    assert_eq!(err.message, "undefined variable `x`");
}

#[test]
fn set_variable_shadows_instead_of_mutating_outer_scope() {
    let mut interpreter = Interpreter::new();
    interpreter.set_variable("x", Value::int(1));
    interpreter.push_scope();
    interpreter.set_variable("x", Value::int(2));
    assert_eq!(interpreter.get_variable("x").expect("inner"), Value::int(2));
    interpreter.pop_scope();
    assert_eq!(interpreter.get_variable("x").expect("outer"), Value::int(1));
}

#[test]
fn push_then_pop_leaves_environment_identical() {
    let mut interpreter = Interpreter::new();
    interpreter.set_variable("a", Value::string("kept"));
    let before: Vec<_> = interpreter
        .environment()
        .scopes()
        .iter()
        .map(|scope| scope.keys().cloned().collect::<Vec<_>>())
        .collect();

    interpreter.push_scope();
    interpreter.pop_scope();

    let after: Vec<_> = interpreter
        .environment()
        .scopes()
        .iter()
        .map(|scope| scope.keys().cloned().collect::<Vec<_>>())
        .collect();
    assert_eq!(before, after);
    assert_eq!(interpreter.scope_depth(), 1);
}

#[test]
fn set_global_targets_scope_zero_from_any_depth() {
    let mut interpreter = Interpreter::new();
    for _ in 0..4 {
        interpreter.push_scope();
    }
    interpreter.set_global_variable("g", Value::bool(true));
    for _ in 0..4 {
        interpreter.pop_scope();
    }
    assert_eq!(interpreter.scope_depth(), 1);
    assert_eq!(interpreter.get_variable("g").expect("global"), Value::bool(true));
    assert!(interpreter.environment().scopes()[0].contains_key("g"));
}

#[test]
fn assign_updates_nearest_binding() {
    let mut env = Environment::new();
    env.set("n", Value::int(0));
    env.push_scope();
    env.push_scope();
    assert!(env.assign("n", Value::int(5)));
    assert!(!env.assign("missing", Value::int(5)));
    assert!(!env.contains("missing"));
    env.pop_scope();
    env.pop_scope();
    assert_eq!(env.get("n"), Some(&Value::int(5)));
}

#[test]
fn write_variables_lists_every_scope() {
    let mut interpreter = Interpreter::new();
    interpreter.set_variable("answer", Value::int(42));
    interpreter.push_scope();
    interpreter.set_variable("name", Value::string("lamina"));

    let mut out = Vec::new();
    interpreter.print_variables(&mut out).expect("write to buffer");
    let text = String::from_utf8(out).expect("utf-8");
    assert_eq!(
        text,
        "scope 0 (global):\n  answer = 42\nscope 1:\n  name = \"lamina\"\n"
    );
}
