use std::io::{self, BufRead, Write};

use crate::{
    diagnostics::RuntimeError,
    functions::VARIADIC,
    runtime::Interpreter,
    value::{Value, ValueKind},
};

type BuiltinResult = Result<Value, RuntimeError>;

/// Install the standard builtins into `interpreter`.
pub fn install(interpreter: &mut Interpreter) {
    interpreter.add_builtin("print", VARIADIC, io_print);
    interpreter.add_builtin("println", VARIADIC, io_println);
    interpreter.add_builtin("input", VARIADIC, io_input);

    interpreter.add_builtin("len", 1, collections_len);
    interpreter.add_builtin("push", 2, collections_push);
    interpreter.add_builtin("range", VARIADIC, collections_range);

    interpreter.add_builtin("str", 1, convert_str);
    interpreter.add_builtin("int", 1, convert_int);
    interpreter.add_builtin("float", 1, convert_float);
    interpreter.add_builtin("typeof", 1, convert_typeof);

    interpreter.add_builtin("abs", 1, math_abs);
    interpreter.add_builtin("sqrt", 1, math_sqrt);
    interpreter.add_builtin("pow", 2, math_pow);

    interpreter.add_builtin("assert", VARIADIC, runtime_assert);
    interpreter.add_builtin("error", 1, runtime_error);
    interpreter.add_builtin("set_recursion_limit", 1, runtime_set_recursion_limit);
    interpreter.add_builtin("get_recursion_limit", 0, runtime_get_recursion_limit);
    interpreter.add_builtin("call_depth", 0, runtime_call_depth);
    interpreter.add_builtin("stack_trace", 0, runtime_stack_trace);
}

fn ensure_range(args: &[Value], min: usize, max: usize, name: &str) -> Result<(), RuntimeError> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{min} to {max}")
        };
        return Err(RuntimeError::runtime(format!(
            "`{name}` expected {expected} arguments but received {}",
            args.len()
        )));
    }
    Ok(())
}

fn expect_int(value: &Value, name: &str) -> Result<i64, RuntimeError> {
    value.as_int().ok_or_else(|| {
        RuntimeError::runtime(format!(
            "`{name}` expected Int but found {}",
            value.type_name()
        ))
    })
}

fn expect_number(value: &Value, name: &str) -> Result<f64, RuntimeError> {
    value.as_number().ok_or_else(|| {
        RuntimeError::runtime(format!(
            "`{name}` expected numeric but found {}",
            value.type_name()
        ))
    })
}

fn io_failure(name: &str, err: io::Error) -> RuntimeError {
    RuntimeError::runtime(format!("`{name}` failed: {err}"))
}

fn write_joined<W: Write>(out: &mut W, args: &[Value]) -> io::Result<()> {
    for (idx, arg) in args.iter().enumerate() {
        if idx > 0 {
            write!(out, " ")?;
        }
        write!(out, "{arg}")?;
    }
    Ok(())
}

fn io_print(_: &mut Interpreter, args: &[Value]) -> BuiltinResult {
    let mut out = io::stdout().lock();
    write_joined(&mut out, args)
        .and_then(|()| out.flush())
        .map_err(|err| io_failure("print", err))?;
    Ok(Value::null())
}

fn io_println(_: &mut Interpreter, args: &[Value]) -> BuiltinResult {
    let mut out = io::stdout().lock();
    write_joined(&mut out, args)
        .and_then(|()| writeln!(out))
        .map_err(|err| io_failure("println", err))?;
    Ok(Value::null())
}

/// `input()` or `input(prompt)`: one line from stdin without its line ending,
/// or `null` at end of input.
fn io_input(_: &mut Interpreter, args: &[Value]) -> BuiltinResult {
    ensure_range(args, 0, 1, "input")?;
    if let Some(prompt) = args.first() {
        let mut out = io::stdout().lock();
        write!(out, "{prompt}")
            .and_then(|()| out.flush())
            .map_err(|err| io_failure("input", err))?;
    }
    let mut line = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut line)
        .map_err(|err| io_failure("input", err))?;
    if read == 0 {
        return Ok(Value::null());
    }
    if line.ends_with('\n') {
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }
    }
    Ok(Value::string(line))
}

fn collections_len(_: &mut Interpreter, args: &[Value]) -> BuiltinResult {
    let len = match args[0].kind() {
        ValueKind::String(s) => s.chars().count(),
        ValueKind::Array(values) => values.len(),
        _ => {
            return Err(RuntimeError::runtime(format!(
                "`len` expected String or Array but found {}",
                args[0].type_name()
            )));
        }
    };
    Ok(Value::int(len as i64))
}

/// Arrays are immutable values; `push` returns the extended copy.
fn collections_push(_: &mut Interpreter, args: &[Value]) -> BuiltinResult {
    match args[0].as_array() {
        Some(values) => {
            let mut extended = values.to_vec();
            extended.push(args[1].clone());
            Ok(Value::array(extended))
        }
        None => Err(RuntimeError::runtime(format!(
            "`push` expected Array but found {}",
            args[0].type_name()
        ))),
    }
}

/// `range(end)`, `range(start, end)` or `range(start, end, step)`, end exclusive.
fn collections_range(_: &mut Interpreter, args: &[Value]) -> BuiltinResult {
    ensure_range(args, 1, 3, "range")?;
    let (start, end) = if let [end] = args {
        (0, expect_int(end, "range")?)
    } else {
        (expect_int(&args[0], "range")?, expect_int(&args[1], "range")?)
    };
    let step = match args.get(2) {
        Some(step) => expect_int(step, "range")?,
        None if start <= end => 1,
        None => -1,
    };
    if step == 0 {
        return Err(RuntimeError::runtime("range step must be non-zero"));
    }

    let mut values = Vec::new();
    let mut current = start;
    while (step > 0 && current < end) || (step < 0 && current > end) {
        values.push(Value::int(current));
        match current.checked_add(step) {
            Some(next) => current = next,
            None => break,
        }
    }
    Ok(Value::array(values))
}

fn convert_str(_: &mut Interpreter, args: &[Value]) -> BuiltinResult {
    Ok(Value::string(args[0].to_string()))
}

fn convert_int(_: &mut Interpreter, args: &[Value]) -> BuiltinResult {
    let value = &args[0];
    match value.kind() {
        ValueKind::Int(_) => Ok(value.clone()),
        ValueKind::Bool(b) => Ok(Value::int(i64::from(*b))),
        ValueKind::Float(f) => {
            let truncated = f.trunc();
            let in_range = truncated >= i64::MIN as f64 && truncated < i64::MAX as f64;
            if in_range {
                Ok(Value::int(truncated as i64))
            } else {
                Err(RuntimeError::runtime(format!("`int` cannot represent {f}")))
            }
        }
        ValueKind::String(s) => s.trim().parse::<i64>().map(Value::int).map_err(|_| {
            RuntimeError::runtime(format!("`int` cannot parse {s:?}"))
        }),
        _ => Err(RuntimeError::runtime(format!(
            "`int` cannot convert {}",
            value.type_name()
        ))),
    }
}

fn convert_float(_: &mut Interpreter, args: &[Value]) -> BuiltinResult {
    let value = &args[0];
    match value.kind() {
        ValueKind::Int(n) => Ok(Value::float(*n as f64)),
        ValueKind::Float(_) => Ok(value.clone()),
        ValueKind::String(s) => s.trim().parse::<f64>().map(Value::float).map_err(|_| {
            RuntimeError::runtime(format!("`float` cannot parse {s:?}"))
        }),
        _ => Err(RuntimeError::runtime(format!(
            "`float` cannot convert {}",
            value.type_name()
        ))),
    }
}

fn convert_typeof(_: &mut Interpreter, args: &[Value]) -> BuiltinResult {
    Ok(Value::string(args[0].type_name()))
}

fn math_abs(_: &mut Interpreter, args: &[Value]) -> BuiltinResult {
    match args[0].kind() {
        ValueKind::Int(n) => n
            .checked_abs()
            .map(Value::int)
            .ok_or_else(|| RuntimeError::runtime("integer overflow in `abs`")),
        _ => Ok(Value::float(expect_number(&args[0], "abs")?.abs())),
    }
}

fn math_sqrt(_: &mut Interpreter, args: &[Value]) -> BuiltinResult {
    let number = expect_number(&args[0], "sqrt")?;
    if number < 0.0 {
        return Err(RuntimeError::runtime("`sqrt` expects non-negative input"));
    }
    Ok(Value::float(number.sqrt()))
}

/// Integer powers stay integers while they fit; anything else is a float.
fn math_pow(_: &mut Interpreter, args: &[Value]) -> BuiltinResult {
    if let (Some(base), Some(exponent)) = (args[0].as_int(), args[1].as_int()) {
        if let Some(result) = u32::try_from(exponent)
            .ok()
            .and_then(|exp| base.checked_pow(exp))
        {
            return Ok(Value::int(result));
        }
    }
    let base = expect_number(&args[0], "pow")?;
    let exponent = expect_number(&args[1], "pow")?;
    Ok(Value::float(base.powf(exponent)))
}

/// `assert(condition)` or `assert(condition, message)`.
fn runtime_assert(_: &mut Interpreter, args: &[Value]) -> BuiltinResult {
    ensure_range(args, 1, 2, "assert")?;
    if args[0].is_truthy() {
        return Ok(Value::null());
    }
    match args.get(1) {
        Some(message) => Err(RuntimeError::runtime(format!("assertion failed: {message}"))),
        None => Err(RuntimeError::runtime("assertion failed")),
    }
}

fn runtime_error(_: &mut Interpreter, args: &[Value]) -> BuiltinResult {
    Err(RuntimeError::runtime(args[0].to_string()))
}

fn runtime_set_recursion_limit(interpreter: &mut Interpreter, args: &[Value]) -> BuiltinResult {
    let limit = expect_int(&args[0], "set_recursion_limit")?;
    match usize::try_from(limit) {
        Ok(limit) if limit > 0 => {
            interpreter.set_recursion_limit(limit);
            Ok(Value::null())
        }
        _ => Err(RuntimeError::runtime(format!(
            "recursion limit must be positive, got {limit}"
        ))),
    }
}

fn runtime_get_recursion_limit(interpreter: &mut Interpreter, _: &[Value]) -> BuiltinResult {
    Ok(Value::int(saturating_int(interpreter.recursion_limit())))
}

fn runtime_call_depth(interpreter: &mut Interpreter, _: &[Value]) -> BuiltinResult {
    Ok(Value::int(saturating_int(interpreter.call_depth())))
}

/// Active frames, outermost first, as `name (file:line)` strings.
fn runtime_stack_trace(interpreter: &mut Interpreter, _: &[Value]) -> BuiltinResult {
    let frames = interpreter
        .get_stack_trace()
        .iter()
        .map(|frame| Value::string(frame.to_string()))
        .collect();
    Ok(Value::array(frames))
}

fn saturating_int(n: usize) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
