//! The evaluator.
//!
//! [`Interpreter`] walks statements and expressions against its own
//! [`Environment`], resolving calls through a [`FunctionRegistry`] and tracking
//! every user call on a [`CallStack`]. Non-local control flow travels as
//! [`Signal`] values; failures travel as `Err(RuntimeError)`. Scope and frame
//! bookkeeping is released by guards (see `guard`), so every exit path leaves
//! the instance as it was found.

mod guard;
mod loader;

use std::{
    io::{self, Write},
    rc::Rc,
};

use crate::{
    ast::{BinaryOp, Expr, ExprKind, FunctionDef, Literal, Program, Stmt, StmtKind},
    callstack::{CallFrame, CallStack, DEFAULT_RECURSION_LIMIT},
    diagnostics::{self, ErrorKind, LaminaError, RuntimeError, SourceSpan},
    environment::Environment,
    extensions::{self, EntryFunction, ExtensionRegistry},
    functions::{Callable, FunctionRegistry, NativeFunction},
    modules::{FileSystemSource, ModuleRegistry, ModuleSource},
    parser, stack,
    value::{OperationError, Value},
};

/// Per-instance configuration.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Name recorded in call frames for code that did not come from a module.
    pub file_name: String,
    pub recursion_limit: usize,
}

impl Default for ExecutionContext {
    fn default() -> Self {
        Self {
            file_name: "<script>".to_string(),
            recursion_limit: DEFAULT_RECURSION_LIMIT,
        }
    }
}

/// Outcome of executing one statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Signal {
    /// Execution continues; carries the value of an expression statement.
    Normal(Option<Value>),
    Return(Value),
    Break,
    Continue,
}

impl Signal {
    fn keyword(&self) -> &'static str {
        match self {
            Signal::Normal(_) => "statement",
            Signal::Return(_) => "return",
            Signal::Break => "break",
            Signal::Continue => "continue",
        }
    }
}

pub struct Interpreter {
    env: Environment,
    functions: FunctionRegistry,
    call_stack: CallStack,
    modules: ModuleRegistry,
    module_source: Box<dyn ModuleSource>,
    context: ExecutionContext,
    current_file: String,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Self::with_context(ExecutionContext::default())
    }

    /// Build an instance with the standard builtins and a snapshot of the
    /// process-wide extension registry.
    pub fn with_context(context: ExecutionContext) -> Self {
        Self::with_extensions(context, &extensions::global_snapshot())
    }

    /// Build an instance that installs exactly `registry`'s entries.
    pub fn with_extensions(context: ExecutionContext, registry: &ExtensionRegistry) -> Self {
        let mut interpreter = Self {
            env: Environment::new(),
            functions: FunctionRegistry::new(),
            call_stack: CallStack::new(context.recursion_limit),
            modules: ModuleRegistry::new(),
            module_source: Box::new(FileSystemSource::default()),
            current_file: context.file_name.clone(),
            context,
        };
        crate::stdlib::install(&mut interpreter);
        registry.install(&mut interpreter);
        interpreter
    }

    pub fn with_module_source(mut self, source: impl ModuleSource + 'static) -> Self {
        self.set_module_source(source);
        self
    }

    pub fn set_module_source(&mut self, source: impl ModuleSource + 'static) {
        self.module_source = Box::new(source);
    }

    /// Append `entry` to the process-wide extension registry.
    pub fn register_entry(entry: EntryFunction) {
        extensions::register_entry(entry);
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    /// File name call frames are currently attributed to.
    pub fn current_file(&self) -> &str {
        &self.current_file
    }

    pub fn eval_source(&mut self, source: &str) -> Result<Value, LaminaError> {
        let program = parser::parse_program(source)?;
        self.run_program(&program)
    }

    /// Execute a whole program and return the value of its last expression
    /// statement (`null` if there is none).
    pub fn run_program(&mut self, program: &Program) -> Result<Value, LaminaError> {
        Ok(self.run_top_level(&program.items)?)
    }

    pub fn execute(&mut self, stmt: &Stmt) -> Result<Signal, RuntimeError> {
        stack::ensure_sufficient_stack(|| self.execute_statement(stmt))
    }

    pub fn eval(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        stack::ensure_sufficient_stack(|| self.evaluate(expr))
    }

    // Variables and scopes.

    /// Bind `name` in the innermost scope. Outer bindings are shadowed, never changed.
    pub fn set_variable(&mut self, name: impl Into<String>, value: Value) {
        self.env.set(name, value);
    }

    pub fn set_global_variable(&mut self, name: impl Into<String>, value: Value) {
        self.env.set_global(name, value);
    }

    pub fn get_variable(&self, name: &str) -> Result<Value, RuntimeError> {
        self.env.get(name).cloned().ok_or_else(|| {
            RuntimeError::new(ErrorKind::Name, format!("undefined variable `{name}`"))
                .with_trace(self.call_stack.snapshot())
        })
    }

    /// Overwrite the nearest existing binding of `name`.
    pub fn assign_variable(&mut self, name: &str, value: Value) -> Result<(), RuntimeError> {
        if self.env.assign(name, value) {
            Ok(())
        } else {
            Err(
                RuntimeError::new(ErrorKind::Name, format!("undefined variable `{name}`"))
                    .with_trace(self.call_stack.snapshot()),
            )
        }
    }

    pub fn push_scope(&mut self) {
        self.env.push_scope();
    }

    pub fn pop_scope(&mut self) {
        self.env.pop_scope();
    }

    pub fn scope_depth(&self) -> usize {
        self.env.depth()
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn print_variables<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.env.write_variables(out)
    }

    // Functions.

    pub fn add_function(&mut self, name: impl Into<String>, definition: Rc<FunctionDef>) {
        let name = name.into();
        let replaced = self.functions.add_function(name.clone(), definition);
        tracing::debug!(function = %name, replaced = replaced.is_some(), "registered function");
    }

    pub fn add_builtin<F>(&mut self, name: impl Into<String>, arity: usize, callback: F)
    where
        F: Fn(&mut Interpreter, &[Value]) -> Result<Value, RuntimeError> + 'static,
    {
        let name = name.into();
        tracing::trace!(builtin = %name, arity, "registered builtin");
        self.functions.add_builtin(NativeFunction {
            name,
            arity,
            callback: Rc::new(callback),
        });
    }

    pub fn has_function(&self, name: &str) -> bool {
        self.functions.contains(name)
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    // Call stack.

    pub fn recursion_limit(&self) -> usize {
        self.call_stack.limit()
    }

    pub fn set_recursion_limit(&mut self, limit: usize) {
        tracing::debug!(
            previous = self.call_stack.limit(),
            limit,
            "recursion limit changed"
        );
        self.call_stack.set_limit(limit);
    }

    pub fn call_depth(&self) -> usize {
        self.call_stack.depth()
    }

    /// Active frames, outermost first.
    pub fn get_stack_trace(&self) -> Vec<CallFrame> {
        self.call_stack.snapshot()
    }

    /// Render `error` and its trace to stderr.
    pub fn print_stack_trace(&self, error: &RuntimeError, use_colors: bool) -> io::Result<()> {
        diagnostics::print_stack_trace(&mut io::stderr().lock(), error, use_colors)
    }

    // Modules.

    pub fn is_module_loaded(&self, name: &str) -> bool {
        self.modules.is_loaded(name)
    }

    pub fn loaded_modules(&self) -> Vec<String> {
        self.modules.loaded().map(str::to_string).collect()
    }

    pub fn retained_module_count(&self) -> usize {
        self.modules.retained_count()
    }

    // Evaluation.

    /// Run statements at the outermost level of a program or module, where no
    /// loop or function is left to consume a control signal.
    fn run_top_level(&mut self, items: &[Stmt]) -> Result<Value, RuntimeError> {
        let mut last = None;
        for stmt in items {
            match self.execute(stmt)? {
                Signal::Normal(Some(value)) => last = Some(value),
                Signal::Normal(None) => {}
                signal => {
                    let construct = if matches!(signal, Signal::Return(_)) {
                        "function"
                    } else {
                        "loop"
                    };
                    return Err(self.error(
                        ErrorKind::ControlFlow,
                        format!("`{}` outside of {construct}", signal.keyword()),
                        stmt.span,
                    ));
                }
            }
        }
        Ok(last.unwrap_or_else(Value::null))
    }

    fn execute_statement(&mut self, stmt: &Stmt) -> Result<Signal, RuntimeError> {
        match &stmt.kind {
            StmtKind::VarDecl { name, initializer } => {
                let value = match initializer {
                    Some(expr) => self.eval(expr)?,
                    None => Value::null(),
                };
                self.env.set(name.clone(), value);
                Ok(Signal::Normal(None))
            }
            StmtKind::Define { name, value } => {
                let value = self.eval(value)?;
                self.env.set_global(name.clone(), value);
                Ok(Signal::Normal(None))
            }
            StmtKind::Assign { target, value } => {
                let value = self.eval(value)?;
                self.store(target, value)?;
                Ok(Signal::Normal(None))
            }
            StmtKind::Function(definition) => {
                self.add_function(definition.name.clone(), Rc::clone(definition));
                Ok(Signal::Normal(None))
            }
            StmtKind::Include(name) => {
                self.include(name, stmt.span)?;
                Ok(Signal::Normal(None))
            }
            StmtKind::Expr(expr) => Ok(Signal::Normal(Some(self.eval(expr)?))),
            StmtKind::Block(statements) => self.execute_block(statements),
            StmtKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                if self.eval(condition)?.is_truthy() {
                    self.execute_block(then_branch)
                } else if let Some(branch) = else_branch {
                    self.execute_block(branch)
                } else {
                    Ok(Signal::Normal(None))
                }
            }
            StmtKind::While { condition, body } => {
                while self.eval(condition)?.is_truthy() {
                    match self.execute_block(body)? {
                        Signal::Normal(_) | Signal::Continue => {}
                        Signal::Break => break,
                        Signal::Return(value) => return Ok(Signal::Return(value)),
                    }
                }
                Ok(Signal::Normal(None))
            }
            StmtKind::Loop { body } => {
                loop {
                    match self.execute_block(body)? {
                        Signal::Normal(_) | Signal::Continue => {}
                        Signal::Break => break,
                        Signal::Return(value) => return Ok(Signal::Return(value)),
                    }
                }
                Ok(Signal::Normal(None))
            }
            StmtKind::For {
                binding,
                iterable,
                body,
            } => {
                let items = self
                    .eval(iterable)?
                    .iterate()
                    .map_err(|err| self.operation_error(err, iterable.span))?;
                for item in items {
                    let flow = {
                        let mut iteration = self.scoped();
                        iteration.env.set(binding.clone(), item);
                        iteration.execute_sequence(body)?
                    };
                    match flow {
                        Signal::Normal(_) | Signal::Continue => {}
                        Signal::Break => break,
                        Signal::Return(value) => return Ok(Signal::Return(value)),
                    }
                }
                Ok(Signal::Normal(None))
            }
            StmtKind::Return(expr) => {
                let value = match expr {
                    Some(expr) => self.eval(expr)?,
                    None => Value::null(),
                };
                Ok(Signal::Return(value))
            }
            StmtKind::Break => Ok(Signal::Break),
            StmtKind::Continue => Ok(Signal::Continue),
        }
    }

    fn execute_block(&mut self, statements: &[Stmt]) -> Result<Signal, RuntimeError> {
        let mut block = self.scoped();
        block.execute_sequence(statements)
    }

    /// Run statements in the current scope, stopping at the first non-normal signal.
    fn execute_sequence(&mut self, statements: &[Stmt]) -> Result<Signal, RuntimeError> {
        let mut last = None;
        for stmt in statements {
            match self.execute(stmt)? {
                Signal::Normal(Some(value)) => last = Some(value),
                Signal::Normal(None) => {}
                signal => return Ok(signal),
            }
        }
        Ok(Signal::Normal(last))
    }

    fn evaluate(&mut self, expr: &Expr) -> Result<Value, RuntimeError> {
        match &expr.kind {
            ExprKind::Literal(literal) => Ok(literal_value(literal)),
            ExprKind::Variable(name) => self.env.get(name).cloned().ok_or_else(|| {
                self.error(
                    ErrorKind::Name,
                    format!("undefined variable `{name}`"),
                    expr.span,
                )
            }),
            ExprKind::Binary { op, left, right } => {
                let left_value = self.eval(left)?;
                match op {
                    BinaryOp::And if !left_value.is_truthy() => Ok(Value::bool(false)),
                    BinaryOp::Or if left_value.is_truthy() => Ok(Value::bool(true)),
                    _ => {
                        let right_value = self.eval(right)?;
                        Value::binary(op, &left_value, &right_value)
                            .map_err(|err| self.operation_error(err, expr.span))
                    }
                }
            }
            ExprKind::Unary { op, expr: operand } => {
                let value = self.eval(operand)?;
                Value::unary(op, &value).map_err(|err| self.operation_error(err, expr.span))
            }
            ExprKind::Call { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg)?);
                }
                self.call_function(name, values, expr.span)
            }
            ExprKind::ArrayLiteral(elements) => {
                let mut values = Vec::with_capacity(elements.len());
                for element in elements {
                    values.push(self.eval(element)?);
                }
                Ok(Value::array(values))
            }
            ExprKind::Group(inner) => self.eval(inner),
            ExprKind::Index { target, index } => {
                let target_value = self.eval(target)?;
                let index_value = self.eval(index)?;
                target_value
                    .index(&index_value)
                    .map_err(|err| self.operation_error(err, expr.span))
            }
        }
    }

    /// Write `value` to an assignable place. Index expressions are evaluated
    /// once, left to right, and enclosing arrays are rebuilt on the way out.
    fn store(&mut self, target: &Expr, value: Value) -> Result<(), RuntimeError> {
        let mut path = Vec::new();
        let mut place = target;
        while let ExprKind::Index {
            target: owner,
            index,
        } = &place.kind
        {
            path.push((index.as_ref(), place.span));
            place = owner.as_ref();
        }
        let ExprKind::Variable(name) = &place.kind else {
            return Err(self.error(
                ErrorKind::Runtime,
                "invalid assignment target",
                target.span,
            ));
        };
        path.reverse();

        let mut indices = Vec::with_capacity(path.len());
        for (index, span) in &path {
            indices.push((self.eval(index)?, *span));
        }

        let undefined = |interpreter: &Self| {
            interpreter.error(
                ErrorKind::Name,
                format!("undefined variable `{name}`"),
                place.span,
            )
        };
        let mut containers = Vec::with_capacity(indices.len());
        if !indices.is_empty() {
            let mut current = self.env.get(name).cloned().ok_or_else(|| undefined(self))?;
            for (index, span) in &indices[..indices.len() - 1] {
                let inner = current
                    .index(index)
                    .map_err(|err| self.operation_error(err, *span))?;
                containers.push(current);
                current = inner;
            }
            containers.push(current);
        }

        let mut updated = value;
        for (container, (index, span)) in containers.iter().zip(&indices).rev() {
            updated = container
                .with_element(index, updated)
                .map_err(|err| self.operation_error(err, *span))?;
        }
        if self.env.assign(name, updated) {
            Ok(())
        } else {
            Err(undefined(self))
        }
    }

    fn call_function(
        &mut self,
        name: &str,
        args: Vec<Value>,
        span: SourceSpan,
    ) -> Result<Value, RuntimeError> {
        match self.functions.resolve(name) {
            Some(Callable::User(definition)) => self.call_user(&definition, args, span),
            Some(Callable::Builtin(native)) => native
                .call(self, &args)
                .map_err(|err| self.locate(err, span)),
            None => Err(self.error(
                ErrorKind::Name,
                format!("undefined function `{name}`"),
                span,
            )),
        }
    }

    #[tracing::instrument(level = "trace", skip_all, fields(function = %definition.name))]
    fn call_user(
        &mut self,
        definition: &FunctionDef,
        args: Vec<Value>,
        span: SourceSpan,
    ) -> Result<Value, RuntimeError> {
        if args.len() != definition.params.len() {
            return Err(self.error(
                ErrorKind::Runtime,
                format!(
                    "function `{}` expected {} arguments but received {}",
                    definition.name,
                    definition.params.len(),
                    args.len()
                ),
                span,
            ));
        }
        let frame = CallFrame::new(&definition.name, self.current_file.clone(), span.line);
        let mut call = self.enter_call(frame).map_err(|err| err.with_span(span))?;
        for (param, value) in definition.params.iter().zip(args) {
            call.env.set(param.clone(), value);
        }
        for stmt in &definition.body {
            match call.execute(stmt)? {
                Signal::Normal(_) => {}
                Signal::Return(value) => return Ok(value),
                signal => {
                    return Err(call.error(
                        ErrorKind::ControlFlow,
                        format!(
                            "`{}` outside of loop in function `{}`",
                            signal.keyword(),
                            definition.name
                        ),
                        stmt.span,
                    ));
                }
            }
        }
        Ok(Value::null())
    }

    /// Error of `kind` raised at `span`, carrying the frames active right now.
    fn error(&self, kind: ErrorKind, message: impl Into<String>, span: SourceSpan) -> RuntimeError {
        RuntimeError::new(kind, message)
            .with_span(span)
            .with_trace(self.call_stack.snapshot())
    }

    fn operation_error(&self, err: OperationError, span: SourceSpan) -> RuntimeError {
        self.error(ErrorKind::Runtime, err.to_string(), span)
    }

    /// Fill in the location of an error raised by native code, keeping any
    /// trace it already captured.
    fn locate(&self, mut err: RuntimeError, span: SourceSpan) -> RuntimeError {
        if err.span.is_none() {
            err.span = Some(span);
        }
        if err.stack_trace.is_empty() {
            err.stack_trace = self.call_stack.snapshot();
        }
        err
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::Int(n) => Value::int(*n),
        Literal::Float(n) => Value::float(*n),
        Literal::Bool(b) => Value::bool(*b),
        Literal::String(s) => Value::string(s.clone()),
        Literal::Null => Value::null(),
    }
}
