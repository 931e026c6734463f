//! Tree-walking evaluation for tern.
//!
//! The interpreter walks a checked AST against an [`Environment`] of
//! runtime values. Statements produce a [`ControlFlow`]; expressions
//! produce a [`Value`]. Runtime errors are ordinary `Err` values that
//! propagate with `?` to the end of the current unit.
//!
//! Shell command expressions need a shell, which is provided by the layer
//! above through the [`ShellExecutor`] trait.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::analyzer::operators;
use crate::ast::{Block, DataType, Expr, FunctionLit, InfixOp, PrefixOp, Program, ShellWord, Stmt, VarDecl};
use crate::console::Console;
use crate::scheduler::TaskHandle;

use super::builtins::Builtin;
use super::control_flow::ControlFlow;
use super::scope::{Environment, new_slot};
use super::value::{Function, Reference, Slice, Value};

/// Errors from running a shell command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShellError {
    /// The command line had no words.
    #[error("empty command")]
    Empty,
    /// The shell program could not be started.
    #[error("failed to run {program}: {message}")]
    Spawn { program: String, message: String },
    /// The command ran and exited unsuccessfully.
    #[error("{command} exited with status {code}: {stderr}")]
    Failed {
        command: String,
        code: i32,
        stderr: String,
    },
    /// No shell is available in this context.
    #[error("no shell available to run {0}")]
    Unavailable(String),
}

/// Errors that can occur during evaluation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("unknown identifier: {0}")]
    UnknownIdentifier(String),
    #[error("unknown variable {0}")]
    UnknownVariable(String),
    #[error("variable with such name already exists: {0}")]
    VariableExists(String),
    #[error("identifier {0} already exists")]
    IdentifierExists(String),
    #[error("function {0} already exists")]
    FunctionExists(String),
    #[error("variable {0} needs a type or a value")]
    Untyped(String),
    #[error("cannot use {got} as {expected} in declaration of {name}")]
    DeclarationType {
        name: String,
        expected: DataType,
        got: DataType,
    },
    #[error("cannot assign {got} to variable {name} of type {expected}")]
    AssignmentType {
        name: String,
        expected: DataType,
        got: DataType,
    },
    #[error("type mismatch: {left} {op} {right}")]
    TypeMismatch {
        left: DataType,
        op: InfixOp,
        right: DataType,
    },
    #[error("unknown operator: {left} {op} {right}")]
    UnknownInfixOperator {
        left: DataType,
        op: InfixOp,
        right: DataType,
    },
    #[error("unknown operator: {op}{operand}")]
    UnknownPrefixOperator { op: PrefixOp, operand: DataType },
    #[error("division by zero: {left} {op} 0")]
    DivisionByZero { left: i64, op: InfixOp },
    #[error("condition must be bool, got {0}")]
    Condition(DataType),
    #[error("index out of range: {target}[{index}] with length {len}")]
    IndexOutOfRange {
        target: String,
        index: i64,
        len: usize,
    },
    #[error("index must be int, got {0}")]
    IndexType(DataType),
    #[error("cannot index value of type {0}")]
    NotIndexable(DataType),
    #[error("cannot use {got} as {elem} in slice literal")]
    SliceElement { elem: DataType, got: DataType },
    #[error("wrong number of arguments: expected {expected}, got {got}")]
    ArgumentCount { expected: usize, got: usize },
    #[error("argument {position} has type {got}, expected {expected} in call to {function}")]
    ArgumentType {
        position: usize,
        got: DataType,
        expected: DataType,
        function: String,
    },
    #[error("cannot call value of type {0}")]
    NotCallable(DataType),
    #[error("break outside of loop")]
    BreakOutsideLoop,
    #[error("provided {provided} args but {requested} arg was called")]
    MissingArgument { provided: usize, requested: usize },
    #[error("nil channel: {0} is not initialized")]
    NilChannel(String),
    #[error("channel of {elem} cannot carry {got}")]
    ChannelPayload { elem: DataType, got: DataType },
    #[error("cannot send to value of type {0}")]
    NotSendable(DataType),
    #[error("cannot receive from value of type {0}")]
    NotReceivable(DataType),
    #[error("cannot append {item} to {slice}")]
    CannotAppend { item: DataType, slice: DataType },
    #[error("cannot make {0}")]
    CannotMake(DataType),
    #[error("could not parse {0:?} as integer")]
    NotAnInteger(String),
    #[error("{builtin}: {message}")]
    Builtin {
        builtin: &'static str,
        message: String,
    },
    #[error("shell: {0}")]
    Shell(#[from] ShellError),
}

/// Result type for evaluation.
pub type EvalResult<T> = Result<T, EvalError>;

/// Capability for running shell commands.
///
/// Implemented by the kernel with a real process runner; the evaluator
/// calls it for `$( … )` expressions and implicit command lines.
pub trait ShellExecutor: Send + Sync {
    /// Run `words` as one command line and return its standard output.
    ///
    /// Interactive commands inherit the terminal and return an empty string.
    fn execute(&self, words: &[String], interactive: bool) -> Result<String, ShellError>;
}

/// A shell that refuses to run anything.
pub struct NoOpShell;

impl ShellExecutor for NoOpShell {
    fn execute(&self, words: &[String], _interactive: bool) -> Result<String, ShellError> {
        Err(ShellError::Unavailable(words.join(" ")))
    }
}

/// Everything evaluation needs from its surroundings.
pub struct Context {
    pub console: Arc<dyn Console>,
    pub shell: Arc<dyn ShellExecutor>,
    pub tasks: TaskHandle,
    /// `$0`.
    pub script_name: String,
    /// `$1` onwards.
    pub args: Vec<String>,
    /// Programs that take over the terminal.
    pub interactive: Vec<String>,
}

/// Tree-walking interpreter. Cloning shares the context.
#[derive(Clone)]
pub struct Interpreter {
    ctx: Arc<Context>,
}

impl Interpreter {
    pub fn new(ctx: Context) -> Self {
        Self { ctx: Arc::new(ctx) }
    }

    pub fn console(&self) -> &dyn Console {
        self.ctx.console.as_ref()
    }

    /// Evaluate a program. A top-level `return` ends it with its value.
    pub fn eval_program(&self, program: &Program, env: &Environment<Value>) -> EvalResult<Value> {
        let mut last = Value::Nil;
        for stmt in &program.statements {
            match self.exec_stmt(stmt, env)? {
                ControlFlow::Normal(value) => last = value,
                ControlFlow::Return(value) => return Ok(value),
                ControlFlow::Break => return Err(EvalError::BreakOutsideLoop),
            }
        }
        Ok(last)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Statements
    // ═══════════════════════════════════════════════════════════════════════

    /// Execute one statement.
    pub fn exec_stmt(&self, stmt: &Stmt, env: &Environment<Value>) -> EvalResult<ControlFlow> {
        match stmt {
            Stmt::Var(decl) => {
                self.exec_var(decl, env)?;
                Ok(ControlFlow::nil())
            }
            Stmt::Declare { name, value } => {
                if env.contains_local(name) {
                    return Err(EvalError::IdentifierExists(name.clone()));
                }
                let value = self.eval_expr(value, env)?;
                let ty = inferred_type(&value);
                env.declare_typed(name.clone(), value, ty);
                Ok(ControlFlow::nil())
            }
            Stmt::Assign { name, value } => {
                let Some((slot, declared)) = env.typed_slot(name) else {
                    return Err(EvalError::UnknownVariable(name.clone()));
                };
                let value = self.eval_expr(value, env)?;
                let expected = declared.unwrap_or_else(|| slot.read().data_type());
                let value = if expected == DataType::Any {
                    value.boxed()
                } else if holds(&expected, &value) {
                    value
                } else {
                    return Err(EvalError::AssignmentType {
                        name: name.clone(),
                        expected,
                        got: value.data_type(),
                    });
                };
                *slot.write() = value;
                Ok(ControlFlow::nil())
            }
            Stmt::Expr(expr) => Ok(ControlFlow::Normal(self.eval_expr(expr, env)?)),
            Stmt::Return(value) => {
                let value = match value {
                    Some(expr) => self.eval_expr(expr, env)?,
                    None => Value::Nil,
                };
                Ok(ControlFlow::Return(value))
            }
            Stmt::Break => Ok(ControlFlow::Break),
            Stmt::If(stmt) => {
                if self.eval_condition(&stmt.condition, env)? {
                    self.exec_block(&stmt.then_branch, &env.enter())
                } else if let Some(alt) = &stmt.else_branch {
                    self.exec_block(alt, &env.enter())
                } else {
                    Ok(ControlFlow::nil())
                }
            }
            Stmt::For(for_loop) => {
                loop {
                    if let Some(cond) = &for_loop.condition {
                        if !self.eval_condition(cond, env)? {
                            break;
                        }
                    }
                    match self.exec_block(&for_loop.body, &env.enter())? {
                        ControlFlow::Normal(_) => {}
                        ControlFlow::Break => break,
                        flow @ ControlFlow::Return(_) => return Ok(flow),
                    }
                }
                Ok(ControlFlow::nil())
            }
            Stmt::Go(expr) => {
                self.spawn(expr.clone(), env.clone());
                Ok(ControlFlow::nil())
            }
            Stmt::Send { channel, value } => {
                let target = env
                    .lookup(channel)
                    .ok_or_else(|| EvalError::UnknownIdentifier(channel.clone()))?;
                let Value::Channel(ch) = target else {
                    return Err(EvalError::NotSendable(target.data_type()));
                };
                let value = self.eval_expr(value, env)?;
                let got = value.data_type();
                if !ch.elem.accepts(&got) {
                    return Err(EvalError::ChannelPayload {
                        elem: ch.elem.clone(),
                        got,
                    });
                }
                if !ch.send(value) {
                    return Err(EvalError::NilChannel(channel.clone()));
                }
                Ok(ControlFlow::nil())
            }
        }
    }

    fn exec_var(&self, decl: &VarDecl, env: &Environment<Value>) -> EvalResult<()> {
        let name = &decl.name;
        if env.contains_local(name) {
            return Err(EvalError::VariableExists(name.clone()));
        }
        let (value, ty) = match (&decl.ty, &decl.value) {
            (Some(declared), Some(expr)) => {
                let value = self.eval_expr(expr, env)?;
                let got = value.data_type();
                if !declared.accepts(&got) {
                    return Err(EvalError::DeclarationType {
                        name: name.clone(),
                        expected: declared.clone(),
                        got,
                    });
                }
                let value = if *declared == DataType::Any {
                    value.boxed()
                } else {
                    value
                };
                (value, declared.clone())
            }
            (None, Some(expr)) => {
                let value = self.eval_expr(expr, env)?;
                let ty = inferred_type(&value);
                (value, ty)
            }
            (Some(declared), None) => (Value::zero(declared), declared.clone()),
            (None, None) => return Err(EvalError::Untyped(name.clone())),
        };
        env.declare_typed(name.clone(), value, ty);
        Ok(())
    }

    /// Execute a block in `env`, stopping at the first `break` or `return`.
    pub fn exec_block(&self, block: &Block, env: &Environment<Value>) -> EvalResult<ControlFlow> {
        let mut last = Value::Nil;
        for stmt in &block.statements {
            match self.exec_stmt(stmt, env)? {
                ControlFlow::Normal(value) => last = value,
                flow => return Ok(flow),
            }
        }
        Ok(ControlFlow::Normal(last))
    }

    fn eval_condition(&self, cond: &Expr, env: &Environment<Value>) -> EvalResult<bool> {
        match self.eval_expr(cond, env)? {
            Value::Boolean(b) => Ok(b),
            other => Err(EvalError::Condition(other.data_type())),
        }
    }

    /// Run `expr` as a detached task sharing `env`.
    fn spawn(&self, expr: Expr, env: Environment<Value>) {
        let interpreter = self.clone();
        tracing::debug!(%expr, "spawning task");
        // The handle is dropped: tasks are never joined.
        let _ = self.ctx.tasks.spawn_blocking(move || {
            if let Err(err) = interpreter.eval_expr(&expr, &env) {
                tracing::error!(%expr, %err, "task failed");
                interpreter.console().write_err(&format!("ERROR: {err}\n"));
            }
        });
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Expressions
    // ═══════════════════════════════════════════════════════════════════════

    /// Evaluate an expression to a value.
    pub fn eval_expr(&self, expr: &Expr, env: &Environment<Value>) -> EvalResult<Value> {
        match expr {
            Expr::Int(n) => Ok(Value::Integer(*n)),
            Expr::Str(s) => Ok(Value::Str(s.clone())),
            Expr::Bool(b) => Ok(Value::Boolean(*b)),
            Expr::Ident(name) => env
                .lookup(name)
                .ok_or_else(|| EvalError::UnknownIdentifier(name.clone())),
            Expr::Prefix { op, right } => self.eval_prefix(*op, right, env),
            Expr::Infix { left, op, right } => {
                let l = self.eval_expr(left, env)?;
                let r = self.eval_expr(right, env)?;
                eval_infix(l, *op, r)
            }
            Expr::Call { callee, args } => {
                let callee = self.eval_expr(callee, env)?;
                let args = args
                    .iter()
                    .map(|arg| self.eval_expr(arg, env))
                    .collect::<EvalResult<Vec<_>>>()?;
                self.call(callee, args)
            }
            Expr::Index { left, index } => {
                let container = self.eval_expr(left, env)?;
                let index = match self.eval_expr(index, env)? {
                    Value::Integer(i) => i,
                    other => return Err(EvalError::IndexType(other.data_type())),
                };
                let Value::Slice(slice) = container else {
                    return Err(EvalError::NotIndexable(container.data_type()));
                };
                usize::try_from(index)
                    .ok()
                    .and_then(|i| slice.items.get(i))
                    .cloned()
                    .ok_or_else(|| EvalError::IndexOutOfRange {
                        target: left.to_string(),
                        index,
                        len: slice.len(),
                    })
            }
            Expr::Function(lit) => self.eval_function(lit, env),
            Expr::SliceLit { elem, items } => {
                let mut values = Vec::with_capacity(items.len());
                for item in items {
                    let value = self.eval_expr(item, env)?;
                    let got = value.data_type();
                    if !elem.accepts(&got) {
                        return Err(EvalError::SliceElement {
                            elem: elem.clone(),
                            got,
                        });
                    }
                    values.push(if *elem == DataType::Any {
                        value.boxed()
                    } else {
                        value
                    });
                }
                Ok(Value::Slice(Arc::new(Slice::new(elem.clone(), values))))
            }
            Expr::Type(ty) => Ok(Value::DataType(ty.clone())),
            Expr::Receive(source) => match self.eval_expr(source, env)? {
                Value::Channel(ch) => ch
                    .recv()
                    .ok_or_else(|| EvalError::NilChannel(source.to_string())),
                other => Err(EvalError::NotReceivable(other.data_type())),
            },
            Expr::Shell(words) => self.eval_shell(words, env),
            Expr::Positional(n) => self.positional(*n),
            Expr::EnvVar(name) => Ok(Value::Str(std::env::var(name).unwrap_or_default())),
        }
    }

    fn eval_prefix(&self, op: PrefixOp, right: &Expr, env: &Environment<Value>) -> EvalResult<Value> {
        if op == PrefixOp::Ref {
            return match right {
                Expr::Ident(name) => {
                    let (slot, declared) = env
                        .typed_slot(name)
                        .ok_or_else(|| EvalError::UnknownIdentifier(name.clone()))?;
                    let elem = declared.unwrap_or_else(|| slot.read().data_type());
                    Ok(Value::Reference(Reference::new(elem, slot)))
                }
                other => {
                    let value = self.eval_expr(other, env)?;
                    Ok(Value::Reference(Reference::new(
                        value.data_type(),
                        new_slot(value),
                    )))
                }
            };
        }

        let operand = self.eval_expr(right, env)?;
        match (op, operand) {
            (PrefixOp::Not, Value::Boolean(b)) => Ok(Value::Boolean(!b)),
            (PrefixOp::Neg, Value::Integer(n)) => Ok(Value::Integer(n.wrapping_neg())),
            (PrefixOp::FileTest, Value::Str(path)) => {
                Ok(Value::Boolean(!Path::new(&path).exists()))
            }
            (PrefixOp::Deref, Value::Reference(r)) => Ok(r.get()),
            (op, operand) => Err(EvalError::UnknownPrefixOperator {
                op,
                operand: operand.data_type(),
            }),
        }
    }

    fn eval_function(&self, lit: &Arc<FunctionLit>, env: &Environment<Value>) -> EvalResult<Value> {
        let value = Value::Function(Arc::new(Function::new(Arc::clone(lit), env.clone())));
        if let Some(name) = &lit.name {
            if env.contains_local(name) {
                return Err(EvalError::FunctionExists(name.clone()));
            }
            env.declare_typed(name.clone(), value.clone(), lit.data_type());
        }
        Ok(value)
    }

    /// Call a function or builtin with evaluated arguments.
    pub fn call(&self, callee: Value, args: Vec<Value>) -> EvalResult<Value> {
        match callee {
            Value::Function(func) => self.call_function(&func, args),
            Value::Builtin(builtin) => builtin.call(self, args),
            other => Err(EvalError::NotCallable(other.data_type())),
        }
    }

    fn call_function(&self, func: &Function, args: Vec<Value>) -> EvalResult<Value> {
        let params = &func.literal.params;
        if params.len() != args.len() {
            return Err(EvalError::ArgumentCount {
                expected: params.len(),
                got: args.len(),
            });
        }

        let call_env = func.env.enter();
        for (i, (param, arg)) in params.iter().zip(args).enumerate() {
            let arg = if param.ty == DataType::Any {
                arg.boxed()
            } else if holds(&param.ty, &arg) {
                arg
            } else {
                return Err(EvalError::ArgumentType {
                    position: i + 1,
                    got: arg.data_type(),
                    expected: param.ty.clone(),
                    function: func.name().to_string(),
                });
            };
            call_env.declare_typed(param.name.clone(), arg, param.ty.clone());
        }

        match self.exec_block(&func.literal.body, &call_env)? {
            ControlFlow::Normal(value) | ControlFlow::Return(value) => Ok(value),
            ControlFlow::Break => Err(EvalError::BreakOutsideLoop),
        }
    }

    fn eval_shell(&self, words: &[ShellWord], env: &Environment<Value>) -> EvalResult<Value> {
        let words: Vec<String> = words
            .iter()
            .map(|word| match word {
                ShellWord::Literal(text) => text.clone(),
                ShellWord::Var(name) => env
                    .lookup(name)
                    .map_or_else(|| word.to_string(), |value| value.to_string()),
                ShellWord::Positional(n) => self
                    .positional(*n)
                    .map_or_else(|_| word.to_string(), |value| value.to_string()),
            })
            .collect();

        let interactive = words.first().is_some_and(|program| self.is_interactive(program));
        tracing::trace!(command = %words.join(" "), interactive, "running shell command");
        let output = self.ctx.shell.execute(&words, interactive)?;
        // Trailing newlines are dropped, as in POSIX command substitution.
        Ok(Value::Str(output.trim_end_matches('\n').to_string()))
    }

    fn is_interactive(&self, program: &str) -> bool {
        let name = Path::new(program)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(program);
        self.ctx.interactive.iter().any(|p| p == name)
    }

    fn positional(&self, n: usize) -> EvalResult<Value> {
        if n == 0 {
            return Ok(Value::Str(self.ctx.script_name.clone()));
        }
        self.ctx
            .args
            .get(n - 1)
            .map(|arg| Value::Str(arg.clone()))
            .ok_or(EvalError::MissingArgument {
                provided: self.ctx.args.len(),
                requested: n,
            })
    }
}

/// Binding type for a declaration without a written type.
///
/// A `nil` initializer comes from a call whose static type is `nil` or
/// `any`, so the binding is treated as `any`.
fn inferred_type(value: &Value) -> DataType {
    match value {
        Value::Nil => DataType::Any,
        value => value.data_type(),
    }
}

/// Whether a binding of type `expected` may hold `value`. Function-typed
/// bindings also hold `nil`, their zero value.
fn holds(expected: &DataType, value: &Value) -> bool {
    expected.accepts(&value.data_type())
        || (value.is_nil() && matches!(expected, DataType::Function { .. }))
}

/// Apply an infix operator to two evaluated operands.
pub fn eval_infix(left: Value, op: InfixOp, right: Value) -> EvalResult<Value> {
    let (lt, rt) = (left.data_type(), right.data_type());
    if operators::infix_result(&lt, op, &rt).is_none() {
        return Err(if lt == rt {
            EvalError::UnknownInfixOperator {
                left: lt,
                op,
                right: rt,
            }
        } else {
            EvalError::TypeMismatch {
                left: lt,
                op,
                right: rt,
            }
        });
    }

    let value = match (op, left, right) {
        (InfixOp::Eq, l, r) => Value::Boolean(l == r),
        (InfixOp::NotEq, l, r) => Value::Boolean(l != r),
        (InfixOp::Add, Value::Str(a), Value::Str(b)) => Value::Str(a + &b),
        (InfixOp::And, Value::Boolean(a), Value::Boolean(b)) => Value::Boolean(a && b),
        (InfixOp::Or, Value::Boolean(a), Value::Boolean(b)) => Value::Boolean(a || b),
        (op, Value::Integer(a), Value::Integer(b)) => match op {
            InfixOp::Add => Value::Integer(a.wrapping_add(b)),
            InfixOp::Sub => Value::Integer(a.wrapping_sub(b)),
            InfixOp::Mul => Value::Integer(a.wrapping_mul(b)),
            InfixOp::Div | InfixOp::Mod if b == 0 => {
                return Err(EvalError::DivisionByZero { left: a, op });
            }
            InfixOp::Div => Value::Integer(a.wrapping_div(b)),
            InfixOp::Mod => Value::Integer(a.wrapping_rem(b)),
            InfixOp::Lt => Value::Boolean(a < b),
            InfixOp::Gt => Value::Boolean(a > b),
            _ => {
                return Err(EvalError::UnknownInfixOperator {
                    left: lt,
                    op,
                    right: rt,
                });
            }
        },
        (op, _, _) => {
            return Err(EvalError::UnknownInfixOperator {
                left: lt,
                op,
                right: rt,
            });
        }
    };
    Ok(value)
}
