//! Static analysis for tern programs.
//!
//! The analyzer runs after parsing and before evaluation. It assigns a type
//! to every expression and statement and rejects programs whose types do
//! not line up:
//!
//! - **Bindings**: unknown identifiers, assignment to undeclared variables
//! - **Operators**: operand types against the table in [`operators`]
//! - **Calls**: arity and parameter types of user functions
//! - **Control flow**: `break` outside a loop, missing `return`
//!
//! Each top-level statement is checked on its own. The first error in a
//! statement ends that statement's analysis; the next statement is still
//! checked, so one pass reports one error per broken statement.

pub mod operators;

use thiserror::Error;

use crate::ast::{Block, DataType, Expr, FunctionLit, IfStmt, PrefixOp, Program, Stmt, VarDecl};
use crate::interpreter::builtins::BUILTIN_NAMES;
use crate::interpreter::{Environment, Value};

/// A type error found before evaluation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct AnalysisError {
    pub message: String,
}

impl AnalysisError {
    fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

type Check<T> = Result<T, AnalysisError>;

/// Per-function analysis context.
struct FunctionContext {
    name: String,
    ret: DataType,
    /// One entry per enclosing loop; `true` once that loop has seen a `break`.
    loops: Vec<bool>,
}

impl FunctionContext {
    fn top_level() -> Self {
        Self {
            name: "main".to_string(),
            ret: DataType::Any,
            loops: Vec::new(),
        }
    }
}

/// Type checker over an environment of [`DataType`]s.
pub struct Analyzer {
    env: Environment<DataType>,
    context: FunctionContext,
}

impl Default for Analyzer {
    /// An analyzer that knows only the builtins.
    fn default() -> Self {
        let env = Environment::new();
        for name in BUILTIN_NAMES {
            env.declare(*name, DataType::Builtin);
        }
        Self::new(env)
    }
}

impl Analyzer {
    /// Analyze against an existing type environment.
    pub fn new(env: Environment<DataType>) -> Self {
        Self {
            env,
            context: FunctionContext::top_level(),
        }
    }

    /// Analyze against the types of every binding visible in `values`.
    pub fn seeded(values: &Environment<Value>) -> Self {
        let env = Environment::new();
        for (name, value) in values.names() {
            env.declare(name, value.data_type());
        }
        Self::new(env)
    }

    /// Check every top-level statement, collecting one error per failure.
    pub fn analyze_program(&mut self, program: &Program) -> Vec<AnalysisError> {
        let mut errors = Vec::new();
        for stmt in &program.statements {
            if let Err(err) = self.check_stmt(stmt) {
                tracing::debug!(%stmt, %err, "statement failed analysis");
                self.context = FunctionContext::top_level();
                errors.push(err);
            }
        }
        errors
    }

    /// Type of a single expression in the current environment.
    pub fn expr_type(&mut self, expr: &Expr) -> Check<DataType> {
        self.check_expr(expr)
    }

    /// Run `f` with `env` as the current environment.
    fn scoped<R>(&mut self, env: Environment<DataType>, f: impl FnOnce(&mut Self) -> R) -> R {
        let outer = std::mem::replace(&mut self.env, env);
        let result = f(self);
        self.env = outer;
        result
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Statements
    // ═══════════════════════════════════════════════════════════════════════

    fn check_stmt(&mut self, stmt: &Stmt) -> Check<DataType> {
        match stmt {
            Stmt::Var(decl) => self.check_var(decl),
            Stmt::Declare { name, value } => match self.check_expr(value) {
                Ok(ty) => {
                    self.env.declare(name.clone(), ty);
                    Ok(DataType::Nil)
                }
                Err(err) => {
                    self.env.declare(name.clone(), DataType::Error);
                    Err(err)
                }
            },
            Stmt::Assign { name, value } => {
                let Some(target) = self.env.lookup(name) else {
                    return Err(AnalysisError::new(format!("unknown variable {name}")));
                };
                let ty = self.check_expr(value)?;
                if !target.accepts(&ty) {
                    return Err(AnalysisError::new(format!(
                        "cannot assign {ty} to variable {name} of type {target}"
                    )));
                }
                Ok(DataType::Nil)
            }
            Stmt::Expr(expr) => self.check_expr(expr),
            Stmt::Return(value) => {
                let ty = match value {
                    Some(expr) => self.check_expr(expr)?,
                    None => DataType::Nil,
                };
                if !self.context.ret.accepts(&ty) {
                    return Err(AnalysisError::new(format!(
                        "cannot return {ty} from {}, expected {}",
                        self.context.name, self.context.ret
                    )));
                }
                Ok(DataType::Return)
            }
            Stmt::Break => match self.context.loops.last_mut() {
                Some(seen_break) => {
                    *seen_break = true;
                    Ok(DataType::Nil)
                }
                None => Err(AnalysisError::new("break outside of loop")),
            },
            Stmt::If(stmt) => self.check_if(stmt),
            Stmt::For(for_loop) => {
                if let Some(cond) = &for_loop.condition {
                    self.check_condition(cond)?;
                }
                self.context.loops.push(false);
                let body = self.check_block(&for_loop.body);
                let seen_break = self.context.loops.pop().unwrap_or(false);
                body?;
                if for_loop.condition.is_none() && !seen_break {
                    Ok(DataType::Return)
                } else {
                    Ok(DataType::Nil)
                }
            }
            Stmt::Go(expr) => {
                self.check_expr(expr)?;
                Ok(DataType::Nil)
            }
            Stmt::Send { channel, value } => {
                let Some(target) = self.env.lookup(channel) else {
                    return Err(AnalysisError::new(format!("unknown identifier: {channel}")));
                };
                let ty = self.check_expr(value)?;
                match target {
                    DataType::Channel(elem) if elem.accepts(&ty) => Ok(DataType::Nil),
                    DataType::Channel(elem) => Err(AnalysisError::new(format!(
                        "channel of {elem} cannot carry {ty}"
                    ))),
                    other if other.is_wildcard() => Ok(DataType::Nil),
                    other => Err(AnalysisError::new(format!(
                        "cannot send to value of type {other}"
                    ))),
                }
            }
        }
    }

    fn check_var(&mut self, decl: &VarDecl) -> Check<DataType> {
        let checked = self.var_type(decl);
        // A failed declaration still binds its name so later statements
        // report their own errors only.
        let ty = match (&checked, &decl.ty) {
            (Ok(ty), _) => ty.clone(),
            (Err(_), Some(declared)) => declared.clone(),
            (Err(_), None) => DataType::Error,
        };
        self.env.declare(decl.name.clone(), ty);
        checked.map(|_| DataType::Nil)
    }

    fn var_type(&mut self, decl: &VarDecl) -> Check<DataType> {
        let name = &decl.name;
        match (&decl.ty, &decl.value) {
            (Some(declared), Some(value)) => {
                let ty = self.check_expr(value)?;
                if !declared.accepts(&ty) {
                    return Err(AnalysisError::new(format!(
                        "cannot use {ty} as {declared} in declaration of {name}"
                    )));
                }
                Ok(declared.clone())
            }
            (None, Some(value)) => self.check_expr(value),
            (Some(declared), None) => Ok(declared.clone()),
            (None, None) => Err(AnalysisError::new(format!(
                "variable {name} needs a type or a value"
            ))),
        }
    }

    fn check_if(&mut self, stmt: &IfStmt) -> Check<DataType> {
        self.check_condition(&stmt.condition)?;
        let then_ty = self.check_block(&stmt.then_branch)?;
        let Some(alt) = &stmt.else_branch else {
            return Ok(DataType::Nil);
        };
        let else_ty = self.check_block(alt)?;
        if then_ty == DataType::Return && else_ty == DataType::Return {
            Ok(DataType::Return)
        } else {
            Ok(DataType::Nil)
        }
    }

    fn check_condition(&mut self, cond: &Expr) -> Check<()> {
        let ty = self.check_expr(cond)?;
        if DataType::Bool.accepts(&ty) {
            Ok(())
        } else {
            Err(AnalysisError::new(format!("condition must be bool, got {ty}")))
        }
    }

    /// Check a block in a child scope. Its type is the type of its last
    /// statement, so a block ending in `return` has type `Return`.
    fn check_block(&mut self, block: &Block) -> Check<DataType> {
        let child = self.env.enter();
        self.scoped(child, |this| {
            let mut last = DataType::Nil;
            for stmt in &block.statements {
                last = this.check_stmt(stmt)?;
            }
            Ok(last)
        })
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Expressions
    // ═══════════════════════════════════════════════════════════════════════

    fn check_expr(&mut self, expr: &Expr) -> Check<DataType> {
        match expr {
            Expr::Int(_) => Ok(DataType::Int),
            Expr::Str(_) => Ok(DataType::String),
            Expr::Bool(_) => Ok(DataType::Bool),
            Expr::Ident(name) => self
                .env
                .lookup(name)
                .ok_or_else(|| AnalysisError::new(format!("unknown identifier: {name}"))),
            Expr::Prefix { op, right } => {
                let operand = self.check_expr(right)?;
                operators::check_prefix(*op, &operand).ok_or_else(|| match op {
                    PrefixOp::FileTest => {
                        AnalysisError::new(format!("unknown operator: -f {operand}"))
                    }
                    _ => AnalysisError::new(format!("unknown operator: {op}{operand}")),
                })
            }
            Expr::Infix { left, op, right } => {
                let l = self.check_expr(left)?;
                let r = self.check_expr(right)?;
                operators::check_infix(&l, *op, &r).ok_or_else(|| {
                    if l == r {
                        AnalysisError::new(format!("unknown operator: {l} {op} {r}"))
                    } else {
                        AnalysisError::new(format!("type mismatch: {l} {op} {r}"))
                    }
                })
            }
            Expr::Call { callee, args } => self.check_call(callee, args),
            Expr::Index { left, index } => {
                let container = self.check_expr(left)?;
                let index_ty = self.check_expr(index)?;
                if !DataType::Int.accepts(&index_ty) {
                    return Err(AnalysisError::new(format!(
                        "index must be int, got {index_ty}"
                    )));
                }
                match container {
                    DataType::Slice(elem) => Ok(*elem),
                    other if other.is_wildcard() => Ok(DataType::Any),
                    other => Err(AnalysisError::new(format!(
                        "cannot index value of type {other}"
                    ))),
                }
            }
            Expr::Function(lit) => self.check_function(lit),
            Expr::SliceLit { elem, items } => {
                for item in items {
                    let ty = self.check_expr(item)?;
                    if !elem.accepts(&ty) {
                        return Err(AnalysisError::new(format!(
                            "cannot use {ty} as {elem} in slice literal"
                        )));
                    }
                }
                Ok(DataType::slice_of(elem.clone()))
            }
            Expr::Type(_) => Ok(DataType::Any),
            Expr::Receive(source) => match self.check_expr(source)? {
                DataType::Channel(elem) => Ok(*elem),
                other if other.is_wildcard() => Ok(DataType::Any),
                other => Err(AnalysisError::new(format!(
                    "cannot receive from value of type {other}"
                ))),
            },
            Expr::Shell(_) | Expr::Positional(_) | Expr::EnvVar(_) => Ok(DataType::String),
        }
    }

    fn check_call(&mut self, callee: &Expr, args: &[Expr]) -> Check<DataType> {
        let callee_ty = self.check_expr(callee)?;
        let mut arg_types = Vec::with_capacity(args.len());
        for arg in args {
            arg_types.push(self.check_expr(arg)?);
        }

        match callee_ty {
            DataType::Function { params, ret } => {
                if params.len() != arg_types.len() {
                    return Err(AnalysisError::new(format!(
                        "wrong number of arguments: expected {}, got {}",
                        params.len(),
                        arg_types.len()
                    )));
                }
                for (i, (param, arg)) in params.iter().zip(&arg_types).enumerate() {
                    if !param.accepts(arg) {
                        return Err(AnalysisError::new(format!(
                            "argument {} has type {arg}, expected {param} in call to {callee}",
                            i + 1
                        )));
                    }
                }
                Ok(*ret)
            }
            DataType::Builtin => Ok(DataType::Any),
            other if other.is_wildcard() => Ok(DataType::Any),
            other => Err(AnalysisError::new(format!(
                "cannot call value of type {other}"
            ))),
        }
    }

    fn check_function(&mut self, lit: &FunctionLit) -> Check<DataType> {
        let ty = lit.data_type();
        if let Some(name) = &lit.name {
            self.env.declare(name.clone(), ty.clone());
        }

        let body_env = self.env.enter();
        for param in &lit.params {
            body_env.declare(param.name.clone(), param.ty.clone());
        }

        let name = lit.name.clone().unwrap_or_else(|| "func literal".to_string());
        let context = FunctionContext {
            name: name.clone(),
            ret: lit.ret.clone(),
            loops: Vec::new(),
        };
        let outer = std::mem::replace(&mut self.context, context);
        let body = self.scoped(body_env, |this| this.check_block(&lit.body));
        self.context = outer;

        let needs_return = !matches!(lit.ret, DataType::Nil | DataType::Any);
        if needs_return && body? != DataType::Return {
            return Err(AnalysisError::new(format!(
                "missing return at end of function {name}"
            )));
        }
        Ok(ty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::CommandTable;
    use crate::parser::parse;
    use rstest::rstest;

    fn analyze(source: &str) -> Vec<String> {
        let program = match parse(source, &CommandTable::empty()) {
            Ok(program) => program,
            Err(errors) => panic!("parse errors for {source:?}: {errors:?}"),
        };
        let mut analyzer = Analyzer::default();
        analyzer
            .analyze_program(&program)
            .into_iter()
            .map(|e| e.message)
            .collect()
    }

    fn assert_clean(source: &str) {
        let errors = analyze(source);
        assert!(errors.is_empty(), "unexpected errors for {source:?}: {errors:?}");
    }

    fn assert_error(source: &str, expected: &str) {
        let errors = analyze(source);
        assert!(
            errors.iter().any(|e| e == expected),
            "expected {expected:?} for {source:?}, got {errors:?}"
        );
    }

    #[rstest]
    #[case::var_forms("var a = 5\nvar b int\nvar c string = \"x\"\na = 6")]
    #[case::declare("x := 1 + 2\ny := x * 3")]
    #[case::function("func add(x int, y int) int { return x + y }\nadd(2, 3)")]
    #[case::recursion("func fact(n int) int { if n < 2 { return 1 } else { return n * fact(n - 1) } }")]
    #[case::closure("func counter() func() int { n := 0\n return func() int { n = n + 1\n return n } }")]
    #[case::slices("s := []int{1, 2}\nx := s[0] + 1")]
    #[case::references("x := 1\nr := &x\ny := *r + 1")]
    #[case::channels("var c chan int\nc <- 1\nv := <- c + 1")]
    #[case::any_wildcard("var a any = 1\nb := a + 1\nvar s string = a")]
    #[case::loops("i := 0\nfor i < 3 { i = i + 1\n if i == 2 { break } }")]
    #[case::infinite_loop_terminates("func f() int { for { } }")]
    #[case::shell("out := $(ls -la)\nn := out + $1 + $HOME")]
    #[case::builtins("print(1, \"a\")\nn := len([]int{})")]
    #[case::file_test("if -f \"/tmp\" { print(1) }")]
    #[case::go("c := make(chan int, 1)\ngo func() { c <- 1 }()")]
    fn accepts_well_typed(#[case] source: &str) {
        assert_clean(source);
    }

    #[rstest]
    #[case::wrong_arity("func add(x int, y int) int { return x + y }\nadd(1)", "wrong number of arguments: expected 2, got 1")]
    #[case::wrong_arg("func add(x int, y int) int { return x + y }\nadd(2, \"x\")", "argument 2 has type string, expected int in call to add")]
    #[case::not_callable("x := 1\nx()", "cannot call value of type int")]
    #[case::mismatch("1 + \"b\"", "type mismatch: int + string")]
    #[case::unknown_op("true + false", "unknown operator: bool + bool")]
    #[case::unknown_prefix("-\"a\"", "unknown operator: -string")]
    #[case::unknown_ident("y + 1", "unknown identifier: y")]
    #[case::unknown_var("z = 1", "unknown variable z")]
    #[case::untyped_var("var q", "variable q needs a type or a value")]
    #[case::var_mismatch("var a int = \"s\"", "cannot use string as int in declaration of a")]
    #[case::assign_mismatch("a := 1\na = \"s\"", "cannot assign string to variable a of type int")]
    #[case::condition("if 1 { }", "condition must be bool, got int")]
    #[case::break_outside("break", "break outside of loop")]
    #[case::break_in_function("for { func() { break } }", "break outside of loop")]
    #[case::missing_return("func f(x int) int { if x > 0 { return 1 } }", "missing return at end of function f")]
    #[case::loop_with_break("func f() int { for { break } }", "missing return at end of function f")]
    #[case::bad_return("func f() int { return \"s\" }", "cannot return string from f, expected int")]
    #[case::index_non_slice("x := 1\nx[0]", "cannot index value of type int")]
    #[case::index_type("s := []int{}\ns[\"a\"]", "index must be int, got string")]
    #[case::slice_item("[]int{1, \"a\"}", "cannot use string as int in slice literal")]
    #[case::channel_payload("var c chan int\nc <- \"s\"", "channel of int cannot carry string")]
    #[case::send_non_channel("c := 1\nc <- 1", "cannot send to value of type int")]
    #[case::deref_int("x := 1\n*x", "unknown operator: *int")]
    fn rejects_ill_typed(#[case] source: &str, #[case] expected: &str) {
        assert_error(source, expected);
    }

    #[test]
    fn one_error_per_failing_statement() {
        let errors = analyze("x := y\nz := 1 + \"a\"\nw := 1");
        assert_eq!(
            errors,
            vec![
                "unknown identifier: y".to_string(),
                "type mismatch: int + string".to_string()
            ]
        );
    }

    #[test]
    fn failed_declaration_is_poisoned_not_unknown() {
        let errors = analyze("x := y\nz := x + 1\nx = \"s\"");
        assert_eq!(errors, vec!["unknown identifier: y".to_string()]);
    }

    #[rstest]
    #[case::mismatched_var("var x int = \"s\"\nx + 1", "cannot use string as int in declaration of x")]
    #[case::bad_initializer("var x int = y\nx + 1", "unknown identifier: y")]
    #[case::untyped_initializer("var x = y\nz := x + 1", "unknown identifier: y")]
    #[case::no_type_or_value("var x\nx = 1", "variable x needs a type or a value")]
    fn failed_var_still_binds_its_name(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(analyze(source), vec![expected.to_string()]);
    }

    #[test]
    fn failed_var_keeps_declared_type() {
        let errors = analyze("var x int = \"s\"\nx = \"t\"");
        assert_eq!(
            errors,
            vec![
                "cannot use string as int in declaration of x".to_string(),
                "cannot assign string to variable x of type int".to_string()
            ]
        );
    }

    #[test]
    fn seeded_from_runtime_bindings() {
        let values = Environment::new();
        values.declare("n", Value::Integer(1));
        let program = match parse("m := n + 1\nn = \"s\"", &CommandTable::empty()) {
            Ok(program) => program,
            Err(errors) => panic!("{errors:?}"),
        };
        let errors = Analyzer::seeded(&values).analyze_program(&program);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].message, "cannot assign string to variable n of type int");
    }

    #[test]
    fn analysis_is_idempotent() {
        let source = "func add(x int, y int) int { return x + y }\nv := add(1, 2)\nfor v > 0 { v = v - 1 }";
        assert_clean(source);
        assert_clean(source);
    }

    #[test]
    fn expression_types() {
        let mut analyzer = Analyzer::default();
        let mut ty = |source: &str| {
            let program = match parse(source, &CommandTable::empty()) {
                Ok(program) => program,
                Err(errors) => panic!("{errors:?}"),
            };
            let Some(Stmt::Expr(expr)) = program.statements.first() else {
                panic!("expected expression statement");
            };
            analyzer.expr_type(expr).map_err(|e| e.message)
        };
        assert_eq!(ty("1 < 2"), Ok(DataType::Bool));
        assert_eq!(ty("\"a\" + \"b\""), Ok(DataType::String));
        assert_eq!(ty("[]string{}"), Ok(DataType::slice_of(DataType::String)));
        assert_eq!(ty("&\"a\""), Ok(DataType::reference_to(DataType::String)));
        assert_eq!(
            ty("func(a, b int) bool { return a < b }"),
            Ok(DataType::Function {
                params: vec![DataType::Int, DataType::Int],
                ret: Box::new(DataType::Bool)
            })
        );
    }
}
