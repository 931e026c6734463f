//! Abstract syntax tree for tern.
//!
//! Every node renders back to source text through `Display`. Operator
//! expressions are fully parenthesised, so rendering a tree and parsing the
//! result reproduces the same structure: `1 + 2 * 3` renders as
//! `(1 + (2 * 3))`.

pub mod types;

use std::fmt;
use std::sync::Arc;

pub use types::DataType;

/// A complete program: a sequence of top-level statements.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}

/// A statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// `var name [type] [= value]`
    Var(VarDecl),
    /// `name = value`
    Assign { name: String, value: Expr },
    /// `name := value`
    Declare { name: String, value: Expr },
    /// An expression evaluated for its value or effects.
    Expr(Expr),
    /// `return [value]`
    Return(Option<Expr>),
    /// `break`
    Break,
    If(IfStmt),
    For(ForLoop),
    /// `go expr`
    Go(Expr),
    /// `channel <- value`
    Send { channel: String, value: Expr },
}

/// `var` declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct VarDecl {
    pub name: String,
    pub ty: Option<DataType>,
    pub value: Option<Expr>,
}

/// `if cond { … } else { … }`. An `else if` chain nests an `If` inside the
/// else block.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStmt {
    pub condition: Expr,
    pub then_branch: Block,
    pub else_branch: Option<Block>,
}

/// `for [cond] { … }`. No condition loops until `break` or `return`.
#[derive(Debug, Clone, PartialEq)]
pub struct ForLoop {
    pub condition: Option<Expr>,
    pub body: Block,
}

/// A braced statement list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Block {
    pub statements: Vec<Stmt>,
}

/// An expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Int(i64),
    Str(String),
    Bool(bool),
    Ident(String),
    Prefix {
        op: PrefixOp,
        right: Box<Expr>,
    },
    Infix {
        left: Box<Expr>,
        op: InfixOp,
        right: Box<Expr>,
    },
    Call {
        callee: Box<Expr>,
        args: Vec<Expr>,
    },
    Index {
        left: Box<Expr>,
        index: Box<Expr>,
    },
    /// Function literal. Shared with the function values created from it.
    Function(Arc<FunctionLit>),
    /// `[]T{a, b}`
    SliceLit {
        elem: DataType,
        items: Vec<Expr>,
    },
    /// A type in expression position, as in `make(chan int, 1)`.
    Type(DataType),
    /// `<- channel`
    Receive(Box<Expr>),
    /// `$(words…)` or an implicit command line.
    Shell(Vec<ShellWord>),
    /// `$N`
    Positional(usize),
    /// `$NAME`
    EnvVar(String),
}

/// `func [name](params) [ret] { body }`
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLit {
    pub name: Option<String>,
    pub params: Vec<Param>,
    pub ret: DataType,
    pub body: Block,
}

impl FunctionLit {
    /// The function's type descriptor.
    pub fn data_type(&self) -> DataType {
        DataType::Function {
            params: self.params.iter().map(|p| p.ty.clone()).collect(),
            ret: Box::new(self.ret.clone()),
        }
    }
}

/// A typed function parameter.
#[derive(Debug, Clone, PartialEq)]
pub struct Param {
    pub name: String,
    pub ty: DataType,
}

/// One whitespace-separated word of a shell command.
#[derive(Debug, Clone, PartialEq)]
pub enum ShellWord {
    Literal(String),
    /// `$name`, replaced by the binding's inspection string when bound.
    Var(String),
    /// `$N`, replaced by the positional argument when supplied.
    Positional(usize),
}

impl ShellWord {
    /// Classify a raw word.
    pub fn parse(word: &str) -> Self {
        if let Some(rest) = word.strip_prefix('$') {
            if let Ok(n) = rest.parse::<usize>() {
                return ShellWord::Positional(n);
            }
            let is_name = rest
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
                && rest.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if is_name {
                return ShellWord::Var(rest.to_string());
            }
        }
        ShellWord::Literal(word.to_string())
    }

    /// Split a command line into words.
    pub fn split(line: &str) -> Vec<ShellWord> {
        line.split_whitespace().map(ShellWord::parse).collect()
    }
}

/// Prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrefixOp {
    /// `!`
    Not,
    /// `-`
    Neg,
    /// `-f`
    FileTest,
    /// `*`
    Deref,
    /// `&`
    Ref,
}

/// Infix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InfixOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Eq,
    NotEq,
    And,
    Or,
}

impl fmt::Display for PrefixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PrefixOp::Not => write!(f, "!"),
            PrefixOp::Neg => write!(f, "-"),
            PrefixOp::FileTest => write!(f, "-f"),
            PrefixOp::Deref => write!(f, "*"),
            PrefixOp::Ref => write!(f, "&"),
        }
    }
}

impl fmt::Display for InfixOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InfixOp::Add => write!(f, "+"),
            InfixOp::Sub => write!(f, "-"),
            InfixOp::Mul => write!(f, "*"),
            InfixOp::Div => write!(f, "/"),
            InfixOp::Mod => write!(f, "%"),
            InfixOp::Lt => write!(f, "<"),
            InfixOp::Gt => write!(f, ">"),
            InfixOp::Eq => write!(f, "=="),
            InfixOp::NotEq => write!(f, "!="),
            InfixOp::And => write!(f, "&&"),
            InfixOp::Or => write!(f, "||"),
        }
    }
}

fn write_list<T: fmt::Display>(f: &mut fmt::Formatter<'_>, items: &[T]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            write!(f, ", ")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, stmt) in self.statements.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{stmt}")?;
        }
        Ok(())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.statements.is_empty() {
            return write!(f, "{{ }}");
        }
        write!(f, "{{ ")?;
        for (i, stmt) in self.statements.iter().enumerate() {
            if i > 0 {
                write!(f, "; ")?;
            }
            write!(f, "{stmt}")?;
        }
        write!(f, " }}")
    }
}

impl fmt::Display for Stmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::Var(decl) => {
                write!(f, "var {}", decl.name)?;
                if let Some(ty) = &decl.ty {
                    write!(f, " {ty}")?;
                }
                if let Some(value) = &decl.value {
                    write!(f, " = {value}")?;
                }
                Ok(())
            }
            Stmt::Assign { name, value } => write!(f, "{name} = {value}"),
            Stmt::Declare { name, value } => write!(f, "{name} := {value}"),
            Stmt::Expr(expr) => write!(f, "{expr}"),
            Stmt::Return(Some(value)) => write!(f, "return {value}"),
            Stmt::Return(None) => write!(f, "return"),
            Stmt::Break => write!(f, "break"),
            Stmt::If(stmt) => {
                write!(f, "if {} {}", stmt.condition, stmt.then_branch)?;
                if let Some(alt) = &stmt.else_branch {
                    write!(f, " else {alt}")?;
                }
                Ok(())
            }
            Stmt::For(stmt) => match &stmt.condition {
                Some(cond) => write!(f, "for {cond} {}", stmt.body),
                None => write!(f, "for {}", stmt.body),
            },
            Stmt::Go(expr) => write!(f, "go {expr}"),
            Stmt::Send { channel, value } => write!(f, "{channel} <- {value}"),
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expr::Int(n) => write!(f, "{n}"),
            Expr::Str(s) => write!(f, "\"{s}\""),
            Expr::Bool(b) => write!(f, "{b}"),
            Expr::Ident(name) => write!(f, "{name}"),
            Expr::Prefix {
                op: PrefixOp::FileTest,
                right,
            } => write!(f, "(-f {right})"),
            Expr::Prefix {
                op: PrefixOp::Neg,
                right,
            } => {
                // `-f` followed by a non-identifier character lexes as the file test
                let operand = right.to_string();
                let mut chars = operand.chars();
                let ambiguous = chars.next() == Some('f')
                    && !chars.next().is_some_and(|c| c.is_ascii_alphanumeric() || c == '_');
                if ambiguous {
                    write!(f, "(- {operand})")
                } else {
                    write!(f, "(-{operand})")
                }
            }
            Expr::Prefix { op, right } => write!(f, "({op}{right})"),
            Expr::Infix { left, op, right } => write!(f, "({left} {op} {right})"),
            Expr::Call { callee, args } => {
                write!(f, "{callee}(")?;
                write_list(f, args)?;
                write!(f, ")")
            }
            Expr::Index { left, index } => write!(f, "({left}[{index}])"),
            Expr::Function(func) => write!(f, "{func}"),
            Expr::SliceLit { elem, items } => {
                write!(f, "[]{elem}{{")?;
                write_list(f, items)?;
                write!(f, "}}")
            }
            Expr::Type(ty) => write!(f, "{ty}"),
            Expr::Receive(source) => write!(f, "(<- {source})"),
            Expr::Shell(words) => {
                write!(f, "$(")?;
                for (i, word) in words.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{word}")?;
                }
                write!(f, ")")
            }
            Expr::Positional(n) => write!(f, "${n}"),
            Expr::EnvVar(name) => write!(f, "${name}"),
        }
    }
}

impl fmt::Display for FunctionLit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "func")?;
        if let Some(name) = &self.name {
            write!(f, " {name}")?;
        }
        write!(f, "(")?;
        write_list(f, &self.params)?;
        write!(f, ")")?;
        if self.ret != DataType::Nil {
            write!(f, " {}", self.ret)?;
        }
        write!(f, " {}", self.body)
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.ty)
    }
}

impl fmt::Display for ShellWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShellWord::Literal(word) => write!(f, "{word}"),
            ShellWord::Var(name) => write!(f, "${name}"),
            ShellWord::Positional(n) => write!(f, "${n}"),
        }
    }
}
