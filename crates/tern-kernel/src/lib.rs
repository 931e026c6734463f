//! tern-kernel: the core of the tern language.
//!
//! This crate provides:
//!
//! - **Lexer**: Tokenizes tern source code using logos
//! - **Parser**: Pratt parser building the AST
//! - **AST**: Statements, expressions and data-type descriptors
//! - **Analyzer**: Scope-aware type checking before evaluation
//! - **Interpreter**: Tree-walking evaluation, builtins, references, channels
//! - **Scheduler**: Task pool for evaluation and `go` tasks
//! - **Shell**: Running `$( … )` and implicit commands through a shell
//! - **Kernel**: Parse, analyze and evaluate units of source

pub mod analyzer;
pub mod ast;
pub mod commands;
pub mod console;
pub mod interpreter;
pub mod kernel;
pub mod lexer;
pub mod parser;
pub mod scheduler;
pub mod shell;

pub use analyzer::{AnalysisError, Analyzer};
pub use commands::CommandTable;
pub use console::{BufferConsole, Console, StdConsole};
pub use interpreter::{EvalError, ShellError, ShellExecutor, Value};
pub use kernel::{Kernel, KernelConfig, KernelError};
pub use parser::{ParseError, parse};
pub use shell::ProcessShell;
