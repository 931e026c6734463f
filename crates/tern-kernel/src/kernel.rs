//! The Kernel: the front door to tern.
//!
//! The Kernel owns and coordinates all runtime state:
//! - Command table (implicit shell commands)
//! - Global environment (builtins and top-level bindings)
//! - Task pool (evaluation and `go` tasks)
//! - Console and shell capabilities
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                          Kernel                          │
//! │  ┌──────────────┐  ┌──────────────┐  ┌────────────────┐  │
//! │  │ CommandTable │  │ Environment  │  │   TaskPool     │  │
//! │  │   (lexer)    │  │  (bindings)  │  │ (eval, `go`)   │  │
//! │  └──────────────┘  └──────────────┘  └────────────────┘  │
//! │  ┌──────────────┐  ┌──────────────┐                      │
//! │  │   Console    │  │ ShellExecutor│                      │
//! │  │ (print/read) │  │  (`$( … )`)  │                      │
//! │  └──────────────┘  └──────────────┘                      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! Each call to [`Kernel::execute`] is one unit: it is parsed, analyzed
//! against the current bindings, and only then evaluated. Bindings made by
//! a unit stay visible to later units.

use std::sync::Arc;

use anyhow::{Context as _, Result};
use thiserror::Error;

use crate::analyzer::{AnalysisError, Analyzer};
use crate::ast::Program;
use crate::commands::CommandTable;
use crate::console::{Console, StdConsole};
use crate::interpreter::{Context, Environment, EvalError, Interpreter, ShellExecutor, Value, builtins};
use crate::parser::{ParseError, parse};
use crate::scheduler::TaskPool;
use crate::shell::ProcessShell;

/// Programs that take over the terminal when run as shell commands.
const DEFAULT_INTERACTIVE: &[&str] = &["vi", "vim", "nvim", "emacs", "nano", "links", "less", "top", "htop"];

/// Configuration for kernel initialization.
#[derive(Debug, Clone)]
pub struct KernelConfig {
    /// Name of this kernel (used for task thread names).
    pub name: String,
    /// Positional arguments, visible as `$1` onwards.
    pub args: Vec<String>,
    /// Visible as `$0`.
    pub script_name: String,
    /// Shell program used for command expressions.
    pub shell: String,
    /// Commands that inherit the terminal instead of being captured.
    pub interactive: Vec<String>,
    /// Known commands, or `None` to discover them from `PATH`.
    pub commands: Option<CommandTable>,
}

impl Default for KernelConfig {
    fn default() -> Self {
        Self {
            name: "tern".to_string(),
            args: Vec::new(),
            script_name: "tern".to_string(),
            shell: "sh".to_string(),
            interactive: DEFAULT_INTERACTIVE.iter().map(|s| s.to_string()).collect(),
            commands: None,
        }
    }
}

impl KernelConfig {
    /// A config with no implicit commands. Nothing is read from `PATH`.
    pub fn transient() -> Self {
        Self {
            name: "transient".to_string(),
            commands: Some(CommandTable::empty()),
            ..Self::default()
        }
    }

    pub fn with_args(mut self, args: Vec<String>) -> Self {
        self.args = args;
        self
    }

    pub fn with_script_name(mut self, name: impl Into<String>) -> Self {
        self.script_name = name.into();
        self
    }

    pub fn with_shell(mut self, shell: impl Into<String>) -> Self {
        self.shell = shell.into();
        self
    }

    pub fn with_commands(mut self, commands: CommandTable) -> Self {
        self.commands = Some(commands);
        self
    }
}

/// Why a unit of source did not produce a value.
#[derive(Debug, Error)]
pub enum KernelError {
    #[error("parse error: {}", join(.0))]
    Parse(Vec<ParseError>),
    #[error("analysis failed: {}", join(.0))]
    Analysis(Vec<AnalysisError>),
    #[error(transparent)]
    Runtime(#[from] EvalError),
    #[error("evaluation task failed: {0}")]
    Task(String),
}

fn join<E: std::fmt::Display>(errors: &[E]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// The Kernel: executes tern source.
pub struct Kernel {
    name: String,
    commands: CommandTable,
    env: Environment<Value>,
    interpreter: Interpreter,
    // Declared last so the interpreter's handle goes first.
    pool: TaskPool,
}

impl Kernel {
    /// Create a kernel that talks to the process's standard streams.
    pub fn new(config: KernelConfig) -> Result<Self> {
        Self::with_console(config, Arc::new(StdConsole::new()))
    }

    /// Create a kernel with a custom console and a process-backed shell.
    pub fn with_console(config: KernelConfig, console: Arc<dyn Console>) -> Result<Self> {
        let pool = TaskPool::new(&config.name).context("failed to start task pool")?;
        let shell = Arc::new(ProcessShell::new(config.shell.clone(), pool.handle()));
        Ok(Self::assemble(config, console, shell, pool))
    }

    /// Create a kernel with custom console and shell capabilities.
    pub fn with_parts(
        config: KernelConfig,
        console: Arc<dyn Console>,
        shell: Arc<dyn ShellExecutor>,
    ) -> Result<Self> {
        let pool = TaskPool::new(&config.name).context("failed to start task pool")?;
        Ok(Self::assemble(config, console, shell, pool))
    }

    /// Create a transient kernel on standard streams.
    pub fn transient() -> Result<Self> {
        Self::new(KernelConfig::transient())
    }

    fn assemble(
        config: KernelConfig,
        console: Arc<dyn Console>,
        shell: Arc<dyn ShellExecutor>,
        pool: TaskPool,
    ) -> Self {
        let commands = config.commands.unwrap_or_else(CommandTable::discover);
        tracing::debug!(name = %config.name, commands = commands.len(), "kernel starting");

        let env = Environment::new();
        builtins::install(&env);

        let interpreter = Interpreter::new(Context {
            console,
            shell,
            tasks: pool.handle(),
            script_name: config.script_name,
            args: config.args,
            interactive: config.interactive,
        });

        Self {
            name: config.name,
            commands,
            env,
            interpreter,
            pool,
        }
    }

    /// Get the kernel name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The command table handed to the lexer.
    pub fn commands(&self) -> &CommandTable {
        &self.commands
    }

    /// Parse without analyzing or evaluating.
    pub fn parse(&self, source: &str) -> Result<Program, KernelError> {
        parse(source, &self.commands).map_err(KernelError::Parse)
    }

    /// Execute one unit of tern source.
    ///
    /// Returns the value of the last statement, or of a top-level `return`.
    /// A unit with parse or analysis errors evaluates nothing; a runtime
    /// error stops the unit but keeps the effects of earlier statements.
    pub async fn execute(&self, source: &str) -> Result<Value, KernelError> {
        let program = self.parse(source)?;

        let errors = Analyzer::seeded(&self.env).analyze_program(&program);
        if !errors.is_empty() {
            tracing::debug!(count = errors.len(), "unit rejected by analysis");
            return Err(KernelError::Analysis(errors));
        }

        tracing::debug!(statements = program.statements.len(), "evaluating unit");
        let interpreter = self.interpreter.clone();
        let env = self.env.clone();
        let result = self
            .pool
            .handle()
            .spawn_blocking(move || interpreter.eval_program(&program, &env))
            .await
            .map_err(|e| KernelError::Task(e.to_string()))?;
        Ok(result?)
    }

    /// Look up a top-level binding.
    pub fn get_var(&self, name: &str) -> Option<Value> {
        self.env.lookup(name)
    }

    /// Every visible binding, sorted by name. Builtins included.
    pub fn vars(&self) -> Vec<(String, Value)> {
        self.env.names()
    }
}
