//! tern REPL: interactive loop and script runner.
//!
//! The REPL feeds each complete input to a [`Kernel`] and prints:
//!
//! - the value of the unit, unless it is `nil`
//! - parse errors as source-annotated reports
//! - analysis errors as an indented list
//! - runtime errors as `ERROR: …`
//!
//! Input with unclosed braces is buffered until the braces balance, so
//! functions and loops can be typed over several lines.
//! Meta-commands: `/help`, `/quit`, `/ast`, `/vars`.

use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use ariadne::{Config, IndexType, Label, Report, ReportKind, Source};
use rustyline::Editor;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use tokio::runtime::Runtime;

use tern_kernel::interpreter::Value;
use tern_kernel::{Console, Kernel, KernelConfig, KernelError, ParseError, StdConsole};

/// Environment variable naming the shell used for command expressions.
pub const SHELL_ENV: &str = "TERN_SHELL";

/// Kernel config for the binary: commands from `PATH`, shell from
/// [`SHELL_ENV`] when set.
pub fn default_config() -> KernelConfig {
    let config = KernelConfig::default();
    match std::env::var(SHELL_ENV) {
        Ok(shell) if !shell.is_empty() => config.with_shell(shell),
        _ => config,
    }
}

/// REPL configuration and state.
pub struct Repl {
    kernel: Kernel,
    runtime: Runtime,
    show_ast: bool,
    color: bool,
    /// Lines of an unfinished unit.
    pending: String,
    quit: bool,
}

impl Repl {
    /// Create a REPL on standard streams.
    pub fn new() -> Result<Self> {
        Self::with_kernel(Kernel::new(default_config())?)
    }

    /// Create a REPL around an existing kernel.
    pub fn with_kernel(kernel: Kernel) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("failed to start REPL runtime")?;
        Ok(Self {
            kernel,
            runtime,
            show_ast: false,
            color: false,
            pending: String::new(),
            quit: false,
        })
    }

    /// Colorize diagnostics.
    pub fn set_color(&mut self, color: bool) {
        self.color = color;
    }

    /// True while a multi-line unit is being collected.
    pub fn is_continuing(&self) -> bool {
        !self.pending.is_empty()
    }

    /// True once `/quit` has been entered.
    pub fn should_quit(&self) -> bool {
        self.quit
    }

    /// Process a single line of input.
    pub fn process_line(&mut self, line: &str) -> Result<Option<String>> {
        let trimmed = line.trim();

        if !self.is_continuing() {
            if trimmed.starts_with('/') {
                return self.handle_meta_command(trimmed);
            }
            if trimmed.is_empty() {
                return Ok(None);
            }
        }

        self.pending.push_str(line);
        self.pending.push('\n');
        if brace_depth(&self.pending) > 0 {
            return Ok(None);
        }
        let source = std::mem::take(&mut self.pending);

        if self.show_ast {
            return Ok(Some(match self.kernel.parse(&source) {
                Ok(program) => program.to_string(),
                Err(KernelError::Parse(errors)) => render_parse_errors(&source, &errors, self.color),
                Err(err) => err.to_string(),
            }));
        }

        match self.runtime.block_on(self.kernel.execute(&source)) {
            Ok(value) if value.is_nil() => Ok(None),
            Ok(value) => Ok(Some(value.to_string())),
            Err(err) => Ok(Some(format_error(&source, &err, self.color))),
        }
    }

    /// Handle a meta-command (starts with /).
    fn handle_meta_command(&mut self, cmd: &str) -> Result<Option<String>> {
        let command = cmd.split_whitespace().next().unwrap_or("");

        match command {
            "/quit" | "/q" | "/exit" => {
                self.quit = true;
                Ok(None)
            }
            "/help" | "/h" | "/?" => Ok(Some(HELP_TEXT.to_string())),
            "/ast" => {
                self.show_ast = !self.show_ast;
                Ok(Some(format!(
                    "AST mode: {}",
                    if self.show_ast { "ON" } else { "OFF" }
                )))
            }
            "/vars" => {
                let vars: Vec<_> = self
                    .kernel
                    .vars()
                    .into_iter()
                    .filter(|(_, value)| !matches!(value, Value::Builtin(_)))
                    .collect();
                if vars.is_empty() {
                    return Ok(Some("(no variables set)".to_string()));
                }
                let mut output = String::from("Variables:\n");
                for (name, value) in vars {
                    output.push_str(&format!("  {name} {} = {value}\n", value.data_type()));
                }
                Ok(Some(output.trim_end().to_string()))
            }
            _ => Ok(Some(format!(
                "Unknown command: {command}\nType /help for available commands."
            ))),
        }
    }
}

/// Net count of unclosed `{`, ignoring strings and comments.
fn brace_depth(source: &str) -> i64 {
    let mut depth = 0;
    let mut in_string = false;
    let mut in_comment = false;
    for c in source.chars() {
        match c {
            '\n' => in_comment = false,
            _ if in_comment => {}
            '"' => in_string = !in_string,
            _ if in_string => {}
            '#' => in_comment = true,
            '{' => depth += 1,
            '}' => depth -= 1,
            _ => {}
        }
    }
    depth
}

/// Render a kernel error the way the REPL and the script runner print it.
pub fn format_error(source: &str, err: &KernelError, color: bool) -> String {
    match err {
        KernelError::Parse(errors) => render_parse_errors(source, errors, color),
        KernelError::Analysis(errors) => {
            let mut output = String::from("analysis errors:");
            for err in errors {
                output.push_str(&format!("\n\t{err}"));
            }
            output
        }
        KernelError::Runtime(err) => format!("ERROR: {err}"),
        KernelError::Task(message) => format!("ERROR: {message}"),
    }
}

/// Render parse errors as ariadne reports against `source`.
pub fn render_parse_errors(source: &str, errors: &[ParseError], color: bool) -> String {
    const ID: &str = "input";
    let mut out = Vec::new();
    for err in errors {
        let start = err.span.start.min(source.len());
        let end = err.span.end.clamp(start, source.len());
        let report = Report::build(ReportKind::Error, (ID, start..end))
            .with_config(
                Config::default()
                    .with_color(color)
                    .with_index_type(IndexType::Byte),
            )
            .with_message(&err.message)
            .with_label(Label::new((ID, start..end)).with_message(&err.message))
            .finish();
        if report.write((ID, Source::from(source)), &mut out).is_err() {
            out.extend_from_slice(format!("{err}\n").as_bytes());
        }
    }
    String::from_utf8_lossy(&out).trim_end().to_string()
}

const HELP_TEXT: &str = r#"tern REPL

Commands:
  /help, /h, /?     Show this help
  /quit, /q, /exit  Exit the REPL
  /ast              Toggle AST display mode
  /vars             Show all variables

Language:
  var x int = 1     Declare a variable (type or value may be omitted)
  x := 1            Declare with inferred type
  x = 2             Assign
  func f(a int) int { return a * 2 }
  if c { … } else { … }
  for c { … }       Loop while c; `for { … }` loops until break
  go f(1)           Run a call as a task
  c := make(chan int, 1)
  c <- 1            Send; `<- c` receives
  &x, *p            Reference and dereference
  $(ls -la)         Run a shell command and capture its output
  $1, $HOME         Script arguments and environment variables

Examples:
  xs := append([]int{1, 2}, 3)
  print(len(xs), xs[2])
  -f "/tmp/missing"
"#;

fn history_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "tern").map(|dirs| dirs.data_dir().join("history.txt"))
}

/// Run the REPL.
pub fn run() -> Result<()> {
    println!("tern v{}", env!("CARGO_PKG_VERSION"));
    println!("Type /help for commands, /quit to exit.\n");

    let mut rl: Editor<(), DefaultHistory> = Editor::new().context("Failed to create editor")?;

    let history_path = history_path();
    if let Some(ref path) = history_path {
        let _ = rl.load_history(path);
    }

    let mut repl = Repl::new()?;
    repl.set_color(std::io::stdout().is_terminal());

    loop {
        let prompt = if repl.is_continuing() { "...   " } else { "tern> " };

        match rl.readline(prompt) {
            Ok(line) => {
                let _ = rl.add_history_entry(line.as_str());

                match repl.process_line(&line) {
                    Ok(Some(output)) => println!("{output}"),
                    Ok(None) => {}
                    Err(e) => eprintln!("Error: {e}"),
                }
                if repl.should_quit() {
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("^D");
                break;
            }
            Err(err) => {
                eprintln!("Error: {err}");
                break;
            }
        }
    }

    if let Some(ref path) = history_path {
        if let Some(parent) = path.parent() {
            let _ = std::fs::create_dir_all(parent);
        }
        let _ = rl.save_history(path);
    }

    Ok(())
}

/// How a script run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptOutcome {
    /// The script finished; holds the printed form of a non-`nil` result.
    Success(Option<String>),
    /// The script failed; holds the rendered error.
    Failure(String),
}

/// Run a script file as one unit with the given console.
///
/// `$0` is the path and `args` become `$1` onwards. A leading `#!` line
/// lexes as a comment.
pub fn execute_script(
    path: &Path,
    args: Vec<String>,
    console: Arc<dyn Console>,
) -> Result<ScriptOutcome> {
    let source = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let config = default_config()
        .with_script_name(path.display().to_string())
        .with_args(args);
    let kernel = Kernel::with_console(config, console)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start script runtime")?;

    Ok(match runtime.block_on(kernel.execute(&source)) {
        Ok(value) if value.is_nil() => ScriptOutcome::Success(None),
        Ok(value) => ScriptOutcome::Success(Some(value.to_string())),
        Err(err) => {
            tracing::debug!(path = %path.display(), %err, "script failed");
            ScriptOutcome::Failure(format_error(&source, &err, std::io::stderr().is_terminal()))
        }
    })
}

/// Run a script on standard streams. Returns the process exit status.
pub fn run_script(path: &Path, args: Vec<String>) -> Result<u8> {
    match execute_script(path, args, Arc::new(StdConsole::new()))? {
        ScriptOutcome::Success(value) => {
            if let Some(value) = value {
                println!("{value}");
            }
            Ok(0)
        }
        ScriptOutcome::Failure(message) => {
            eprintln!("{message}");
            Ok(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case::balanced("func f() { }", 0)]
    #[case::open("for {", 1)]
    #[case::nested("if a { for {", 2)]
    #[case::brace_in_string("s := \"{\"", 0)]
    #[case::brace_in_comment("x := 1 # {", 0)]
    fn brace_depth_cases(#[case] source: &str, #[case] expected: i64) {
        assert_eq!(brace_depth(source), expected);
    }

    #[test]
    fn parse_errors_render_with_source() {
        let source = "var x = (1 +\n";
        let errors = vec![ParseError {
            span: 12..13,
            message: "no prefix parse function for NEWLINE found".to_string(),
        }];
        let rendered = render_parse_errors(source, &errors, false);
        assert!(rendered.contains("no prefix parse function for NEWLINE found"));
        assert!(rendered.contains("var x = (1 +"));
    }

    #[test]
    fn out_of_range_spans_are_clamped() {
        let errors = vec![ParseError {
            span: 40..50,
            message: "unexpected end".to_string(),
        }];
        let rendered = render_parse_errors("x", &errors, false);
        assert!(rendered.contains("unexpected end"));
    }
}
