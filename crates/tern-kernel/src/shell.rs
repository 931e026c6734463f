//! Process-backed shell capability.
//!
//! Command lines run as `<shell> -c "<words>"` so the shell handles globbing,
//! quoting and pipes. Evaluation threads are blocking threads of the task
//! pool, so each command is driven to completion with the pool's handle.

use std::process::Stdio;

use tokio::process::Command;

use crate::interpreter::{ShellError, ShellExecutor};
use crate::scheduler::TaskHandle;

/// Runs command lines through a shell program such as `sh` or `bash`.
#[derive(Debug, Clone)]
pub struct ProcessShell {
    program: String,
    tasks: TaskHandle,
}

impl ProcessShell {
    pub fn new(program: impl Into<String>, tasks: TaskHandle) -> Self {
        Self {
            program: program.into(),
            tasks,
        }
    }

    /// The shell program command lines are handed to.
    pub fn program(&self) -> &str {
        &self.program
    }

    async fn run(&self, line: String, interactive: bool) -> Result<String, ShellError> {
        let mut cmd = Command::new(&self.program);
        cmd.arg("-c").arg(&line);

        let spawn_error = |e: std::io::Error| ShellError::Spawn {
            program: self.program.clone(),
            message: e.to_string(),
        };

        if interactive {
            // Inherit the terminal; nothing is captured.
            let status = cmd.status().await.map_err(spawn_error)?;
            return match status.code() {
                Some(0) => Ok(String::new()),
                code => Err(ShellError::Failed {
                    command: line,
                    code: code.unwrap_or(-1),
                    stderr: String::new(),
                }),
            };
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let output = cmd.output().await.map_err(spawn_error)?;
        let code = output.status.code().unwrap_or(-1);
        tracing::trace!(command = %line, code, "shell command finished");
        if code != 0 {
            return Err(ShellError::Failed {
                command: line,
                code,
                stderr: String::from_utf8_lossy(&output.stderr).trim_end().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

impl ShellExecutor for ProcessShell {
    fn execute(&self, words: &[String], interactive: bool) -> Result<String, ShellError> {
        if words.is_empty() {
            return Err(ShellError::Empty);
        }
        let line = words.join(" ");
        tracing::trace!(program = %self.program, command = %line, interactive, "spawning shell command");
        self.tasks.block_on(self.run(line, interactive))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::TaskPool;

    fn words(line: &str) -> Vec<String> {
        line.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn captures_stdout() {
        let pool = TaskPool::new("shell-test").unwrap();
        let shell = ProcessShell::new("sh", pool.handle());
        let out = shell.execute(&words("echo hello world"), false).unwrap();
        assert_eq!(out, "hello world\n");
    }

    #[test]
    fn shell_syntax_is_interpreted() {
        let pool = TaskPool::new("shell-test").unwrap();
        let shell = ProcessShell::new("sh", pool.handle());
        let out = shell.execute(&words("printf a | tr a b"), false).unwrap();
        assert_eq!(out, "b");
    }

    #[test]
    fn nonzero_exit_carries_stderr() {
        let pool = TaskPool::new("shell-test").unwrap();
        let shell = ProcessShell::new("sh", pool.handle());
        let err = shell
            .execute(&words("echo broken >&2; exit 3"), false)
            .unwrap_err();
        assert_eq!(
            err,
            ShellError::Failed {
                command: "echo broken >&2; exit 3".to_string(),
                code: 3,
                stderr: "broken".to_string(),
            }
        );
    }

    #[test]
    fn missing_shell_program_fails_to_spawn() {
        let pool = TaskPool::new("shell-test").unwrap();
        let shell = ProcessShell::new("/nonexistent/tern-shell", pool.handle());
        let err = shell.execute(&words("true"), false).unwrap_err();
        assert!(matches!(err, ShellError::Spawn { ref program, .. } if program == "/nonexistent/tern-shell"));
    }

    #[test]
    fn empty_command_is_rejected() {
        let pool = TaskPool::new("shell-test").unwrap();
        let shell = ProcessShell::new("sh", pool.handle());
        assert_eq!(shell.execute(&[], false), Err(ShellError::Empty));
    }
}
