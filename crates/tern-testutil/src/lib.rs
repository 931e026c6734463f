//! Test utilities for tern.
//!
//! Provides the parser and runner for the `tests/scripts/*.test` format:
//! each case is a tern program with either its expected output or the
//! expected error. Running a case is left to the caller, so this crate has
//! no dependency on the kernel.

pub mod script;

use std::fmt;

/// How a script case compared against its expectation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseOutcome {
    Passed,
    /// The program ran but printed something else.
    OutputMismatch { expected: String, actual: String },
    /// Output was expected but the program failed.
    UnexpectedError { message: String },
    /// The program failed with a message not containing the expected text.
    WrongError { expected: String, message: String },
    /// An error was expected but the program ran to completion.
    MissingError { expected: String, output: String },
}

impl CaseOutcome {
    pub fn is_pass(&self) -> bool {
        matches!(self, CaseOutcome::Passed)
    }
}

/// A failing case, located in its file.
#[derive(Debug, Clone)]
pub struct CaseFailure {
    pub case: String,
    /// Line of the `# test:` header.
    pub line: usize,
    pub outcome: CaseOutcome,
}

/// Results of one `.test` file.
#[derive(Debug, Default)]
pub struct ScriptReport {
    pub file: String,
    pub passed: usize,
    pub failures: Vec<CaseFailure>,
}

impl ScriptReport {
    pub fn new(file: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            ..Self::default()
        }
    }

    pub fn record(&mut self, case: &str, line: usize, outcome: CaseOutcome) {
        if outcome.is_pass() {
            self.passed += 1;
        } else {
            self.failures.push(CaseFailure {
                case: case.to_string(),
                line,
                outcome,
            });
        }
    }

    pub fn total(&self) -> usize {
        self.passed + self.failures.len()
    }

    pub fn all_passed(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Write `text` one line per row with a marker, so trailing whitespace and
/// missing lines are visible.
fn write_lines(f: &mut fmt::Formatter<'_>, marker: char, text: &str) -> fmt::Result {
    if text.is_empty() {
        return writeln!(f, "      {marker} (nothing)");
    }
    for line in text.lines() {
        writeln!(f, "      {marker} {line:?}")?;
    }
    Ok(())
}

impl fmt::Display for ScriptReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}: {}/{} passed", self.file, self.passed, self.total())?;
        for failure in &self.failures {
            writeln!(f, "  {}:{} {}", self.file, failure.line, failure.case)?;
            match &failure.outcome {
                CaseOutcome::Passed => {}
                CaseOutcome::OutputMismatch { expected, actual } => {
                    writeln!(f, "    output differs")?;
                    write_lines(f, '-', expected)?;
                    write_lines(f, '+', actual)?;
                }
                CaseOutcome::UnexpectedError { message } => {
                    writeln!(f, "    failed: {message}")?;
                }
                CaseOutcome::WrongError { expected, message } => {
                    writeln!(f, "    expected error containing {expected:?}")?;
                    writeln!(f, "    got: {message}")?;
                }
                CaseOutcome::MissingError { expected, output } => {
                    writeln!(f, "    expected error containing {expected:?}, but it ran")?;
                    write_lines(f, '+', output)?;
                }
            }
        }
        Ok(())
    }
}
