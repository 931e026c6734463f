//! Script test file parser and runner.
//!
//! Parses the `tests/scripts/*.test` format:
//!
//! ```text
//! # test: add_ints
//! # expect: ok
//! ---
//! print(1 + 2)
//! ---
//! 3
//! ===
//! ```
//!
//! An `ok` case compares the program's full output. An `error` case passes
//! when the program fails with a message containing the expected text.
//! Lines between `===` and the next `# test:` are ignored, which leaves room
//! for free-form notes.

use crate::{CaseOutcome, ScriptReport};

/// A single script test case.
#[derive(Debug, Clone)]
pub struct ScriptTestCase {
    /// Test name from the `# test: name` line.
    pub name: String,
    /// Line number of the `# test:` header (1-indexed).
    pub line_number: usize,
    /// Program source.
    pub input: String,
    /// What running the program should produce.
    pub expected: ScriptExpectation,
}

/// What we expect from running a program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptExpectation {
    /// Exact output, one trailing newline per line.
    Output(String),
    /// Substring of the error message.
    Error(String),
}

/// Parse the *.test file format into test cases.
pub fn parse_script_tests(content: &str) -> Vec<ScriptTestCase> {
    let mut cases = Vec::new();
    let lines: Vec<&str> = content.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let Some(name) = lines[i].trim().strip_prefix("# test:") else {
            i += 1;
            continue;
        };
        let name = name.trim().to_string();
        let line_number = i + 1;
        i += 1;

        let mut expect_error = false;
        if let Some(expect) = lines.get(i).and_then(|l| l.trim().strip_prefix("# expect:")) {
            expect_error = expect.trim() == "error";
            i += 1;
        }

        while i < lines.len() && lines[i].trim() != "---" {
            i += 1;
        }
        i += 1;

        let mut input = Vec::new();
        while i < lines.len() && lines[i].trim() != "---" {
            input.push(lines[i]);
            i += 1;
        }
        i += 1;

        let mut expected = Vec::new();
        while i < lines.len() && lines[i].trim() != "===" {
            expected.push(lines[i]);
            i += 1;
        }
        i += 1;

        let expected = if expect_error {
            ScriptExpectation::Error(expected.join("\n").trim().to_string())
        } else {
            ScriptExpectation::Output(expected.iter().map(|l| format!("{l}\n")).collect())
        };

        cases.push(ScriptTestCase {
            name,
            line_number,
            input: input.join("\n"),
            expected,
        });
    }

    cases
}

impl ScriptTestCase {
    /// Compare a run's outcome against the expectation.
    ///
    /// `outcome` is the program's output on success or its error message.
    pub fn check(&self, outcome: Result<String, String>) -> CaseOutcome {
        match (&self.expected, outcome) {
            (ScriptExpectation::Output(expected), Ok(actual)) if *expected == actual => {
                CaseOutcome::Passed
            }
            (ScriptExpectation::Output(expected), Ok(actual)) => CaseOutcome::OutputMismatch {
                expected: expected.clone(),
                actual,
            },
            (ScriptExpectation::Output(_), Err(message)) => CaseOutcome::UnexpectedError { message },
            (ScriptExpectation::Error(expected), Err(message)) if message.contains(expected.as_str()) => {
                CaseOutcome::Passed
            }
            (ScriptExpectation::Error(expected), Err(message)) => CaseOutcome::WrongError {
                expected: expected.clone(),
                message,
            },
            (ScriptExpectation::Error(expected), Ok(output)) => CaseOutcome::MissingError {
                expected: expected.clone(),
                output,
            },
        }
    }
}

/// Run every case of `file` through `run` and report.
pub fn run_script_tests<F>(file: &str, cases: &[ScriptTestCase], mut run: F) -> ScriptReport
where
    F: FnMut(&str) -> Result<String, String>,
{
    let mut report = ScriptReport::new(file);
    for case in cases {
        let outcome = case.check(run(&case.input));
        report.record(&case.name, case.line_number, outcome);
    }
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    const FILE: &str = r#"
Notes before the first case are ignored.

# test: add
# expect: ok
---
print(1 + 2)
print("x")
---
3
x
===

# test: mismatch
# expect: error
---
1 + "b"
---
type mismatch
===

# test: silent
---
var a = 1
---
===
"#;

    #[test]
    fn parses_cases_in_order() {
        let cases = parse_script_tests(FILE);
        let names: Vec<_> = cases.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["add", "mismatch", "silent"]);
        assert_eq!(cases[0].line_number, 4);
        assert_eq!(cases[0].input, "print(1 + 2)\nprint(\"x\")");
        assert_eq!(cases[0].expected, ScriptExpectation::Output("3\nx\n".into()));
        assert_eq!(cases[1].expected, ScriptExpectation::Error("type mismatch".into()));
        assert_eq!(cases[2].expected, ScriptExpectation::Output(String::new()));
    }

    #[test]
    fn check_compares_outcomes() {
        let cases = parse_script_tests(FILE);
        assert!(cases[0].check(Ok("3\nx\n".into())).is_pass());
        assert_eq!(
            cases[0].check(Ok("3\n".into())),
            CaseOutcome::OutputMismatch {
                expected: "3\nx\n".into(),
                actual: "3\n".into()
            }
        );
        assert_eq!(
            cases[0].check(Err("boom".into())),
            CaseOutcome::UnexpectedError { message: "boom".into() }
        );
        assert!(cases[1].check(Err("type mismatch: int + string".into())).is_pass());
        assert_eq!(
            cases[1].check(Err("unknown identifier: b".into())),
            CaseOutcome::WrongError {
                expected: "type mismatch".into(),
                message: "unknown identifier: b".into()
            }
        );
        assert_eq!(
            cases[1].check(Ok(String::new())),
            CaseOutcome::MissingError {
                expected: "type mismatch".into(),
                output: String::new()
            }
        );
    }

    #[test]
    fn runner_feeds_each_input() {
        let cases = parse_script_tests(FILE);
        let mut seen = Vec::new();
        let report = run_script_tests("sample.test", &cases, |input| {
            seen.push(input.to_string());
            Ok(String::new())
        });
        assert_eq!(seen.len(), 3);
        assert_eq!(report.file, "sample.test");
        assert_eq!(report.passed, 1);
        let failed: Vec<_> = report.failures.iter().map(|f| f.case.as_str()).collect();
        assert_eq!(failed, vec!["add", "mismatch"]);
    }
}
