//! Console capability for program I/O.
//!
//! `print` writes through the console and `read` pulls words from it, so
//! output can be directed to different destinations:
//! - Binary: stdout, stderr and stdin
//! - Tests: in-memory buffers for assertions and scripted input

use std::collections::VecDeque;
use std::io::{self, BufRead, Write};

use parking_lot::Mutex;

/// Where program output goes and where `read` input comes from.
pub trait Console: Send + Sync {
    /// Write program output.
    fn write_out(&self, text: &str);

    /// Write diagnostics.
    fn write_err(&self, text: &str);

    /// Next whitespace-delimited word of input, or `None` at end of input.
    fn read_word(&self) -> Option<String>;
}

/// Console backed by the process's standard streams.
#[derive(Default)]
pub struct StdConsole {
    pending: Mutex<VecDeque<String>>,
}

impl StdConsole {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Console for StdConsole {
    fn write_out(&self, text: &str) {
        let mut out = io::stdout().lock();
        // Write failures (closed pipe) are dropped.
        let _ = out.write_all(text.as_bytes());
        let _ = out.flush();
    }

    fn write_err(&self, text: &str) {
        let mut err = io::stderr().lock();
        let _ = err.write_all(text.as_bytes());
        let _ = err.flush();
    }

    fn read_word(&self) -> Option<String> {
        let mut pending = self.pending.lock();
        loop {
            if let Some(word) = pending.pop_front() {
                return Some(word);
            }
            let mut line = String::new();
            match io::stdin().lock().read_line(&mut line) {
                Ok(0) => return None,
                Ok(_) => pending.extend(line.split_whitespace().map(str::to_string)),
                Err(err) => {
                    tracing::warn!(%err, "failed to read from stdin");
                    return None;
                }
            }
        }
    }
}

/// Console that captures output and serves scripted input.
///
/// Used for testing where output needs to be captured.
#[derive(Default)]
pub struct BufferConsole {
    out: Mutex<String>,
    err: Mutex<String>,
    input: Mutex<VecDeque<String>>,
}

impl BufferConsole {
    /// Create a console with no input.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a console whose input is the words of `input`.
    pub fn with_input(input: &str) -> Self {
        let console = Self::default();
        console
            .input
            .lock()
            .extend(input.split_whitespace().map(str::to_string));
        console
    }

    /// Get all captured output.
    pub fn output(&self) -> String {
        self.out.lock().clone()
    }

    /// Get all captured diagnostics.
    pub fn errors(&self) -> String {
        self.err.lock().clone()
    }

    /// Clear captured output and diagnostics.
    pub fn clear(&self) {
        self.out.lock().clear();
        self.err.lock().clear();
    }
}

impl Console for BufferConsole {
    fn write_out(&self, text: &str) {
        self.out.lock().push_str(text);
    }

    fn write_err(&self, text: &str) {
        self.err.lock().push_str(text);
    }

    fn read_word(&self) -> Option<String> {
        self.input.lock().pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_captures_streams_separately() {
        let console = BufferConsole::new();
        console.write_out("hello ");
        console.write_out("world\n");
        console.write_err("oops\n");
        assert_eq!(console.output(), "hello world\n");
        assert_eq!(console.errors(), "oops\n");

        console.clear();
        assert_eq!(console.output(), "");
        assert_eq!(console.errors(), "");
    }

    #[test]
    fn buffer_serves_words_in_order() {
        let console = BufferConsole::with_input("42  hello\n  true");
        assert_eq!(console.read_word().as_deref(), Some("42"));
        assert_eq!(console.read_word().as_deref(), Some("hello"));
        assert_eq!(console.read_word().as_deref(), Some("true"));
        assert_eq!(console.read_word(), None);
    }
}
