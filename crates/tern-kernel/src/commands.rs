//! Known shell commands.
//!
//! The command table is built once at startup and handed to the lexer as
//! configuration. An identifier that names a known command at the start of
//! a statement lexes as an implicit shell command (`ls -la`), which is how
//! `foo(1)` and `ls -la` are told apart without a marker.

use std::collections::BTreeSet;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::interpreter::builtins::BUILTIN_NAMES;
use crate::lexer::KEYWORDS;

/// Immutable set of command names recognised as implicit shell commands.
///
/// Language keywords and builtin names are never part of the table, so a
/// `make` binary on `PATH` does not shadow the `make` builtin.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandTable {
    names: BTreeSet<String>,
}

impl CommandTable {
    /// A table with no commands; every identifier stays an identifier.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a table from explicit names.
    pub fn from_names<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let names = names
            .into_iter()
            .map(Into::into)
            .filter(|name| !is_reserved(name))
            .collect();
        Self { names }
    }

    /// Discover executables on the `PATH` environment variable.
    pub fn discover() -> Self {
        let Some(path) = env::var_os("PATH") else {
            tracing::warn!("PATH is not set, no shell commands will be recognised");
            return Self::empty();
        };
        Self::discover_in(env::split_paths(&path))
    }

    /// Discover executables in the given directories.
    ///
    /// Unreadable or missing directories are skipped.
    pub fn discover_in<I>(dirs: I) -> Self
    where
        I: IntoIterator<Item = PathBuf>,
    {
        let mut names = Vec::new();
        for dir in dirs {
            let entries = match fs::read_dir(&dir) {
                Ok(entries) => entries,
                Err(err) => {
                    tracing::debug!(dir = %dir.display(), %err, "skipping command directory");
                    continue;
                }
            };
            for entry in entries.flatten() {
                let path = entry.path();
                if !is_executable(&path) {
                    continue;
                }
                if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                    names.push(name.to_string());
                }
            }
        }

        let table = Self::from_names(names);
        tracing::debug!(count = table.len(), "discovered shell commands");
        table
    }

    /// Whether `name` is a known command.
    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

fn is_reserved(name: &str) -> bool {
    KEYWORDS.contains(&name) || BUILTIN_NAMES.contains(&name)
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}
