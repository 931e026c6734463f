//! tern entry point.
//!
//! Launch the interactive REPL:
//! ```bash
//! cargo run -p tern-repl
//! ```
//!
//! Run a script, exposing trailing arguments as `$1`, `$2`, …:
//! ```bash
//! tern build.tn release
//! ```

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn main() -> Result<ExitCode> {
    // Initialize tracing (respects RUST_LOG env var)
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    match args.next() {
        None => {
            tern_repl::run()?;
            Ok(ExitCode::SUCCESS)
        }
        Some(path) => {
            let status = tern_repl::run_script(&PathBuf::from(path), args.collect())?;
            Ok(ExitCode::from(status))
        }
    }
}
