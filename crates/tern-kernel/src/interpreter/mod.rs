//! Interpreter core for tern.
//!
//! This module provides:
//! - **Scope**: chained environments of lock-protected slots
//! - **Value**: runtime values, closures, slices, references and channels
//! - **ControlFlow**: break/return signals between statements
//! - **Eval**: the tree-walking evaluator and its error type
//! - **Builtins**: `print`, `len`, `append`, `read` and `make`

pub mod builtins;
pub mod control_flow;
pub mod eval;
pub mod scope;
pub mod value;

pub use builtins::{BUILTIN_NAMES, Builtin};
pub use control_flow::ControlFlow;
pub use eval::{
    Context, EvalError, EvalResult, Interpreter, NoOpShell, ShellError, ShellExecutor, eval_infix,
};
pub use scope::{Environment, Slot, new_slot};
pub use value::{Channel, Function, Reference, Slice, Value};
