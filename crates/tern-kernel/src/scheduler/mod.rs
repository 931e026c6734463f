//! Task pool for evaluation and `go` tasks.
//!
//! Evaluation is synchronous: statements block on channels, shell commands
//! and console input. Every unit of evaluation therefore runs on a blocking
//! thread of a runtime owned by the kernel, and `go expr` is another
//! blocking task on the same runtime.
//!
//! A task blocked forever on a channel cannot be cancelled. Dropping the
//! pool shuts the runtime down in the background instead of waiting for
//! such tasks, so they never hold up process exit.

use std::future::Future;
use std::io;

use tokio::runtime::{Builder, Handle, Runtime};
use tokio::task::JoinHandle;

/// Kernel-owned multi-threaded runtime.
pub struct TaskPool {
    runtime: Option<Runtime>,
    handle: TaskHandle,
}

impl TaskPool {
    /// Start a pool whose threads are named after `name`.
    pub fn new(name: &str) -> io::Result<Self> {
        let runtime = Builder::new_multi_thread()
            .enable_all()
            .thread_name(format!("{name}-worker"))
            .build()?;
        let handle = TaskHandle {
            handle: runtime.handle().clone(),
        };
        tracing::debug!(name, "task pool started");
        Ok(Self {
            runtime: Some(runtime),
            handle,
        })
    }

    /// A cloneable handle for spawning onto this pool.
    pub fn handle(&self) -> TaskHandle {
        self.handle.clone()
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

/// Cloneable handle to a [`TaskPool`].
#[derive(Clone, Debug)]
pub struct TaskHandle {
    handle: Handle,
}

impl TaskHandle {
    /// Run blocking work on the pool.
    pub fn spawn_blocking<F, R>(&self, f: F) -> JoinHandle<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        self.handle.spawn_blocking(f)
    }

    /// Drive a future to completion from a blocking thread.
    ///
    /// Must not be called from async code.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.handle.block_on(future)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn blocking_tasks_return_values() {
        let pool = TaskPool::new("test").unwrap();
        let result = pool.handle().spawn_blocking(|| 21 * 2).await.unwrap();
        assert_eq!(result, 42);
    }

    #[tokio::test]
    async fn block_on_runs_async_work_from_blocking_thread() {
        let pool = TaskPool::new("test").unwrap();
        let handle = pool.handle();
        let inner = handle.clone();
        let result = handle
            .spawn_blocking(move || {
                inner.block_on(async {
                    tokio::time::sleep(Duration::from_millis(1)).await;
                    "done"
                })
            })
            .await
            .unwrap();
        assert_eq!(result, "done");
    }

    #[tokio::test]
    async fn drop_does_not_wait_for_stuck_tasks() {
        let pool = TaskPool::new("test").unwrap();
        let (_tx, rx) = crossbeam::channel::bounded::<()>(0);
        let _stuck = pool.handle().spawn_blocking(move || rx.recv());
        tokio::time::timeout(Duration::from_secs(5), async move { drop(pool) })
            .await
            .unwrap();
    }
}
