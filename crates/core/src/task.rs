//! Background task control -- start/stop of a single cooperative tokio task.
//!
//! Every long-running component (tailer, stats aggregator, alert detector)
//! owns one [`TaskController`]. The controller spawns the component's run
//! loop, hands it a [`CancellationToken`], and on `stop` cancels the token
//! and waits for the loop to return.
//!
//! # Lifecycle
//! ```text
//! Idle -> start() -> Running -> stop() -> Stopping -> (joined) -> Idle
//! ```
//!
//! Run loops must select on `token.cancelled()` at every wait point.
//! `stop` has no timeout: a loop that never observes the token hangs it.

use std::future::Future;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::HttplogError;

/// Result of a component run loop.
pub type TaskResult = Result<(), HttplogError>;

struct ControllerState {
    handle: Option<JoinHandle<TaskResult>>,
    cancel: CancellationToken,
    stopping: bool,
}

/// Owns at most one background task at a time.
pub struct TaskController {
    name: String,
    state: Mutex<ControllerState>,
}

impl TaskController {
    /// Create an idle controller. `name` shows up in logs and task errors.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Mutex::new(ControllerState {
                handle: None,
                cancel: CancellationToken::new(),
                stopping: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Spawn `run` on the current tokio runtime.
    ///
    /// No-op (returns `false`) while a task handle is held, including a task
    /// that already returned but has not been stopped, and while a `stop`
    /// is in progress.
    ///
    /// # Panics
    /// Panics if called outside a tokio runtime.
    pub fn start<F, Fut>(&self, run: F) -> bool
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = TaskResult> + Send + 'static,
    {
        let mut state = self.lock();
        if state.handle.is_some() || state.stopping {
            tracing::debug!(task = %self.name, "start ignored, task already active");
            return false;
        }

        let token = state.cancel.clone();
        state.handle = Some(tokio::spawn(run(token)));
        tracing::debug!(task = %self.name, "task started");
        true
    }

    /// Cancel the task and wait for it to return.
    ///
    /// Returns the run loop's own result. Calling `stop` with no task
    /// (never started, or already stopped) is a no-op returning `Ok(())`.
    /// Afterwards the controller can be started again.
    pub async fn stop(&self) -> TaskResult {
        let handle = {
            let mut state = self.lock();
            let Some(handle) = state.handle.take() else {
                return Ok(());
            };
            state.stopping = true;
            state.cancel.cancel();
            handle
        };

        let joined = handle.await;

        {
            let mut state = self.lock();
            state.cancel = CancellationToken::new();
            state.stopping = false;
        }
        tracing::debug!(task = %self.name, "task stopped");

        match joined {
            Ok(result) => result,
            Err(e) => Err(HttplogError::Task {
                name: self.name.clone(),
                reason: e.to_string(),
            }),
        }
    }

    /// Whether a task handle is currently held.
    pub fn is_running(&self) -> bool {
        self.lock().handle.is_some()
    }

    fn lock(&self) -> MutexGuard<'_, ControllerState> {
        // state stays consistent across every critical section, poison is harmless
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for TaskController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskController")
            .field("name", &self.name)
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    async fn wait_for_cancel(starts: Arc<AtomicUsize>, token: CancellationToken) -> TaskResult {
        starts.fetch_add(1, Ordering::SeqCst);
        token.cancelled().await;
        Ok(())
    }

    #[tokio::test]
    async fn double_start_runs_one_task() {
        let controller = TaskController::new("test");
        let starts = Arc::new(AtomicUsize::new(0));

        assert!(controller.start(|token| wait_for_cancel(Arc::clone(&starts), token)));
        assert!(!controller.start(|token| wait_for_cancel(Arc::clone(&starts), token)));
        tokio::task::yield_now().await;

        controller.stop().await.unwrap();
        assert_eq!(starts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stop_without_start_is_noop() {
        let controller = TaskController::new("idle");
        controller.stop().await.unwrap();
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn second_stop_is_noop() {
        let controller = TaskController::new("twice");
        controller.start(|token| async move {
            token.cancelled().await;
            Ok(())
        });
        controller.stop().await.unwrap();
        controller.stop().await.unwrap();
        assert!(!controller.is_running());
    }

    #[tokio::test]
    async fn restart_after_stop() {
        let controller = TaskController::new("restart");
        let starts = Arc::new(AtomicUsize::new(0));

        controller.start(|token| wait_for_cancel(Arc::clone(&starts), token));
        controller.stop().await.unwrap();
        assert!(controller.start(|token| wait_for_cancel(Arc::clone(&starts), token)));
        assert!(controller.is_running());
        controller.stop().await.unwrap();

        assert_eq!(starts.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_interrupts_pending_sleep() {
        let controller = TaskController::new("sleeper");
        controller.start(|token| async move {
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => return Ok(()),
                    _ = tokio::time::sleep(Duration::from_secs(3600)) => {}
                }
            }
        });
        tokio::task::yield_now().await;

        let before = tokio::time::Instant::now();
        controller.stop().await.unwrap();
        assert!(before.elapsed() < Duration::from_millis(100));
    }

    #[tokio::test]
    async fn stop_returns_run_loop_error() {
        let controller = TaskController::new("failing");
        controller.start(|_token| async move {
            Err(HttplogError::LockPoisoned("stats".to_owned()))
        });

        let err = controller.stop().await.unwrap_err();
        assert!(matches!(err, HttplogError::LockPoisoned(_)));
    }

    #[tokio::test]
    async fn finished_task_blocks_start_until_stopped() {
        let controller = TaskController::new("done");
        controller.start(|_token| async move { Ok(()) });
        tokio::task::yield_now().await;

        assert!(!controller.start(|_token| async move { Ok(()) }));
        controller.stop().await.unwrap();
        assert!(controller.start(|_token| async move { Ok(()) }));
        controller.stop().await.unwrap();
    }
}
