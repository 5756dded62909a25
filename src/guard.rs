use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::executor::Executor;
use crate::outcome::ExecutionOutcome;
use crate::spec::WorkSpec;
use crate::target::Target;

/// Tracks engine calls abandoned by a timeout that are still running in the
/// background.
///
/// Cancellation is best-effort: an engine that ignores its token keeps
/// running, detached, after the guard has already reported a timeout. The
/// tracker makes that visible instead of letting it leak silently.
#[derive(Debug, Clone, Default)]
pub struct OrphanTracker {
    live: Arc<AtomicUsize>,
    abandoned: Arc<AtomicUsize>,
}

impl OrphanTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Detached engine calls currently still running.
    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Total engine calls ever abandoned by a timeout.
    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    fn adopt(&self) {
        self.live.fetch_add(1, Ordering::SeqCst);
        self.abandoned.fetch_add(1, Ordering::SeqCst);
    }

    fn release(&self) {
        self.live.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Wraps one engine call with a deadline.
///
/// `execute` never fails and never panics outward: engine errors, timeouts,
/// and engine panics all come back as a populated [`ExecutionOutcome`].
pub struct TimeoutGuard {
    executor: Arc<dyn Executor>,
    orphans: OrphanTracker,
}

impl TimeoutGuard {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self::with_orphans(executor, OrphanTracker::new())
    }

    pub fn with_orphans(executor: Arc<dyn Executor>, orphans: OrphanTracker) -> Self {
        Self { executor, orphans }
    }

    pub fn orphans(&self) -> OrphanTracker {
        self.orphans.clone()
    }

    /// Run the engine against one target, racing it with `spec.timeout`.
    ///
    /// The engine call runs as its own task with its own cancellation token.
    /// If the deadline fires first the token is cancelled and the task is
    /// left detached; the engine task tears down its own execution context
    /// whenever it finishes. The timer path never touches that context.
    pub async fn execute(&self, target: Target, spec: Arc<WorkSpec>) -> ExecutionOutcome {
        let started = Instant::now();
        let cancel = CancellationToken::new();

        let executor = self.executor.clone();
        let task_target = target.clone();
        let task_spec = spec.clone();
        let task_cancel = cancel.child_token();
        let mut handle = tokio::spawn(async move {
            executor.run(&task_target, &task_spec, task_cancel).await
        });

        tokio::select! {
            joined = &mut handle => match joined {
                Ok(raw) => ExecutionOutcome::from_raw(target, raw, started.elapsed()),
                Err(join_error) => {
                    tracing::warn!(host = %target, error = %join_error, "Execution engine panicked");
                    ExecutionOutcome::failed(
                        target,
                        vec![format!("execution engine panicked: {}", join_error)],
                        started.elapsed(),
                    )
                }
            },
            _ = tokio::time::sleep(spec.timeout) => {
                cancel.cancel();
                self.orphans.adopt();
                let orphans = self.orphans.clone();
                tokio::spawn(async move {
                    let _ = handle.await;
                    orphans.release();
                });
                tracing::warn!(
                    host = %target,
                    timeout_secs = spec.timeout.as_secs(),
                    "Execution timed out, engine call left detached"
                );
                ExecutionOutcome::timed_out(target, spec.timeout, started.elapsed())
            }
        }
    }
}
