use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::outcome::ExecutionOutcome;

/// Per-completion hook, invoked once per collected outcome on the completing
/// worker's own task. A slow hook reduces pool throughput; a panicking hook
/// is caught and logged without touching the sink or sibling workers.
pub type OnEach = Arc<dyn Fn(&ExecutionOutcome) + Send + Sync>;

/// Concurrency-safe, order-irrelevant, append-only sink for the outcomes of
/// one dispatch.
///
/// Cloning yields another handle to the same sink. All mutation is serialized
/// through one mutex scoped to this collection; nothing else in a dispatch is
/// shared mutable state.
#[derive(Clone, Default)]
pub struct ResultAggregator {
    outcomes: Arc<Mutex<Vec<ExecutionOutcome>>>,
    on_each: Option<OnEach>,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_on_each(hook: OnEach) -> Self {
        Self {
            outcomes: Arc::new(Mutex::new(Vec::new())),
            on_each: Some(hook),
        }
    }

    /// Append one outcome and fire the notification hook.
    ///
    /// The hook runs after the lock is released, so a blocked hook cannot
    /// stall other workers' appends.
    pub async fn add(&self, outcome: ExecutionOutcome) {
        {
            let mut outcomes = self.outcomes.lock().await;
            outcomes.push(outcome.clone());
        }

        if let Some(hook) = &self.on_each {
            let result = std::panic::catch_unwind(AssertUnwindSafe(|| hook(&outcome)));
            if result.is_err() {
                tracing::warn!(host = %outcome.target, "Completion hook panicked, ignoring");
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.outcomes.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.outcomes.lock().await.is_empty()
    }

    /// Clone of the outcomes collected so far.
    pub async fn snapshot(&self) -> Vec<ExecutionOutcome> {
        self.outcomes.lock().await.clone()
    }

    /// Drain the sink, handing ownership of every collected outcome to the
    /// caller.
    pub async fn take_all(&self) -> Vec<ExecutionOutcome> {
        std::mem::take(&mut *self.outcomes.lock().await)
    }
}
