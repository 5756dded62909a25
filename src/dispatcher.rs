use std::sync::Arc;

use tokio::sync::Semaphore;
use uuid::Uuid;

use crate::aggregator::{OnEach, ResultAggregator};
use crate::error::{FanoutError, Result};
use crate::executor::Executor;
use crate::guard::{OrphanTracker, TimeoutGuard};
use crate::outcome::ExecutionOutcome;
use crate::spec::WorkSpec;
use crate::target::Target;

/// One dispatch: which targets, what work, how wide, and optionally a
/// per-completion hook.
///
/// Duplicate targets are legal; every occurrence is dispatched independently
/// with its own execution context.
pub struct DispatchRequest {
    pub targets: Vec<Target>,
    pub spec: WorkSpec,
    pub throttle: usize,
    pub on_each: Option<OnEach>,
}

impl DispatchRequest {
    /// Build a request with the default throttle (logical processor count).
    pub fn new(targets: Vec<Target>, spec: WorkSpec) -> Self {
        Self {
            targets,
            spec,
            throttle: default_throttle(),
            on_each: None,
        }
    }

    /// Cap the number of concurrently running jobs. Fails on zero.
    pub fn with_throttle(mut self, throttle: usize) -> Result<Self> {
        if throttle == 0 {
            return Err(FanoutError::InvalidThrottle(throttle));
        }
        self.throttle = throttle;
        Ok(self)
    }

    /// Observe each outcome as it completes, on the completing worker's task.
    pub fn with_on_each(mut self, hook: impl Fn(&ExecutionOutcome) + Send + Sync + 'static) -> Self {
        self.on_each = Some(Arc::new(hook));
        self
    }
}

fn default_throttle() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Fans one unit of work out across targets with bounded parallelism and
/// joins on completion.
///
/// Failure of any one job (engine error, timeout, even an engine panic) has
/// no effect on any other job: there is no shared cancellation and no early
/// abort. The only state shared between jobs is the aggregation sink.
pub struct Dispatcher {
    executor: Arc<dyn Executor>,
    orphans: OrphanTracker,
}

impl Dispatcher {
    pub fn new(executor: Arc<dyn Executor>) -> Self {
        Self {
            executor,
            orphans: OrphanTracker::new(),
        }
    }

    /// Engine calls abandoned by a timeout that are still running, across all
    /// dispatches made through this dispatcher.
    pub fn orphans(&self) -> OrphanTracker {
        self.orphans.clone()
    }

    /// Run the request to completion and return one outcome per dispatched
    /// target, in unspecified order.
    ///
    /// Returns only after every job has reached a terminal state; there is no
    /// partial or cancelled result for the dispatch as a whole.
    pub async fn begin_invoke(&self, request: DispatchRequest) -> Vec<ExecutionOutcome> {
        let dispatch_id = Uuid::new_v4();
        let total = request.targets.len();
        let spec = Arc::new(request.spec);
        let guard = Arc::new(TimeoutGuard::with_orphans(
            self.executor.clone(),
            self.orphans.clone(),
        ));
        let aggregator = match request.on_each {
            Some(hook) => ResultAggregator::with_on_each(hook),
            None => ResultAggregator::new(),
        };
        let semaphore = Arc::new(Semaphore::new(request.throttle));

        tracing::info!(
            dispatch_id = %dispatch_id,
            targets = total,
            throttle = request.throttle,
            "Dispatch started"
        );

        let mut handles = Vec::with_capacity(total);
        for target in request.targets {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .expect("dispatch semaphore is never closed");
            let guard = guard.clone();
            let spec = spec.clone();
            let aggregator = aggregator.clone();
            let job_target = target.clone();

            let handle = tokio::spawn(async move {
                let outcome = guard.execute(job_target.clone(), spec).await;
                tracing::debug!(
                    dispatch_id = %dispatch_id,
                    host = %job_target,
                    success = outcome.success,
                    duration_ms = outcome.duration.as_millis() as u64,
                    "Job finished"
                );
                aggregator.add(outcome).await;
                drop(permit);
            });
            handles.push((target, handle));
        }

        // Full join. The guard converts every engine-side fault into an
        // outcome, so a join error here means the job task itself died;
        // record a failed outcome for its target rather than losing it.
        for (target, handle) in handles {
            if let Err(join_error) = handle.await {
                tracing::error!(
                    dispatch_id = %dispatch_id,
                    host = %target,
                    error = %join_error,
                    "Dispatch job died before reporting"
                );
                aggregator
                    .add(ExecutionOutcome::failed(
                        target,
                        vec![format!("dispatch job failed: {}", join_error)],
                        std::time::Duration::ZERO,
                    ))
                    .await;
            }
        }

        let outcomes = aggregator.take_all().await;
        tracing::info!(
            dispatch_id = %dispatch_id,
            collected = outcomes.len(),
            failed = outcomes.iter().filter(|o| !o.success).count(),
            "Dispatch complete"
        );
        outcomes
    }
}
