//! Bounded-parallel command dispatch across local and remote targets.
//!
//! Build a [`WorkSpec`], point a [`DispatchRequest`] at a list of targets,
//! and [`Dispatcher::begin_invoke`] runs the work everywhere concurrently,
//! bounded by a throttle, with each job racing its own deadline. The call
//! returns exactly one [`ExecutionOutcome`] per target. Per-target failures
//! never cross over: a timeout or engine fault on one host is just that
//! host's outcome.

pub mod aggregator;
pub mod dispatcher;
pub mod error;
pub mod executor;
pub mod guard;
pub mod outcome;
pub mod spec;
pub mod target;

pub use aggregator::{OnEach, ResultAggregator};
pub use dispatcher::{DispatchRequest, Dispatcher};
pub use error::{FanoutError, Result};
pub use executor::{Executor, ShellExecutor};
pub use guard::{OrphanTracker, TimeoutGuard};
pub use outcome::{ExecutionOutcome, RawOutcome};
pub use spec::{CodeKind, WorkSpec, DEFAULT_TIMEOUT};
pub use target::Target;
