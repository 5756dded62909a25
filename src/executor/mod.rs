//! Execution engine boundary.
//!
//! The dispatch core never runs code itself; it hands one `(target, spec)`
//! pair at a time to an [`Executor`] and consumes the [`RawOutcome`] the
//! engine reports back.
//!
//! # Contract
//!
//! - `run` never fails at the type level: connection problems, engine
//!   failures, and anything else the engine can observe are folded into the
//!   returned [`RawOutcome`].
//! - Every `run` invocation allocates its own execution context (process
//!   handle, session, connection) and tears it down on every exit path.
//!   Contexts are never shared or reused across invocations.
//! - The caller may abandon the returned future after signalling the
//!   cancellation token; the engine must tolerate never being polled again.
//!
//! [`ShellExecutor`] is the built-in engine for local targets. Remote
//! transports plug in behind the same trait.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::outcome::RawOutcome;
use crate::spec::WorkSpec;
use crate::target::Target;

pub mod shell;

pub use shell::ShellExecutor;

#[async_trait]
pub trait Executor: Send + Sync {
    /// Run one unit of work against one target.
    ///
    /// `cancel` is a best-effort stop signal: the engine should wind down
    /// promptly when it fires, but the caller does not rely on it.
    async fn run(&self, target: &Target, spec: &WorkSpec, cancel: CancellationToken)
        -> RawOutcome;
}
