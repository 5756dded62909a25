use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::target::Target;

/// What an execution engine reports for one invocation, before the guard
/// attributes it to a target.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawOutcome {
    pub had_errors: bool,
    pub results: Vec<Value>,
    pub errors: Vec<String>,
}

impl RawOutcome {
    pub fn success(results: Vec<Value>) -> Self {
        Self {
            had_errors: false,
            results,
            errors: Vec::new(),
        }
    }

    pub fn failure(errors: Vec<String>) -> Self {
        Self {
            had_errors: true,
            results: Vec::new(),
            errors,
        }
    }
}

/// Per-target result record.
///
/// Immutable once produced. Exactly one of `results`/`errors` is populated:
/// `results` is `Some` (possibly empty) iff the execution succeeded, `errors`
/// is `Some` (never empty) iff it did not.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub target: Target,
    pub success: bool,
    pub results: Option<Vec<Value>>,
    pub errors: Option<Vec<String>>,
    /// Wall time of the guarded call, including a timed-out wait.
    pub duration: Duration,
    pub completed_at: DateTime<Utc>,
}

impl ExecutionOutcome {
    pub fn succeeded(target: Target, results: Vec<Value>, duration: Duration) -> Self {
        Self {
            target,
            success: true,
            results: Some(results),
            errors: None,
            duration,
            completed_at: Utc::now(),
        }
    }

    pub fn failed(target: Target, mut errors: Vec<String>, duration: Duration) -> Self {
        if errors.is_empty() {
            errors.push("execution failed with no error detail".to_string());
        }
        Self {
            target,
            success: false,
            results: None,
            errors: Some(errors),
            duration,
            completed_at: Utc::now(),
        }
    }

    pub fn timed_out(target: Target, timeout: Duration, duration: Duration) -> Self {
        Self::failed(
            target,
            vec![format!(
                "execution timeout after {} second(s)",
                timeout.as_secs()
            )],
            duration,
        )
    }

    /// Attribute an engine report to a target.
    pub fn from_raw(target: Target, raw: RawOutcome, duration: Duration) -> Self {
        if raw.had_errors {
            Self::failed(target, raw.errors, duration)
        } else {
            Self::succeeded(target, raw.results, duration)
        }
    }

    pub fn results(&self) -> &[Value] {
        self.results.as_deref().unwrap_or_default()
    }

    pub fn errors(&self) -> &[String] {
        self.errors.as_deref().unwrap_or_default()
    }
}
