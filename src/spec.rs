use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FanoutError, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// What kind of code a [`WorkSpec`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CodeKind {
    /// A single command or program name, executed as-is.
    Command,
    /// Inline script source text.
    Script,
    /// Path to a script file whose contents are read at execution time.
    ScriptFile,
}

impl std::fmt::Display for CodeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CodeKind::Command => write!(f, "command"),
            CodeKind::Script => write!(f, "script"),
            CodeKind::ScriptFile => write!(f, "script-file"),
        }
    }
}

/// Immutable description of one unit of work.
///
/// Built once, validated eagerly, then shared read-only by every worker of a
/// dispatch (wrap in `Arc`). The spec never carries per-target state; each
/// execution allocates its own context from it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkSpec {
    pub code: String,
    pub kind: CodeKind,
    /// Named values exposed to the code at execution time. Unordered.
    pub parameters: HashMap<String, Value>,
    /// Modules loaded into the execution environment before the code runs,
    /// in order.
    pub modules: Vec<PathBuf>,
    pub timeout: Duration,
}

impl WorkSpec {
    /// Create a spec with the default 30 second timeout.
    ///
    /// Fails if `code` is empty or blank.
    pub fn new(code: impl Into<String>, kind: CodeKind) -> Result<Self> {
        let code = code.into();
        if code.trim().is_empty() {
            return Err(FanoutError::InvalidSpec(
                "code must not be empty".to_string(),
            ));
        }
        Ok(Self {
            code,
            kind,
            parameters: HashMap::new(),
            modules: Vec::new(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn with_parameter(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.parameters.insert(name.into(), value.into());
        self
    }

    pub fn with_module(mut self, path: impl Into<PathBuf>) -> Self {
        self.modules.push(path.into());
        self
    }

    /// Replace the execution deadline. Fails on a zero timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        if timeout.is_zero() {
            return Err(FanoutError::InvalidSpec(
                "timeout must be positive".to_string(),
            ));
        }
        self.timeout = timeout;
        Ok(self)
    }
}
