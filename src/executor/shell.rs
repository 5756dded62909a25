use std::process::Stdio;

use async_trait::async_trait;
use serde_json::Value;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

use crate::executor::Executor;
use crate::outcome::RawOutcome;
use crate::spec::{CodeKind, WorkSpec};
use crate::target::Target;

/// Built-in engine that runs work on the local machine via `sh -c`.
///
/// Captures stdout/stderr and maps the exit status into a [`RawOutcome`]:
/// stdout lines become `results`, stderr (or the exit code) becomes `errors`.
/// Remote targets are reported as unreachable; wiring a remote transport is
/// the caller's concern, behind its own [`Executor`] implementation.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor;

impl ShellExecutor {
    pub fn new() -> Self {
        Self
    }

    /// Assemble the shell source for one invocation: module sourcing lines
    /// first, then the code itself.
    async fn build_source(spec: &WorkSpec) -> Result<String, String> {
        let code = match spec.kind {
            CodeKind::Command | CodeKind::Script => spec.code.clone(),
            CodeKind::ScriptFile => tokio::fs::read_to_string(&spec.code)
                .await
                .map_err(|e| format!("failed to read script file {}: {}", spec.code, e))?,
        };

        let mut source = String::new();
        for module in &spec.modules {
            source.push_str(&format!(". {}\n", sh_quote(&module.display().to_string())));
        }
        source.push_str(&code);
        Ok(source)
    }

    fn process_output(result: std::io::Result<std::process::Output>) -> RawOutcome {
        match result {
            Ok(output) => {
                let stdout = String::from_utf8_lossy(&output.stdout).to_string();
                let stderr = String::from_utf8_lossy(&output.stderr).to_string();
                let exit_code = output.status.code();

                if output.status.success() {
                    let results = stdout
                        .lines()
                        .map(|line| Value::String(line.to_string()))
                        .collect();
                    RawOutcome::success(results)
                } else {
                    let error = if stderr.is_empty() {
                        format!("exit code: {:?}", exit_code)
                    } else {
                        stderr
                    };
                    RawOutcome::failure(vec![error])
                }
            }
            Err(e) => RawOutcome::failure(vec![format!("failed to spawn shell: {}", e)]),
        }
    }
}

#[async_trait]
impl Executor for ShellExecutor {
    async fn run(
        &self,
        target: &Target,
        spec: &WorkSpec,
        cancel: CancellationToken,
    ) -> RawOutcome {
        if !target.is_local() {
            return RawOutcome::failure(vec![format!(
                "cannot reach {}: no remote transport configured",
                target
            )]);
        }

        let source = match Self::build_source(spec).await {
            Ok(source) => source,
            Err(error) => return RawOutcome::failure(vec![error]),
        };

        tracing::debug!(host = %target, kind = %spec.kind, "Executing work");

        let mut command = Command::new("sh");
        command
            .arg("-c")
            .arg(&source)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (name, value) in &spec.parameters {
            command.env(name, env_value(value));
        }

        // kill_on_drop reaps the child if the cancel branch wins the race.
        tokio::select! {
            result = command.output() => Self::process_output(result),
            _ = cancel.cancelled() => {
                tracing::debug!(host = %target, "Execution cancelled");
                RawOutcome::failure(vec!["execution cancelled before completion".to_string()])
            }
        }
    }
}

/// Render a parameter value as an environment variable. Strings pass through
/// unquoted; everything else is JSON.
fn env_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn sh_quote(text: &str) -> String {
    format!("'{}'", text.replace('\'', r"'\''"))
}
