//! `execute_command`: runs a shell command through `/bin/bash -c`, bounded
//! by a caller-supplied timeout.
//!
//! Grounded on `original_source/src/vibecore/tools/shell/tools.py::bash` +
//! `shell/executor.py::bash_executor` for the timeout bounds (1ms..=600000ms,
//! default 120000ms), 30000-character output truncation, and exit-code
//! reporting (`"{output}\nExit code: {exit_code}"` on non-zero), and on
//! `examples/stippi-code-assistant/crates/command_executor/src/default_executor.rs`
//! for the `tokio::process::Command` shape (login-shell resolution, combined
//! stdout/stderr capture).

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use tokio::process::Command;

use super::super::core::{Tool, ToolContext, ToolError, ToolSpec};

const DEFAULT_TIMEOUT_MS: u64 = 120_000;
const MAX_TIMEOUT_MS: u64 = 600_000;
const MAX_OUTPUT_CHARS: usize = 30_000;

pub struct ExecuteCommandTool;

#[derive(Debug, Deserialize)]
pub struct ExecuteCommandInput {
    pub command: String,
    pub timeout: Option<u64>,
    #[serde(default)]
    pub description: Option<String>,
}

#[async_trait]
impl Tool for ExecuteCommandTool {
    type Input = ExecuteCommandInput;
    type Output = String;

    fn spec(&self) -> ToolSpec {
        ToolSpec {
            name: "execute_command",
            description: "Execute a shell command and return its combined stdout/stderr output",
            parameters_schema: json!({
                "type": "object",
                "properties": {
                    "command": {"type": "string"},
                    "timeout": {"type": "integer", "description": "milliseconds, up to 600000"},
                    "description": {"type": "string"},
                },
                "required": ["command"],
            }),
        }
    }

    async fn execute(&self, ctx: &mut ToolContext, input: Self::Input) -> Result<Self::Output, ToolError> {
        let timeout_ms = input.timeout.unwrap_or(DEFAULT_TIMEOUT_MS);
        if timeout_ms > MAX_TIMEOUT_MS {
            return Ok("Error: Timeout cannot exceed 600000ms (10 minutes)".to_string());
        }

        ctx.path_validator.validate_command_paths(&input.command)?;

        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/bash".to_string());
        let mut cmd = Command::new(shell);
        cmd.args(["-c", &input.command]);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|e| ToolError::Execution(e.to_string()))?;

        let run = async {
            let output = child.wait_with_output().await?;
            Ok::<_, std::io::Error>(output)
        };

        tokio::select! {
            _ = ctx.cancel.cancelled() => {
                Ok("Error: Command cancelled".to_string())
            }
            result = tokio::time::timeout(Duration::from_millis(timeout_ms), run) => {
                match result {
                    Err(_elapsed) => Ok(format!("Error: Command timed out after {timeout_ms}ms")),
                    Ok(Err(e)) => Err(ToolError::Execution(e.to_string())),
                    Ok(Ok(output)) => {
                        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
                        combined.push_str(&String::from_utf8_lossy(&output.stderr));

                        if combined.len() > MAX_OUTPUT_CHARS {
                            combined.truncate(MAX_OUTPUT_CHARS);
                            combined.push_str("\n... (output truncated)");
                        }

                        let exit_code = output.status.code().unwrap_or(0);
                        if exit_code != 0 {
                            combined.push_str(&format!("\nExit code: {exit_code}"));
                        }
                        Ok(combined)
                    }
                }
            }
        }
    }

    fn render(&self, output: &Self::Output) -> String {
        output.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc::unbounded_channel;
    use tokio_util::sync::CancellationToken;

    use super::*;
    use crate::agent::sub_agent::SubAgentSupervisor;
    use crate::tools::path_validator::PathValidator;
    use crate::types::AllowedDirectory;

    fn ctx_for(dir: &std::path::Path) -> ToolContext {
        let validator = Arc::new(PathValidator::new(vec![AllowedDirectory::resolve(dir).unwrap()]));
        let (tx, _rx) = unbounded_channel();
        ToolContext {
            path_validator: validator,
            supervisor: Arc::new(SubAgentSupervisor::new()),
            sink: tx,
            cancel: CancellationToken::new(),
            call_id: "call_test".to_string(),
            parent_call_id: None,
        }
    }

    #[tokio::test]
    async fn runs_a_simple_command() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ctx_for(dir.path());
        let out = ExecuteCommandTool
            .execute(
                &mut ctx,
                ExecuteCommandInput { command: "echo hi".to_string(), timeout: None, description: None },
            )
            .await
            .unwrap();
        assert!(out.contains("hi"));
    }

    #[tokio::test]
    async fn reports_non_zero_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ctx_for(dir.path());
        let out = ExecuteCommandTool
            .execute(&mut ctx, ExecuteCommandInput { command: "exit 3".to_string(), timeout: None, description: None })
            .await
            .unwrap();
        assert!(out.contains("Exit code: 3"));
    }

    #[tokio::test]
    async fn rejects_timeout_over_max() {
        let dir = tempfile::tempdir().unwrap();
        let mut ctx = ctx_for(dir.path());
        let out = ExecuteCommandTool
            .execute(
                &mut ctx,
                ExecuteCommandInput { command: "echo hi".to_string(), timeout: Some(700_000), description: None },
            )
            .await
            .unwrap();
        assert!(out.starts_with("Error: Timeout cannot exceed"));
    }
}
