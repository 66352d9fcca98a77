//! Bash tool: run a command line and report what it printed.
//!
//! A command that outlives the timeout is killed and reported as
//! [`ToolError::Timeout`].

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use clawflow_core::error::ToolError;
use clawflow_core::tool::{Tool, ToolResult};
use tokio::process::Command;
use tracing::{debug, warn};

pub const BASH_TOOL_NAME: &str = "bash";
pub const DEFAULT_BASH_TIMEOUT: Duration = Duration::from_secs(120);

pub struct BashTool {
    timeout: Duration,
}

impl BashTool {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_BASH_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new()
    }
}

fn render_output(exit_code: Option<i32>, stdout: &str, stderr: &str) -> String {
    let text = match exit_code {
        Some(0) if stderr.is_empty() => stdout.to_string(),
        Some(0) => format!("{stdout}\n[stderr]: {stderr}"),
        code => format!("[exit code: {}]\n{stdout}\n{stderr}", code.unwrap_or(-1)),
    };
    text.trim().to_string()
}

#[async_trait]
impl Tool for BashTool {
    fn name(&self) -> &str {
        BASH_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Execute a bash command in the terminal and return its stdout and stderr. \
         Commands that may run indefinitely should be started in the background \
         with output redirected to a file, e.g. `python3 app.py > server.log 2>&1 &`."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The bash command to execute."
                }
            },
            "required": ["command"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let command = arguments["command"]
            .as_str()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        debug!(command = %command, "Executing bash command");
        let child = Command::new("bash")
            .args(["-c", command])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: BASH_TOOL_NAME.into(),
                reason: e.to_string(),
            })?;

        // Dropping the wait future drops the child, which kills it.
        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(output) => output.map_err(|e| ToolError::ExecutionFailed {
                tool_name: BASH_TOOL_NAME.into(),
                reason: e.to_string(),
            })?,
            Err(_) => {
                warn!(command = %command, timeout = ?self.timeout, "Bash command timed out, killed");
                return Err(ToolError::Timeout {
                    tool_name: BASH_TOOL_NAME.into(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let success = output.status.success();
        if !success {
            warn!(command = %command, exit_code = ?output.status.code(), "Bash command failed");
        }
        let text = render_output(output.status.code(), &stdout, &stderr);
        Ok(if success {
            ToolResult::ok(text)
        } else {
            ToolResult::failed(text)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn output_rendering() {
        assert_eq!(render_output(Some(0), "hi\n", ""), "hi");
        assert_eq!(render_output(Some(0), "hi", "careful"), "hi\n[stderr]: careful");
        assert_eq!(render_output(Some(2), "", "no such file"), "[exit code: 2]\n\nno such file");
        assert_eq!(render_output(None, "", ""), "[exit code: -1]");
    }

    #[tokio::test]
    async fn echo_succeeds() {
        let result = BashTool::new()
            .execute(serde_json::json!({"command": "echo hello"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hello");
    }

    #[tokio::test]
    async fn stderr_and_exit_code_are_reported() {
        let result = BashTool::new()
            .execute(serde_json::json!({"command": "echo out; echo oops >&2; exit 3"}))
            .await
            .unwrap();
        assert!(!result.success);
        assert_eq!(result.output, "[exit code: 3]\nout\n\noops");
    }

    #[tokio::test]
    async fn slow_command_is_killed_at_timeout() {
        let tool = BashTool::new().with_timeout(Duration::from_millis(200));
        let started = Instant::now();
        let err = tool
            .execute(serde_json::json!({"command": "sleep 30"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::Timeout { ref tool_name, .. } if tool_name == "bash"));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn missing_command_is_invalid() {
        let err = BashTool::new()
            .execute(serde_json::json!({"command": "  "}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
