//! Terminate tool: the model calls it to end the interaction.
//!
//! Agents treat it as a special tool and move to FINISHED once the step
//! that called it completes.

use async_trait::async_trait;
use clawflow_core::error::ToolError;
use clawflow_core::tool::{Tool, ToolResult};

pub const TERMINATE_TOOL_NAME: &str = "terminate";

#[derive(Debug, Default)]
pub struct TerminateTool;

#[async_trait]
impl Tool for TerminateTool {
    fn name(&self) -> &str {
        TERMINATE_TOOL_NAME
    }

    fn description(&self) -> &str {
        "Terminate the interaction when the request is met OR if the assistant cannot proceed further with the task. \
         When you have finished all the tasks, call this tool to end the work."
    }

    fn parameters_schema(&self) -> serde_json::Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "status": {
                    "type": "string",
                    "description": "The finish status of the interaction.",
                    "enum": ["success", "failure"]
                }
            },
            "required": ["status"]
        })
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let status = arguments["status"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'status' argument".into()))?;
        if status != "success" && status != "failure" {
            return Err(ToolError::InvalidArguments(format!(
                "status must be 'success' or 'failure', got '{status}'"
            )));
        }
        Ok(ToolResult::ok(format!(
            "The interaction has been completed with status: {status}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reports_status() {
        let result = TerminateTool
            .execute(serde_json::json!({ "status": "success" }))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(
            result.output,
            "The interaction has been completed with status: success"
        );
    }

    #[tokio::test]
    async fn rejects_unknown_status() {
        let err = TerminateTool
            .execute(serde_json::json!({ "status": "maybe" }))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidArguments(_)));
    }
}
