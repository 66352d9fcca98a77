//! Tool dispatch: turns one model tool call into an observation string.
//!
//! Dispatch never fails. Unknown tools, malformed arguments and tool errors
//! all come back as observation text the model can react to.

use clawflow_core::message::MessageToolCall;
use clawflow_core::tool::SharedToolRegistry;
use tracing::{debug, error, info, warn};

pub const NO_TOOL_CALLS: &str = "No tool calls to execute";

/// What one tool call produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub observation: String,
    pub attachment: Option<String>,
    /// A special tool ran successfully; the agent finishes after this step.
    pub finishes: bool,
}

impl ToolOutcome {
    fn recovered(observation: String) -> Self {
        Self {
            observation,
            attachment: None,
            finishes: false,
        }
    }
}

pub fn is_special_tool(name: &str, special_tools: &[String]) -> bool {
    special_tools.iter().any(|s| s.eq_ignore_ascii_case(name))
}

/// Resolve, parse and execute a single call.
pub async fn execute_tool(
    tools: &SharedToolRegistry,
    call: &MessageToolCall,
    special_tools: &[String],
) -> ToolOutcome {
    let name = call.name.as_str();
    if name.is_empty() {
        warn!(call_id = %call.id, "Tool call without a name");
        return ToolOutcome::recovered("Error: Invalid command format".into());
    }

    // Release the registry before running the tool so refreshes are not blocked.
    let Some(tool) = tools.read().await.get(name) else {
        warn!(tool = %name, "Unknown tool requested");
        return ToolOutcome::recovered(format!("Error: Unknown tool '{name}'"));
    };

    let raw = if call.arguments.trim().is_empty() {
        "{}"
    } else {
        call.arguments.as_str()
    };
    let arguments: serde_json::Value = match serde_json::from_str(raw) {
        Ok(value) => value,
        Err(e) => {
            warn!(tool = %name, error = %e, arguments = %call.arguments, "Malformed tool arguments");
            return ToolOutcome::recovered(format!(
                "Error: Error parsing arguments for {name}: Invalid JSON format"
            ));
        }
    };

    info!(tool = %name, "Activating tool");
    debug!(tool = %name, %arguments, "Tool arguments");
    match tool.execute(arguments).await {
        Ok(result) => {
            if !result.success {
                warn!(tool = %name, "Tool reported failure");
            }
            let observation = if result.output.is_empty() {
                format!("Cmd `{name}` completed with no output")
            } else {
                format!("Observed output of cmd `{name}` executed:\n{}", result.output)
            };
            let finishes = is_special_tool(name, special_tools);
            if finishes {
                info!(tool = %name, "Special tool has completed the task");
            }
            ToolOutcome {
                observation,
                attachment: result.attachment,
                finishes,
            }
        }
        Err(e) => {
            error!(tool = %name, error = %e, "Tool execution failed");
            ToolOutcome::recovered(format!("Error: ⚠️ Tool '{name}' encountered a problem: {e}"))
        }
    }
}

/// Cut `text` to at most `max` characters.
pub fn truncate_observation(text: String, max: Option<usize>) -> String {
    match max {
        Some(max) if text.chars().count() > max => text.chars().take(max).collect(),
        _ => text,
    }
}
