//! A local [`Tool`] that forwards calls to a remote session.

use std::sync::{Arc, Weak};

use async_trait::async_trait;
use clawflow_core::error::ToolError;
use clawflow_core::tool::{Tool, ToolResult};
use tracing::debug;

use crate::server_id::ServerId;
use crate::session::{RemoteContent, RemoteSession, RemoteToolSpec};

pub const NO_OUTPUT: &str = "No output returned.";

/// Proxy for one tool hosted on a remote server.
///
/// Holds only a weak reference to the session: the registry owns the session
/// and decides when it goes away.
pub struct RemoteTool {
    server_id: ServerId,
    remote_name: String,
    qualified_name: String,
    description: String,
    input_schema: serde_json::Value,
    session: Weak<dyn RemoteSession>,
}

impl RemoteTool {
    pub fn new(server_id: &ServerId, spec: &RemoteToolSpec, session: &Arc<dyn RemoteSession>) -> Self {
        Self {
            server_id: server_id.clone(),
            remote_name: spec.name.clone(),
            qualified_name: server_id.qualify(&spec.name),
            description: format!("[{server_id}] {}", spec.description),
            input_schema: spec.input_schema.clone(),
            session: Arc::downgrade(session),
        }
    }

    pub fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    /// The tool's name on its own server.
    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }
}

#[async_trait]
impl Tool for RemoteTool {
    fn name(&self) -> &str {
        &self.qualified_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> serde_json::Value {
        self.input_schema.clone()
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let session = self
            .session
            .upgrade()
            .ok_or_else(|| ToolError::SessionClosed(self.server_id.to_string()))?;

        debug!(server_id = %self.server_id, tool = %self.remote_name, "Forwarding remote tool call");
        let result = session
            .call_tool(&self.remote_name, arguments)
            .await
            .map_err(|e| ToolError::ExecutionFailed {
                tool_name: self.qualified_name.clone(),
                reason: e.to_string(),
            })?;

        let mut texts = Vec::new();
        let mut attachment = None;
        for item in result.content {
            match item {
                RemoteContent::Text(text) => texts.push(text),
                RemoteContent::Image { data, .. } => {
                    attachment.get_or_insert(data);
                }
                RemoteContent::Other(_) => {}
            }
        }
        let output = texts.join(", ");
        let output = if output.is_empty() { NO_OUTPUT.to_string() } else { output };

        Ok(ToolResult {
            success: !result.is_error,
            attachment,
            ..ToolResult::ok(output)
        })
    }
}
