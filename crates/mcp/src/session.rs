//! The session contract a remote capability server satisfies.

use async_trait::async_trait;

use crate::error::McpResult;

/// One tool as advertised by a remote server.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RemoteContent {
    Text(String),
    Image { data: String, mime_type: String },
    Other(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RemoteCallResult {
    pub content: Vec<RemoteContent>,
    pub is_error: bool,
}

impl RemoteCallResult {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![RemoteContent::Text(text.into())],
            is_error: false,
        }
    }
}

#[async_trait]
pub trait RemoteSession: Send + Sync {
    async fn list_tools(&self) -> McpResult<Vec<RemoteToolSpec>>;

    /// Call `name` (the server's own, un-namespaced tool name).
    async fn call_tool(&self, name: &str, args: serde_json::Value) -> McpResult<RemoteCallResult>;

    async fn close(&self) -> McpResult<()>;
}
