//! [`RemoteSession`] backed by an rmcp client, either over a child
//! process's stdio or over streamable HTTP at a URL.

use std::collections::HashMap;
use std::fmt::Display;
use std::future::Future;

use async_trait::async_trait;
use rmcp::{
    RoleClient,
    model::{CallToolRequestParam, RawContent},
    service::{RunningService, ServiceError, ServiceExt},
    transport::{ConfigureCommandExt, StreamableHttpClientTransport, TokioChildProcess},
};
use tokio::process::Command;
use tokio::sync::RwLock;
use tokio::time::{Duration, timeout};
use tracing::debug;

use crate::error::{McpError, McpResult};
use crate::session::{RemoteCallResult, RemoteContent, RemoteSession, RemoteToolSpec};

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
pub const CALL_TIMEOUT: Duration = Duration::from_secs(300);

type Service = RunningService<RoleClient, ()>;

fn map_service_error(e: ServiceError, context: &str) -> McpError {
    match e {
        ServiceError::McpError(data) => McpError::JsonRpc {
            code: data.code.0,
            message: data.message.to_string(),
        },
        other => McpError::Protocol {
            message: format!("{context}: {other}"),
        },
    }
}

pub struct McpSession {
    service: RwLock<Option<Service>>,
}

impl McpSession {
    /// Spawn `command` and complete the MCP handshake over its stdio.
    pub async fn spawn_stdio(
        command: &str,
        args: &[String],
        env: &HashMap<String, String>,
    ) -> McpResult<Self> {
        let transport = TokioChildProcess::new(Command::new(command).configure(|cmd| {
            cmd.args(args);
            for (key, value) in env {
                cmd.env(key, value);
            }
        }))
        .map_err(|e| McpError::ConnectionFailed {
            message: format!("failed to spawn '{command}': {e}"),
        })?;

        Self::handshake(().serve(transport)).await
    }

    /// Connect to a server listening at an `http(s)://` URL.
    pub async fn connect_url(url: &str) -> McpResult<Self> {
        let scheme = url.split_once("://").map(|(scheme, _)| scheme);
        if !matches!(scheme, Some("http" | "https")) {
            return Err(McpError::UnsupportedTransport {
                transport: scheme.unwrap_or("none").to_string(),
                detail: format!("'{url}' is not an http(s) URL"),
            });
        }
        let transport = StreamableHttpClientTransport::from_uri(url);
        Self::handshake(().serve(transport)).await
    }

    async fn handshake<E: Display>(
        serving: impl Future<Output = Result<Service, E>>,
    ) -> McpResult<Self> {
        let service = timeout(CONNECT_TIMEOUT, serving)
            .await
            .map_err(|_| McpError::ConnectionFailed {
                message: format!("handshake timed out after {CONNECT_TIMEOUT:?}"),
            })?
            .map_err(|e| McpError::ConnectionFailed {
                message: format!("handshake failed: {e}"),
            })?;

        if let Some(info) = service.peer_info() {
            debug!(
                server = %info.server_info.name,
                version = %info.server_info.version,
                "MCP handshake complete"
            );
        }

        Ok(Self {
            service: RwLock::new(Some(service)),
        })
    }

    fn closed() -> McpError {
        McpError::ConnectionFailed {
            message: "session closed".into(),
        }
    }
}

#[async_trait]
impl RemoteSession for McpSession {
    async fn list_tools(&self) -> McpResult<Vec<RemoteToolSpec>> {
        let guard = self.service.read().await;
        let service = guard.as_ref().ok_or_else(Self::closed)?;
        let listed = service
            .list_tools(Default::default())
            .await
            .map_err(|e| map_service_error(e, "failed to list tools"))?;

        Ok(listed
            .tools
            .into_iter()
            .map(|t| RemoteToolSpec {
                name: t.name.to_string(),
                description: t.description.map(|d| d.to_string()).unwrap_or_default(),
                input_schema: serde_json::Value::Object((*t.input_schema).clone()),
            })
            .collect())
    }

    async fn call_tool(&self, name: &str, args: serde_json::Value) -> McpResult<RemoteCallResult> {
        let guard = self.service.read().await;
        let service = guard.as_ref().ok_or_else(Self::closed)?;
        let result = timeout(
            CALL_TIMEOUT,
            service.call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: args.as_object().cloned(),
            }),
        )
        .await
        .map_err(|_| McpError::Protocol {
            message: format!("call to '{name}' timed out after {CALL_TIMEOUT:?}"),
        })?
        .map_err(|e| map_service_error(e, "tool call failed"))?;

        let content = result
            .content
            .into_iter()
            .map(|c| match &c.raw {
                RawContent::Text(t) => RemoteContent::Text(t.text.clone()),
                RawContent::Image(i) => RemoteContent::Image {
                    data: i.data.clone(),
                    mime_type: i.mime_type.clone(),
                },
                RawContent::Resource(_) => RemoteContent::Other("resource".into()),
                RawContent::Audio(_) => RemoteContent::Other("audio".into()),
                RawContent::ResourceLink(r) => RemoteContent::Other(r.uri.clone()),
            })
            .collect();

        Ok(RemoteCallResult {
            content,
            is_error: result.is_error.unwrap_or(false),
        })
    }

    async fn close(&self) -> McpResult<()> {
        if let Some(service) = self.service.write().await.take() {
            service.cancel().await.map_err(|e| McpError::Protocol {
                message: format!("failed to cancel session: {e}"),
            })?;
        }
        Ok(())
    }
}
