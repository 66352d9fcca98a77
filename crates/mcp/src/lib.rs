//! # clawflow MCP
//!
//! Tools hosted on remote capability servers, proxied into a local
//! [`ToolRegistry`](clawflow_core::tool::ToolRegistry).
//!
//! Each server is keyed by a validated [`ServerId`]; its tools appear in the
//! registry as `{server_id}_{tool}`. [`RemoteToolRegistry::refresh`] reports
//! capability drift so an agent can tell the model what changed.

pub mod error;
pub mod proxy;
pub mod registry;
pub mod server_id;
pub mod session;

#[cfg(feature = "mcp")]
pub mod rmcp_session;

pub use error::{McpError, McpResult};
pub use proxy::RemoteTool;
pub use registry::{RemoteToolRegistry, ToolDrift};
pub use server_id::ServerId;
pub use session::{RemoteCallResult, RemoteContent, RemoteSession, RemoteToolSpec};

#[cfg(feature = "mcp")]
pub use rmcp_session::McpSession;
