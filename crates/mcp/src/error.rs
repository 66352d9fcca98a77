use thiserror::Error;

#[derive(Debug, Error)]
pub enum McpError {
    #[error("Connection failed: {message}")]
    ConnectionFailed { message: String },

    #[error("Protocol error: {message}")]
    Protocol { message: String },

    #[error("JSON-RPC error {code}: {message}")]
    JsonRpc { code: i32, message: String },

    #[error("Server not found: {id}")]
    ServerNotFound { id: String },

    #[error("Invalid server id '{0}': only ASCII letters, digits and '-' are allowed")]
    InvalidServerId(String),

    #[error("Unsupported transport '{transport}': {detail}")]
    UnsupportedTransport { transport: String, detail: String },
}

pub type McpResult<T> = std::result::Result<T, McpError>;
