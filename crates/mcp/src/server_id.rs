//! Validated server ids and the tool-name namespacing built on them.

use std::fmt;

use crate::error::{McpError, McpResult};

/// Separator between the server id and the original tool name.
pub const NAMESPACE_SEPARATOR: char = '_';

/// A caller-chosen server id, restricted to `[A-Za-z0-9-]+`.
///
/// The restriction keeps `{id}_{tool}` unambiguous: an id can never contain
/// the separator, so the prefix of a qualified name always identifies its server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServerId(String);

impl ServerId {
    pub fn parse(id: impl Into<String>) -> McpResult<Self> {
        let id = id.into();
        let valid = !id.is_empty() && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-');
        if valid { Ok(Self(id)) } else { Err(McpError::InvalidServerId(id)) }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The registry name for `tool` hosted on this server.
    pub fn qualify(&self, tool: &str) -> String {
        format!("{}{NAMESPACE_SEPARATOR}{tool}", self.0)
    }

    /// Whether `qualified` names a tool of this server.
    pub fn owns(&self, qualified: &str) -> bool {
        qualified
            .strip_prefix(self.0.as_str())
            .is_some_and(|rest| rest.starts_with(NAMESPACE_SEPARATOR))
    }
}

impl fmt::Display for ServerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
