use clawflow_core::AgentState;
use clawflow_core::error::ProviderError;
use clawflow_mcp::McpError;
use thiserror::Error;

/// Errors that end an agent run.
///
/// Tool failures never show up here: they are recorded as observations.
#[derive(Debug, Error)]
pub enum AgentError {
    /// `run` was called while the agent was not idle. Nothing was mutated.
    #[error("Cannot run agent from state: {state}")]
    NotIdle { state: AgentState },

    #[error("Maximum token limit reached: {0}")]
    TokenLimit(String),

    #[error("Provider error: {0}")]
    Provider(ProviderError),

    #[error("Run cancelled")]
    Cancelled,

    #[error("Remote tool error: {0}")]
    Remote(String),
}

impl From<ProviderError> for AgentError {
    fn from(e: ProviderError) -> Self {
        match e {
            ProviderError::TokenLimitExceeded(detail) => Self::TokenLimit(detail),
            other => Self::Provider(other),
        }
    }
}

impl From<McpError> for AgentError {
    fn from(e: McpError) -> Self {
        Self::Remote(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_limit_is_lifted_out_of_provider_errors() {
        let err: AgentError = ProviderError::TokenLimitExceeded("128k".into()).into();
        assert!(matches!(err, AgentError::TokenLimit(ref d) if d == "128k"));

        let err: AgentError = ProviderError::Timeout("30s".into()).into();
        assert!(matches!(err, AgentError::Provider(ProviderError::Timeout(_))));
    }

    #[test]
    fn not_idle_names_the_state() {
        let err = AgentError::NotIdle { state: AgentState::Finished };
        assert_eq!(err.to_string(), "Cannot run agent from state: FINISHED");
    }
}
