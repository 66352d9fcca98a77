use clawflow_agent::AgentError;
use clawflow_tools::PlanError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    #[error("Planning flow has no agents")]
    NoAgents,

    #[error("Plan creation failed: {0}")]
    PlanCreation(String),

    #[error("Agent error: {0}")]
    Agent(#[from] AgentError),

    #[error("Plan error: {0}")]
    Plan(#[from] PlanError),
}
