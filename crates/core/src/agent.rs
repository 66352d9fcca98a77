//! Agent state and result types.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::message::MessageToolCall;

/// Lifecycle state of an agent.
///
/// `Idle -> Running -> {Idle, Finished, Error}`. Only an idle agent may start a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AgentState {
    #[default]
    Idle,
    Running,
    Finished,
    Error,
}

impl AgentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Running => "RUNNING",
            Self::Finished => "FINISHED",
            Self::Error => "ERROR",
        }
    }
}

impl fmt::Display for AgentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of one step of a blocking run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentResult {
    pub reasoning: String,
    pub content: String,
}

impl AgentResult {
    pub fn new(reasoning: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            reasoning: reasoning.into(),
            content: content.into(),
        }
    }

    /// A result carrying only content.
    pub fn content(content: impl Into<String>) -> Self {
        Self::new(String::new(), content)
    }
}

/// One streaming increment. Text fields hold the prefix produced so far;
/// `tool_calls` is only populated once every call has been assembled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentResultStream {
    pub reasoning: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<MessageToolCall>>,
}

impl AgentResultStream {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Self::default()
        }
    }
}
