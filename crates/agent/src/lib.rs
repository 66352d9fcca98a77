//! The clawflow agent: a bounded ReAct loop over a tool-calling model.
//!
//! Each step asks the model what to do (think) and, when it requests tools,
//! runs them in order and records their observations (act). The loop ends
//! when the step budget is spent, a special tool such as `terminate` is
//! called, the run is cancelled, or a step fails.
//!
//! Runs come in two shapes:
//! - [`Agent::run`] blocks and returns one [`AgentResult`](clawflow_core::AgentResult) per step
//! - [`Agent::run_stream`] returns a [`RunStream`] of nested phase channels
//!
//! Tool errors never end a run; they become observations the model can
//! react to. See [`dispatch`] for the exact texts.

pub mod agent;
pub mod builder;
mod chat;
pub mod dispatch;
pub mod error;
pub mod prompts;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers;

pub use agent::{Agent, AgentStrategy, REMOTE_SHUTDOWN_NOTICE, RunStream, SharedAgent};
pub use builder::AgentBuilder;
pub use dispatch::{NO_TOOL_CALLS, ToolOutcome};
pub use error::AgentError;
