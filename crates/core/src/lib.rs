//! # clawflow Core
//!
//! Domain types, traits, and error definitions for the clawflow agent runtime.
//! Every other crate depends inward on this one.
//!
//! ## Design Philosophy
//!
//! The collaborators of the agent loop are defined here as traits:
//! - [`Provider`]: the chat contract an LLM backend satisfies
//! - [`Tool`]: a named, schema-described capability
//! - [`Memory`]: the bounded conversation buffer an agent owns
//!
//! Implementations live in their respective crates, so tests can swap in
//! scripted providers and in-process tools without touching the loop.

pub mod agent;
pub mod error;
pub mod memory;
pub mod message;
pub mod provider;
pub mod stream;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::{AgentResult, AgentResultStream, AgentState};
pub use error::{ProviderError, ToolError};
pub use memory::Memory;
pub use message::{Message, MessageToolCall, Role};
pub use provider::{
    Provider, ProviderRequest, ProviderResponse, StreamChunk, ToolCallAssembler, ToolCallDelta,
    ToolChoice, ToolDefinition,
};
pub use stream::{RunEvent, StepEvent};
pub use tool::{SharedToolRegistry, Tool, ToolCall, ToolRegistry, ToolResult};
