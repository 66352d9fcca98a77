//! Conversation memory implementations for clawflow.

pub mod bounded;

pub use bounded::{BoundedMemory, DEFAULT_MAX_MESSAGES};
