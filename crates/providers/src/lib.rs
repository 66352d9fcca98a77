//! LLM provider implementations for clawflow.
//!
//! Every provider implements `clawflow_core::Provider`. The configured one
//! is an [`OpenAiCompatProvider`] wrapped in a [`RetryProvider`].

pub mod openai_compat;
pub mod retry;
pub mod router;

pub use openai_compat::OpenAiCompatProvider;
pub use retry::RetryProvider;
pub use router::{build_from_config, provider_name_for};
