//! Builds the configured provider.

use std::sync::Arc;
use std::time::Duration;

use clawflow_config::ProviderConfig;
use clawflow_core::provider::Provider;
use tracing::{info, warn};

use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::RetryProvider;

/// Well-known endpoints, matched by base URL.
const KNOWN_ENDPOINTS: &[(&str, &str)] = &[
    ("openrouter.ai", "openrouter"),
    ("api.openai.com", "openai"),
    ("api.deepseek.com", "deepseek"),
    ("api.groq.com", "groq"),
    ("api.together.xyz", "together"),
    ("localhost:11434", "ollama"),
    ("localhost:8000", "vllm"),
    ("localhost:8080", "llamacpp"),
];

/// A short provider name for logs, derived from the endpoint.
pub fn provider_name_for(base_url: &str) -> &'static str {
    KNOWN_ENDPOINTS
        .iter()
        .find(|(host, _)| base_url.contains(host))
        .map(|(_, name)| *name)
        .unwrap_or("openai-compatible")
}

fn is_local(base_url: &str) -> bool {
    base_url.contains("localhost") || base_url.contains("127.0.0.1")
}

/// The OpenAI-compatible provider for `config`, wrapped in retries.
pub fn build_from_config(config: &ProviderConfig) -> Arc<dyn Provider> {
    let name = provider_name_for(&config.base_url);
    let api_key = config.api_key.clone().unwrap_or_default();
    if api_key.is_empty() && !is_local(&config.base_url) {
        warn!(provider = name, base_url = %config.base_url, "No API key configured");
    }

    let inner = OpenAiCompatProvider::with_timeout(
        name,
        &config.base_url,
        api_key,
        Duration::from_secs(config.timeout_secs),
    );
    info!(
        provider = name,
        model = %config.model,
        max_retries = config.max_retries,
        "Provider configured"
    );

    Arc::new(
        RetryProvider::new(Arc::new(inner))
            .with_max_retries(config.max_retries)
            .with_delay(Duration::from_millis(config.retry_delay_ms)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_from_endpoints() {
        assert_eq!(provider_name_for("https://api.openai.com/v1"), "openai");
        assert_eq!(provider_name_for("http://localhost:11434/v1"), "ollama");
        assert_eq!(provider_name_for("https://llm.internal/v1"), "openai-compatible");
    }

    #[test]
    fn build_from_default_config() {
        let provider = build_from_config(&ProviderConfig::default());
        assert_eq!(provider.name(), "openai");
    }
}
