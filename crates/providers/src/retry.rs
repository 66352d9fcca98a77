//! Provider retry: re-sends a request after transient failures.
//!
//! Only errors where [`ProviderError::is_retryable`] holds are retried.
//! Everything else, the token limit included, goes straight back to the
//! caller.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use clawflow_core::error::ProviderError;
use clawflow_core::provider::*;
use tokio::sync::mpsc;
use tracing::{info, warn};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(500);

/// Wraps a provider and retries its retryable failures with a fixed delay.
pub struct RetryProvider {
    inner: Arc<dyn Provider>,
    max_retries: u32,
    delay: Duration,
}

impl RetryProvider {
    pub fn new(inner: Arc<dyn Provider>) -> Self {
        Self {
            inner,
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Should attempt `attempt` (0-based) be followed by another one?
    async fn backoff(&self, attempt: u32, error: &ProviderError, op: &str) -> bool {
        if !error.is_retryable() || attempt >= self.max_retries {
            return false;
        }
        warn!(
            provider = %self.inner.name(),
            op,
            attempt = attempt + 1,
            max_retries = self.max_retries,
            error = %error,
            "Retrying after transient provider failure"
        );
        tokio::time::sleep(self.delay).await;
        true
    }
}

#[async_trait]
impl Provider for RetryProvider {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn complete(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<ProviderResponse, ProviderError> {
        let mut attempt = 0;
        loop {
            match self.inner.complete(request.clone()).await {
                Ok(response) => {
                    if attempt > 0 {
                        info!(provider = %self.inner.name(), attempts = attempt + 1, "Provider recovered");
                    }
                    return Ok(response);
                }
                Err(e) => {
                    if !self.backoff(attempt, &e, "complete").await {
                        return Err(e);
                    }
                    attempt += 1;
                }
            }
        }
    }

    /// Retries opening the stream; failures after the first chunk are the
    /// consumer's to handle.
    async fn stream(
        &self,
        request: ProviderRequest,
    ) -> std::result::Result<mpsc::Receiver<std::result::Result<StreamChunk, ProviderError>>, ProviderError>
    {
        let mut attempt = 0;
        loop {
            match self.inner.stream(request.clone()).await {
                Ok(rx) => return Ok(rx),
                Err(e) => {
                    if !self.backoff(attempt, &e, "stream").await {
                        return Err(e);
                    }
                    attempt += 1;
                }
            }
        }
    }
}
