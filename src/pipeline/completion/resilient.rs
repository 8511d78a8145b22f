use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{CompletionError, CompletionService, PromptMessage};
use crate::config::CompletionConfig;

/// Timeout and retry bounds for one completion call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempt_timeout: Duration,
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl From<&CompletionConfig> for RetryPolicy {
    fn from(config: &CompletionConfig) -> Self {
        Self {
            attempt_timeout: config.timeout,
            max_retries: config.max_retries,
            initial_backoff: config.initial_backoff,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (0-based), doubling each time.
    pub fn backoff(&self, retry: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(retry))
    }
}

/// Wraps a completion service with a per-attempt timeout, bounded
/// exponential-backoff retry and cancellation checks between attempts.
pub struct ResilientCompletion {
    inner: Arc<dyn CompletionService>,
    policy: RetryPolicy,
}

impl ResilientCompletion {
    pub fn new(inner: Arc<dyn CompletionService>, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    async fn attempt(
        &self,
        messages: &[PromptMessage],
        cancel: &CancellationToken,
    ) -> Result<String, CompletionError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CompletionError::Cancelled),
            outcome = tokio::time::timeout(
                self.policy.attempt_timeout,
                self.inner.complete(messages, cancel),
            ) => outcome.unwrap_or(Err(CompletionError::Timeout(self.policy.attempt_timeout))),
        }
    }
}

#[async_trait]
impl CompletionService for ResilientCompletion {
    async fn complete(
        &self,
        messages: &[PromptMessage],
        cancel: &CancellationToken,
    ) -> Result<String, CompletionError> {
        let mut retry = 0;
        loop {
            if cancel.is_cancelled() {
                return Err(CompletionError::Cancelled);
            }

            match self.attempt(messages, cancel).await {
                Ok(text) => return Ok(text),
                Err(err) if err.is_retryable() && retry < self.policy.max_retries => {
                    let delay = self.policy.backoff(retry);
                    tracing::warn!(
                        attempt = retry + 1,
                        error = %err,
                        delay_ms = delay.as_millis() as u64,
                        "Completion attempt failed, retrying"
                    );
                    tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(CompletionError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                    retry += 1;
                }
                Err(err) => {
                    tracing::error!(attempts = retry + 1, error = %err, "Completion failed");
                    return Err(err);
                }
            }
        }
    }
}
