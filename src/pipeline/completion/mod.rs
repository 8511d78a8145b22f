//! Remote language-completion capability.
//!
//! `complete(messages) -> text` against an OpenAI-compatible endpoint,
//! wrapped with a per-attempt timeout, bounded retry and request-scoped
//! cancellation.

mod clean;
mod openai;
mod resilient;

pub use clean::clean_reasoning;
pub use openai::OpenAiCompatibleClient;
pub use resilient::{ResilientCompletion, RetryPolicy};

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

/// One message of a completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: PromptRole::User,
            content: content.into(),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum CompletionError {
    #[error("Completion service timed out after {0:?}")]
    Timeout(Duration),

    #[error("Cannot reach completion service at {0}")]
    Connection(String),

    #[error("Completion service returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("Malformed completion response: {0}")]
    ResponseParsing(String),

    #[error("Completion service returned no content")]
    EmptyResponse,

    #[error("HTTP client error: {0}")]
    Client(String),

    #[error("Completion request cancelled")]
    Cancelled,
}

impl CompletionError {
    /// Whether another attempt may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            CompletionError::Timeout(_)
            | CompletionError::Connection(_)
            | CompletionError::EmptyResponse => true,
            CompletionError::Http { status, .. } => *status == 429 || *status >= 500,
            CompletionError::ResponseParsing(_)
            | CompletionError::Client(_)
            | CompletionError::Cancelled => false,
        }
    }

    /// Stable code surfaced to API clients.
    pub fn code(&self) -> &'static str {
        match self {
            CompletionError::Timeout(_) => "COMPLETION_TIMEOUT",
            CompletionError::Cancelled => "CANCELLED",
            _ => "COMPLETION_UNAVAILABLE",
        }
    }
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Produce the assistant reply for `messages`.
    ///
    /// Implementations must return [`CompletionError::Cancelled`] promptly
    /// once `cancel` fires.
    async fn complete(
        &self,
        messages: &[PromptMessage],
        cancel: &CancellationToken,
    ) -> Result<String, CompletionError>;
}

#[cfg(test)]
pub(crate) mod mock {
    //! Scripted completion service for tests.

    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    pub struct ScriptedCompletion {
        replies: Mutex<VecDeque<Result<String, CompletionError>>>,
        pub prompts: Mutex<Vec<Vec<PromptMessage>>>,
    }

    impl ScriptedCompletion {
        pub fn new(replies: Vec<Result<String, CompletionError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }

        pub fn replying(texts: &[&str]) -> Self {
            Self::new(texts.iter().map(|t| Ok(t.to_string())).collect())
        }

        pub fn calls(&self) -> usize {
            self.prompts.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedCompletion {
        async fn complete(
            &self,
            messages: &[PromptMessage],
            cancel: &CancellationToken,
        ) -> Result<String, CompletionError> {
            if cancel.is_cancelled() {
                return Err(CompletionError::Cancelled);
            }
            self.prompts.lock().unwrap().push(messages.to_vec());
            self.replies
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Err(CompletionError::EmptyResponse))
        }
    }

    /// Never answers; only returns once cancelled.
    pub struct HangingCompletion;

    #[async_trait]
    impl CompletionService for HangingCompletion {
        async fn complete(
            &self,
            _messages: &[PromptMessage],
            cancel: &CancellationToken,
        ) -> Result<String, CompletionError> {
            cancel.cancelled().await;
            Err(CompletionError::Cancelled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_classification() {
        assert!(CompletionError::Timeout(Duration::from_secs(1)).is_retryable());
        assert!(CompletionError::Http { status: 503, body: String::new() }.is_retryable());
        assert!(CompletionError::Http { status: 429, body: String::new() }.is_retryable());
        assert!(!CompletionError::Http { status: 401, body: String::new() }.is_retryable());
        assert!(!CompletionError::Cancelled.is_retryable());
    }

    #[test]
    fn timeout_has_distinct_code() {
        assert_eq!(
            CompletionError::Timeout(Duration::from_secs(1)).code(),
            "COMPLETION_TIMEOUT"
        );
        assert_eq!(
            CompletionError::Connection("x".into()).code(),
            "COMPLETION_UNAVAILABLE"
        );
    }

    #[test]
    fn prompt_roles_serialize_lowercase() {
        let json = serde_json::to_value(PromptMessage::system("hi")).unwrap();
        assert_eq!(json["role"], "system");
    }
}
