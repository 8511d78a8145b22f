use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::{clean_reasoning, CompletionError, CompletionService, PromptMessage, PromptRole};
use crate::config::CompletionConfig;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for any OpenAI-compatible `/chat/completions` endpoint (Groq by default).
///
/// No request timeout is set on the HTTP client; [`super::ResilientCompletion`]
/// bounds each attempt instead.
pub struct OpenAiCompatibleClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
    client: reqwest::Client,
}

impl OpenAiCompatibleClient {
    pub fn new(config: &CompletionConfig) -> Result<Self, CompletionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| CompletionError::Client(e.to_string()))?;
        Ok(Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            client,
        })
    }

    pub fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(&self, messages: &[PromptMessage]) -> Result<String, CompletionError> {
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: normalize_roles(messages),
            temperature: self.temperature,
        };

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| transport_error(&e, &self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| {
                if e.is_decode() {
                    CompletionError::ResponseParsing(e.to_string())
                } else {
                    transport_error(&e, &self.base_url)
                }
            })?;

        let content = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or(CompletionError::EmptyResponse)?;

        let cleaned = clean_reasoning(&content);
        if cleaned.is_empty() {
            return Err(CompletionError::EmptyResponse);
        }
        Ok(cleaned)
    }
}

/// Timeouts and dropped connections are transient; anything else from the
/// HTTP stack is a client fault.
fn transport_error(err: &reqwest::Error, base_url: &str) -> CompletionError {
    if err.is_timeout() {
        CompletionError::Timeout(CONNECT_TIMEOUT)
    } else if err.is_connect() || err.is_request() || err.is_body() {
        tracing::debug!(error = %err, "Completion transport failure");
        CompletionError::Connection(base_url.to_string())
    } else {
        CompletionError::Client(err.to_string())
    }
}

/// Some hosted models reject a conversation that ends on a system message;
/// the trailing system prompt is resent as a user message.
fn normalize_roles(messages: &[PromptMessage]) -> Vec<PromptMessage> {
    let mut out = messages.to_vec();
    if let Some(last) = out.last_mut() {
        if last.role == PromptRole::System {
            last.role = PromptRole::User;
        }
    }
    out
}

#[derive(Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<PromptMessage>,
    temperature: f32,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[async_trait]
impl CompletionService for OpenAiCompatibleClient {
    async fn complete(
        &self,
        messages: &[PromptMessage],
        cancel: &CancellationToken,
    ) -> Result<String, CompletionError> {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(CompletionError::Cancelled),
            result = self.send(messages) => result,
        }
    }
}
