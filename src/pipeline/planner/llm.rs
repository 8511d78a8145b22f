use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use super::{Analysis, PlanningContext, StatementPlanner};
use crate::models::Intent;
use crate::pipeline::analyzer::{classification_prompt, parse_analysis};
use crate::pipeline::completion::{CompletionError, CompletionService, PromptMessage};
use crate::pipeline::generator::{
    bulk_prompt, chat_prompt, extract_bulk_statements, extract_statement, statement_prompt,
};

/// Planner backed by the remote completion service.
pub struct LlmPlanner {
    completion: Arc<dyn CompletionService>,
}

impl LlmPlanner {
    pub fn new(completion: Arc<dyn CompletionService>) -> Self {
        Self { completion }
    }

    async fn ask(&self, prompt: String, cancel: &CancellationToken) -> Result<String, CompletionError> {
        self.completion
            .complete(&[PromptMessage::system(prompt)], cancel)
            .await
    }
}

#[async_trait]
impl StatementPlanner for LlmPlanner {
    async fn classify(
        &self,
        ctx: PlanningContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<Analysis, CompletionError> {
        let raw = self.ask(classification_prompt(&ctx), cancel).await?;
        Ok(parse_analysis(&raw, ctx.message))
    }

    async fn generate(
        &self,
        ctx: PlanningContext<'_>,
        analysis: &Analysis,
        cancel: &CancellationToken,
    ) -> Result<String, CompletionError> {
        if analysis.intent == Intent::Chat {
            return Ok(String::new());
        }
        let raw = self.ask(statement_prompt(&ctx, analysis), cancel).await?;
        tracing::debug!(raw = %raw.chars().take(500).collect::<String>(), "Raw generation output");
        Ok(extract_statement(&raw))
    }

    async fn generate_bulk(
        &self,
        ctx: PlanningContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, CompletionError> {
        let raw = self.ask(bulk_prompt(&ctx), cancel).await?;
        Ok(extract_bulk_statements(&raw))
    }

    async fn chat_reply(
        &self,
        ctx: PlanningContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<String, CompletionError> {
        let raw = self.ask(chat_prompt(ctx.message), cancel).await?;
        Ok(raw.trim().to_string())
    }
}
