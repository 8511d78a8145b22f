//! Intent classification and statement generation.
//!
//! [`StatementPlanner`] is the seam between the orchestrator and whatever
//! decides *what* to run: [`LlmPlanner`] asks the completion service,
//! [`RuleBasedPlanner`] uses keyword rules and needs no network.

mod llm;
mod rules;

pub use llm::LlmPlanner;
pub use rules::RuleBasedPlanner;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use super::completion::CompletionError;
use crate::db::PatientRef;
use crate::models::{Intent, Turn};

/// Read-only inputs shared by every planning step of one request.
#[derive(Debug, Clone, Copy)]
pub struct PlanningContext<'a> {
    pub message: &'a str,
    pub history: &'a [Turn],
    pub patients: &'a [PatientRef],
}

/// What the analyzer inferred about the request's target.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedContext {
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub inferred_from_history: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    pub intent: Intent,
    pub confidence: Option<f64>,
    pub resolved_context: ResolvedContext,
    pub reasoning: Option<String>,
    pub needs_clarification: bool,
    pub clarification_question: Option<String>,
}

impl Analysis {
    pub fn new(intent: Intent) -> Self {
        Self {
            intent,
            confidence: None,
            resolved_context: ResolvedContext::default(),
            reasoning: None,
            needs_clarification: false,
            clarification_question: None,
        }
    }
}

#[async_trait]
pub trait StatementPlanner: Send + Sync {
    /// Classify the message. Parse problems fall back locally; only
    /// completion failures are returned as errors.
    async fn classify(
        &self,
        ctx: PlanningContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<Analysis, CompletionError>;

    /// One statement for a QUERY or UPDATE request. May be empty.
    async fn generate(
        &self,
        ctx: PlanningContext<'_>,
        analysis: &Analysis,
        cancel: &CancellationToken,
    ) -> Result<String, CompletionError>;

    /// INSERT statements for a BULK_INSERT request, in execution order.
    async fn generate_bulk(
        &self,
        ctx: PlanningContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<Vec<String>, CompletionError>;

    /// Conversational answer for CHAT requests.
    async fn chat_reply(
        &self,
        ctx: PlanningContext<'_>,
        cancel: &CancellationToken,
    ) -> Result<String, CompletionError>;
}
