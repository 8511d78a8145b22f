//! Request-scoped workflow state and the stages it moves through.

use thiserror::Error;

use super::bulk::BulkOutcome;
use super::completion::CompletionError;
use super::executor::{ExecutionError, ExecutionOutcome};
use super::planner::{Analysis, PlanningContext};
use super::validator::Rejection;
use crate::db::PatientRef;
use crate::models::{EntityTable, Turn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Analyze,
    Clarify,
    Chat,
    BulkInsert,
    GenerateSql,
    Validate,
    Reject,
    Execute,
    Notify,
    Respond,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Analyze => "analyze",
            Stage::Clarify => "clarify",
            Stage::Chat => "chat",
            Stage::BulkInsert => "bulk_insert",
            Stage::GenerateSql => "generate_sql",
            Stage::Validate => "validate",
            Stage::Reject => "reject",
            Stage::Execute => "execute",
            Stage::Notify => "notify",
            Stage::Respond => "respond",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal failure of a workflow pass. Display text is user-facing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkflowError {
    #[error("{0}")]
    Rejected(#[from] Rejection),

    #[error("{0}")]
    Execution(#[from] ExecutionError),

    #[error("{0}")]
    BulkInsert(String),

    #[error("{}", completion_message(.0))]
    Completion(CompletionError),

    #[error("The request was cancelled before it completed.")]
    Cancelled,
}

fn completion_message(err: &CompletionError) -> &'static str {
    match err {
        CompletionError::Timeout(_) => {
            "The language service took too long to respond. Please try again."
        }
        _ => "The language service is unavailable right now. Please try again in a moment.",
    }
}

impl From<CompletionError> for WorkflowError {
    fn from(err: CompletionError) -> Self {
        match err {
            CompletionError::Cancelled => WorkflowError::Cancelled,
            other => WorkflowError::Completion(other),
        }
    }
}

impl WorkflowError {
    pub fn code(&self) -> &'static str {
        match self {
            WorkflowError::Rejected(r) => r.code(),
            WorkflowError::Execution(e) => e.code(),
            WorkflowError::BulkInsert(_) => "BULK_INSERT_FAILED",
            WorkflowError::Completion(e) => e.code(),
            WorkflowError::Cancelled => "CANCELLED",
        }
    }

    /// Whether resubmitting the same message may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowError::Completion(_) | WorkflowError::Cancelled)
    }

    /// The pass never finished, so the exchange is not recorded in history.
    pub fn interrupted(&self) -> bool {
        matches!(self, WorkflowError::Completion(_) | WorkflowError::Cancelled)
    }
}

/// Everything one request accumulates. History is a read-only snapshot.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    pub message: String,
    pub history: Vec<Turn>,
    pub analysis: Option<Analysis>,
    pub patients: Vec<PatientRef>,
    pub statement: Option<String>,
    pub outcome: Option<ExecutionOutcome>,
    pub bulk: Option<BulkOutcome>,
    pub chat_reply: Option<String>,
    pub error: Option<WorkflowError>,
    pub tables_changed: Vec<EntityTable>,
}

impl WorkflowState {
    pub fn new(message: impl Into<String>, history: Vec<Turn>) -> Self {
        Self {
            message: message.into(),
            history,
            analysis: None,
            patients: Vec::new(),
            statement: None,
            outcome: None,
            bulk: None,
            chat_reply: None,
            error: None,
            tables_changed: Vec::new(),
        }
    }

    pub fn needs_clarification(&self) -> bool {
        self.analysis
            .as_ref()
            .is_some_and(|a| a.needs_clarification)
    }

    pub fn clarification_question(&self) -> Option<&str> {
        self.analysis
            .as_ref()
            .and_then(|a| a.clarification_question.as_deref())
    }

    pub fn planning_context(&self) -> PlanningContext<'_> {
        PlanningContext {
            message: &self.message,
            history: &self.history,
            patients: &self.patients,
        }
    }

    /// Record a failure. The first error wins.
    pub fn fail(&mut self, err: impl Into<WorkflowError>) {
        if self.error.is_none() {
            self.error = Some(err.into());
        }
    }

    pub fn mark_changed(&mut self, table: EntityTable) {
        if !self.tables_changed.contains(&table) {
            self.tables_changed.push(table);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn first_error_wins() {
        let mut state = WorkflowState::new("drop it", Vec::new());
        state.fail(Rejection::DropForbidden);
        state.fail(ExecutionError::UnknownColumn);
        assert_eq!(state.error, Some(WorkflowError::Rejected(Rejection::DropForbidden)));
    }

    #[test]
    fn cancelled_completion_maps_to_cancelled() {
        let err: WorkflowError = CompletionError::Cancelled.into();
        assert_eq!(err, WorkflowError::Cancelled);
        assert_eq!(err.code(), "CANCELLED");
        assert!(err.interrupted());
    }

    #[test]
    fn timeout_is_distinct_and_retryable() {
        let err: WorkflowError = CompletionError::Timeout(Duration::from_secs(30)).into();
        assert_eq!(err.code(), "COMPLETION_TIMEOUT");
        assert!(err.is_retryable());
        assert!(err.to_string().contains("too long"));
    }

    #[test]
    fn rejection_is_not_retryable() {
        let err = WorkflowError::from(Rejection::UnqualifiedUpdate);
        assert!(!err.is_retryable());
        assert!(!err.interrupted());
        assert_eq!(
            err.to_string(),
            "UPDATE without WHERE clause would affect all records. Please specify which records to update."
        );
    }

    #[test]
    fn changed_tables_deduplicated() {
        let mut state = WorkflowState::new("x", Vec::new());
        state.mark_changed(EntityTable::Patients);
        state.mark_changed(EntityTable::Patients);
        state.mark_changed(EntityTable::Billing);
        assert_eq!(state.tables_changed, vec![EntityTable::Patients, EntityTable::Billing]);
    }
}
