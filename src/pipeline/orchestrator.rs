//! Drives one request through the workflow stages.
//!
//! `Analyze → {Clarify, Chat, BulkInsert, GenerateSql}`, `GenerateSql →
//! Validate → {Reject, Execute}`, `Execute | BulkInsert → Notify`, and
//! everything ends in `Respond`. A failure at any stage jumps straight to
//! `Respond`; no stage runs twice.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::bulk::run_bulk;
use super::executor::StatementExecutor;
use super::formatter::{format_reply, ReplyPayload};
use super::notifier::ChangeNotifier;
use super::planner::StatementPlanner;
use super::state::{Stage, WorkflowError, WorkflowState};
use super::validator::{validate, Verdict};
use crate::models::{Intent, Turn};

/// What the caller gets back after `Respond`.
#[derive(Debug, Clone)]
pub struct WorkflowResult {
    pub payload: ReplyPayload,
    pub statement: Option<String>,
    pub error: Option<WorkflowError>,
}

impl WorkflowResult {
    /// False when the pass was cut short by the completion service or
    /// cancellation; such exchanges are not added to history.
    pub fn completed(&self) -> bool {
        !self.error.as_ref().is_some_and(WorkflowError::interrupted)
    }

    /// The user/assistant pair to append to the session.
    pub fn turns(&self, message: &str) -> Vec<Turn> {
        vec![
            Turn::user(message),
            Turn::assistant_reply(&self.payload.to_json(), self.statement.as_deref()),
        ]
    }
}

pub struct Orchestrator {
    planner: Arc<dyn StatementPlanner>,
    executor: StatementExecutor,
    notifier: ChangeNotifier,
}

impl Orchestrator {
    pub fn new(
        planner: Arc<dyn StatementPlanner>,
        executor: StatementExecutor,
        notifier: ChangeNotifier,
    ) -> Self {
        Self {
            planner,
            executor,
            notifier,
        }
    }

    pub fn notifier(&self) -> &ChangeNotifier {
        &self.notifier
    }

    /// Run one pass. Always produces a payload.
    pub async fn run(
        &self,
        message: &str,
        history: Vec<Turn>,
        cancel: &CancellationToken,
    ) -> WorkflowResult {
        let mut state = WorkflowState::new(message, history);
        let mut visited: Vec<Stage> = Vec::with_capacity(6);
        let mut stage = Stage::Analyze;

        while stage != Stage::Respond {
            debug_assert!(!visited.contains(&stage), "stage {stage} re-entered");
            visited.push(stage);

            let next = self.step(stage, &mut state, cancel).await;
            tracing::debug!(from = %stage, to = %next, "Workflow transition");
            stage = next;
        }

        if let Some(err) = &state.error {
            tracing::info!(code = err.code(), "Workflow finished with error");
        }

        WorkflowResult {
            payload: format_reply(&state),
            statement: state.statement.take(),
            error: state.error.take(),
        }
    }

    async fn step(
        &self,
        stage: Stage,
        state: &mut WorkflowState,
        cancel: &CancellationToken,
    ) -> Stage {
        match stage {
            Stage::Analyze => self.analyze(state, cancel).await,
            Stage::Clarify => Stage::Respond,
            Stage::Chat => {
                match self.planner.chat_reply(state.planning_context(), cancel).await {
                    Ok(reply) => state.chat_reply = Some(reply),
                    Err(e) => state.fail(e),
                }
                Stage::Respond
            }
            Stage::BulkInsert => self.bulk_insert(state, cancel).await,
            Stage::GenerateSql => self.generate(state, cancel).await,
            Stage::Validate => {
                let statement = state.statement.as_deref().unwrap_or_default();
                match validate(statement) {
                    Verdict::Accept => Stage::Execute,
                    Verdict::Reject(reason) => {
                        state.fail(reason);
                        Stage::Reject
                    }
                }
            }
            Stage::Reject => {
                tracing::warn!(
                    statement = state.statement.as_deref().unwrap_or_default(),
                    "Statement rejected"
                );
                Stage::Respond
            }
            Stage::Execute => self.execute(state, cancel).await,
            Stage::Notify => {
                // Only committed writes mark tables, so they are announced
                // even when the request was cancelled meanwhile.
                self.notifier.notify_all(&state.tables_changed);
                Stage::Respond
            }
            Stage::Respond => Stage::Respond,
        }
    }

    async fn analyze(&self, state: &mut WorkflowState, cancel: &CancellationToken) -> Stage {
        match self.executor.patient_snapshot().await {
            Ok(patients) => state.patients = patients,
            Err(e) => {
                tracing::warn!(error = %e, "Patient snapshot unavailable, planning without it");
                state.patients = Vec::new();
            }
        }

        let analysis = match self.planner.classify(state.planning_context(), cancel).await {
            Ok(analysis) => analysis,
            Err(e) => {
                state.fail(e);
                return Stage::Respond;
            }
        };
        tracing::debug!(
            intent = %analysis.intent,
            table = analysis.resolved_context.table.as_deref().unwrap_or("-"),
            "Request classified"
        );

        let next = if analysis.needs_clarification {
            Stage::Clarify
        } else {
            match analysis.intent {
                Intent::Chat => Stage::Chat,
                Intent::BulkInsert => Stage::BulkInsert,
                Intent::Query | Intent::Update => Stage::GenerateSql,
            }
        };
        state.analysis = Some(analysis);
        next
    }

    async fn generate(&self, state: &mut WorkflowState, cancel: &CancellationToken) -> Stage {
        let Some(analysis) = state.analysis.clone() else {
            return Stage::Respond;
        };
        match self
            .planner
            .generate(state.planning_context(), &analysis, cancel)
            .await
        {
            Ok(statement) => {
                tracing::debug!(statement = %statement, "Statement generated");
                state.statement = Some(statement);
                Stage::Validate
            }
            Err(e) => {
                state.fail(e);
                Stage::Respond
            }
        }
    }

    async fn execute(&self, state: &mut WorkflowState, cancel: &CancellationToken) -> Stage {
        if cancel.is_cancelled() {
            state.fail(WorkflowError::Cancelled);
            return Stage::Respond;
        }
        let Some(statement) = state.statement.clone() else {
            return Stage::Respond;
        };

        match self.executor.execute(&statement).await {
            Ok(outcome) => {
                if let Some(table) = outcome.table_changed() {
                    state.mark_changed(table);
                }
                state.outcome = Some(outcome);
                Stage::Notify
            }
            Err(e) => {
                tracing::warn!(error = %e, code = e.code(), "Statement execution failed");
                state.fail(e);
                Stage::Respond
            }
        }
    }

    async fn bulk_insert(&self, state: &mut WorkflowState, cancel: &CancellationToken) -> Stage {
        let statements = match self
            .planner
            .generate_bulk(state.planning_context(), cancel)
            .await
        {
            Ok(statements) => statements,
            Err(e) => {
                state.fail(e);
                return Stage::Respond;
            }
        };
        if !statements.is_empty() {
            state.statement = Some(statements.join("; "));
        }

        match run_bulk(&self.executor, &statements, cancel).await {
            Ok(outcome) => {
                for table in &outcome.tables {
                    state.mark_changed(*table);
                }
                state.bulk = Some(outcome);
                Stage::Notify
            }
            Err(e) => {
                state.fail(e);
                Stage::Respond
            }
        }
    }
}
