//! Bulk insert: independently validated and executed INSERT statements.

use tokio_util::sync::CancellationToken;

use super::executor::{ExecutionError, ExecutionOutcome, StatementExecutor, NO_EFFECT_MESSAGE};
use super::state::WorkflowError;
use super::validator::{validate, Verdict};
use crate::models::EntityTable;

/// Failure details quoted back to the user.
const MAX_REPORTED_FAILURES: usize = 3;

#[derive(Debug, Clone, PartialEq)]
pub struct BulkOutcome {
    pub succeeded: usize,
    pub failures: Vec<String>,
    pub tables: Vec<EntityTable>,
    /// Statements never attempted because the request was cancelled.
    pub skipped: usize,
    pub message: String,
}

fn preview(statement: &str) -> String {
    let head: String = statement.chars().take(50).collect();
    format!("{head}...")
}

fn summary(succeeded: usize, failed: usize, skipped: usize, tables: &[EntityTable]) -> String {
    let target = if tables.is_empty() {
        "database".to_string()
    } else {
        tables
            .iter()
            .map(EntityTable::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let mut message = format!("Successfully created {succeeded} new record(s) in {target}.");
    if failed > 0 {
        message.push_str(&format!(" ({failed} statements failed)"));
    }
    if skipped > 0 {
        message.push_str(&format!(" ({skipped} statements skipped after cancellation)"));
    }
    message
}

/// Running totals for one bulk request.
#[derive(Debug, Default)]
struct BulkTally {
    succeeded: usize,
    failures: Vec<String>,
    tables: Vec<EntityTable>,
}

impl BulkTally {
    fn record(&mut self, statement: &str, result: Result<ExecutionOutcome, ExecutionError>) {
        match result {
            Ok(ExecutionOutcome::Write(write)) if write.rows_affected > 0 => {
                self.succeeded += 1;
                if let Some(table) = write.table {
                    if !self.tables.contains(&table) {
                        self.tables.push(table);
                    }
                }
            }
            Ok(ExecutionOutcome::Write(_)) => {
                self.reject(statement, NO_EFFECT_MESSAGE);
            }
            Ok(ExecutionOutcome::Read(_)) => {
                self.reject(statement, "not an INSERT statement");
            }
            Err(e) => {
                tracing::debug!(error = %e, "Bulk statement failed");
                self.reject(statement, e);
            }
        }
    }

    fn reject(&mut self, statement: &str, reason: impl std::fmt::Display) {
        self.failures.push(format!("{} : {reason}", preview(statement)));
    }

    /// Committed rows always produce an outcome, even when the request was
    /// cancelled before every statement ran.
    fn finish(self, skipped: usize) -> Result<BulkOutcome, WorkflowError> {
        if self.succeeded == 0 {
            if skipped > 0 {
                return Err(WorkflowError::Cancelled);
            }
            let detail = if self.failures.is_empty() {
                "No INSERT statements were generated.".to_string()
            } else {
                let shown: Vec<&str> = self
                    .failures
                    .iter()
                    .take(MAX_REPORTED_FAILURES)
                    .map(String::as_str)
                    .collect();
                format!("Errors: {}", shown.join("; "))
            };
            return Err(WorkflowError::BulkInsert(format!("Failed to insert data. {detail}")));
        }

        tracing::info!(
            succeeded = self.succeeded,
            failed = self.failures.len(),
            skipped,
            "Bulk insert finished"
        );
        Ok(BulkOutcome {
            succeeded: self.succeeded,
            message: summary(self.succeeded, self.failures.len(), skipped, &self.tables),
            failures: self.failures,
            tables: self.tables,
            skipped,
        })
    }
}

/// Run each statement on its own. A failing statement is recorded and the
/// rest still run; zero successes is an error. Cancellation stops before the
/// next statement and keeps whatever already committed.
pub async fn run_bulk(
    executor: &StatementExecutor,
    statements: &[String],
    cancel: &CancellationToken,
) -> Result<BulkOutcome, WorkflowError> {
    let mut tally = BulkTally::default();
    let mut skipped = 0;

    for (index, statement) in statements.iter().enumerate() {
        if cancel.is_cancelled() {
            skipped = statements.len() - index;
            tracing::info!(succeeded = tally.succeeded, skipped, "Bulk insert cancelled");
            break;
        }

        if let Verdict::Reject(reason) = validate(statement) {
            tally.reject(statement, reason);
            continue;
        }

        let result = executor.execute(statement).await;
        tally.record(statement, result);
    }

    tally.finish(skipped)
}
