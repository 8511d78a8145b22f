//! Maps a finished workflow to the single reply payload sent to the client.

use serde::{Deserialize, Serialize};
use super::executor::ExecutionOutcome;
use super::state::WorkflowState;
use crate::db::Row;
use crate::models::WriteKind;

pub const ERROR_SUGGESTION: &str =
    "Please try rephrasing your request or provide more specific details.";
pub const DEFAULT_REPLY: &str =
    "I've completed your request. Is there anything else you'd like me to help with?";
pub const NO_ROWS_REPLY: &str = "No matching records found.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ReplyPayload {
    Clarification {
        message: String,
    },
    ChatText {
        message: String,
    },
    Error {
        message: String,
        suggestion: String,
        code: String,
        retryable: bool,
    },
    TableResult {
        table_type: TableType,
        message: String,
        data: Vec<Row>,
        count: usize,
    },
    WriteSuccess {
        action: WriteKind,
        message: String,
    },
    PlainText {
        message: String,
    },
}

impl ReplyPayload {
    pub fn message(&self) -> &str {
        match self {
            ReplyPayload::Clarification { message }
            | ReplyPayload::ChatText { message }
            | ReplyPayload::Error { message, .. }
            | ReplyPayload::TableResult { message, .. }
            | ReplyPayload::WriteSuccess { message, .. }
            | ReplyPayload::PlainText { message } => message,
        }
    }

    /// Serialized form stored in assistant turns.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.message().to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TableType {
    Patients,
    Visits,
    Prescriptions,
    Billing,
    Audit,
    Data,
}

impl TableType {
    /// Guess the table from the fields of the first row.
    pub fn from_row(row: &Row) -> Self {
        if row.contains_key("diagnosis") {
            TableType::Visits
        } else if row.contains_key("medication") {
            TableType::Prescriptions
        } else if row.contains_key("amount") {
            TableType::Billing
        } else if row.contains_key("name") && row.contains_key("age") {
            TableType::Patients
        } else if row.contains_key("operation") {
            TableType::Audit
        } else {
            TableType::Data
        }
    }

    pub fn summary(&self, count: usize) -> String {
        let plural = count != 1;
        let noun = match self {
            TableType::Patients => if plural { "patients" } else { "patient" },
            TableType::Visits => if plural { "visits" } else { "visit" },
            TableType::Prescriptions => if plural { "prescriptions" } else { "prescription" },
            TableType::Billing => if plural { "billing records" } else { "billing record" },
            TableType::Audit => if plural { "audit log entries" } else { "audit log entry" },
            TableType::Data => if plural { "records" } else { "record" },
        };
        format!("Found {count} {noun}.")
    }
}

fn table_result(rows: &[Row]) -> ReplyPayload {
    let Some(first) = rows.first() else {
        return ReplyPayload::PlainText {
            message: NO_ROWS_REPLY.to_string(),
        };
    };
    let table_type = TableType::from_row(first);
    ReplyPayload::TableResult {
        table_type,
        message: table_type.summary(rows.len()),
        data: rows.to_vec(),
        count: rows.len(),
    }
}

/// Build the reply. Precedence: clarification, chat, error, results, default.
pub fn format_reply(state: &WorkflowState) -> ReplyPayload {
    if state.needs_clarification() {
        let message = state
            .clarification_question()
            .unwrap_or("Could you tell me a bit more about what you need?")
            .to_string();
        return ReplyPayload::Clarification { message };
    }

    if let Some(reply) = &state.chat_reply {
        return ReplyPayload::ChatText {
            message: reply.clone(),
        };
    }

    if let Some(err) = &state.error {
        return ReplyPayload::Error {
            message: err.to_string(),
            suggestion: ERROR_SUGGESTION.to_string(),
            code: err.code().to_string(),
            retryable: err.is_retryable(),
        };
    }

    if let Some(bulk) = &state.bulk {
        return ReplyPayload::WriteSuccess {
            action: WriteKind::Created,
            message: bulk.message.clone(),
        };
    }

    match &state.outcome {
        Some(ExecutionOutcome::Read(read)) => table_result(&read.rows),
        Some(ExecutionOutcome::Write(write)) if write.rows_affected > 0 => {
            ReplyPayload::WriteSuccess {
                action: write.kind,
                message: write.message.clone(),
            }
        }
        Some(ExecutionOutcome::Write(write)) => ReplyPayload::PlainText {
            message: write.message.clone(),
        },
        None => ReplyPayload::PlainText {
            message: DEFAULT_REPLY.to_string(),
        },
    }
}
