//! Runs accepted statements against the clinic database.
//!
//! One connection per statement, opened on entry and dropped on every exit
//! path. Mutations and their audit row commit in a single transaction.

use rusqlite::Connection;
use thiserror::Error;

use super::validator::leading_keyword;
use crate::db::{self, Database, DatabaseError, PatientRef, Row};
use crate::models::{EntityTable, WriteKind};

pub const NO_EFFECT_MESSAGE: &str = "No records were affected. The specified record may not exist.";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExecutionError {
    #[error("A record with this information already exists. Please use different values or update the existing record.")]
    UniqueConstraintViolation,

    #[error("Cannot complete this operation because it references a record that doesn't exist.")]
    ForeignKeyViolation,

    #[error("Invalid column reference in the query. Please check your field names.")]
    UnknownColumn,

    #[error("I can only run one database operation at a time. Please break this into separate requests.")]
    MultiStatementAttempt,

    #[error("Only SELECT, INSERT, UPDATE and DELETE operations are allowed.")]
    UnsupportedStatement,

    #[error("{0}")]
    Other(String),
}

impl ExecutionError {
    pub fn code(&self) -> &'static str {
        match self {
            ExecutionError::UniqueConstraintViolation => "UNIQUE_CONSTRAINT",
            ExecutionError::ForeignKeyViolation => "FOREIGN_KEY",
            ExecutionError::UnknownColumn => "UNKNOWN_COLUMN",
            ExecutionError::MultiStatementAttempt => "MULTIPLE_STATEMENTS",
            ExecutionError::UnsupportedStatement => "UNSUPPORTED_STATEMENT",
            ExecutionError::Other(_) => "EXECUTION_FAILED",
        }
    }
}

impl From<rusqlite::Error> for ExecutionError {
    fn from(err: rusqlite::Error) -> Self {
        match &err {
            rusqlite::Error::MultipleStatement => ExecutionError::MultiStatementAttempt,
            rusqlite::Error::SqliteFailure(failure, message) => {
                let extended = failure.extended_code;
                if extended == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE
                    || extended == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
                {
                    ExecutionError::UniqueConstraintViolation
                } else if extended == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
                    ExecutionError::ForeignKeyViolation
                } else if message
                    .as_deref()
                    .is_some_and(|m| m.contains("no such column"))
                {
                    ExecutionError::UnknownColumn
                } else {
                    ExecutionError::Other(message.clone().unwrap_or_else(|| err.to_string()))
                }
            }
            _ => ExecutionError::Other(err.to_string()),
        }
    }
}

impl From<DatabaseError> for ExecutionError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::Sqlite(e) => e.into(),
            other => ExecutionError::Other(other.to_string()),
        }
    }
}

/// How a statement is run, decided from its text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatementKind {
    Read,
    Write(WriteKind),
}

/// Leading keyword decides. A `WITH` prefix takes the kind of the statement
/// it introduces. Anything else is not runnable.
pub fn classify_statement(sql: &str) -> Option<StatementKind> {
    match leading_keyword(sql)?.as_str() {
        "SELECT" => Some(StatementKind::Read),
        "INSERT" => Some(StatementKind::Write(WriteKind::Created)),
        "UPDATE" => Some(StatementKind::Write(WriteKind::Updated)),
        "DELETE" => Some(StatementKind::Write(WriteKind::Deleted)),
        "WITH" => {
            let words: Vec<String> = sql
                .split(|c: char| !c.is_ascii_alphanumeric() && c != '_')
                .map(str::to_ascii_uppercase)
                .collect();
            let has = |keyword: &str| words.iter().any(|w| w == keyword);
            let kind = if has("INSERT") {
                StatementKind::Write(WriteKind::Created)
            } else if has("UPDATE") {
                StatementKind::Write(WriteKind::Updated)
            } else if has("DELETE") {
                StatementKind::Write(WriteKind::Deleted)
            } else {
                StatementKind::Read
            };
            Some(kind)
        }
        _ => None,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WriteOutcome {
    pub kind: WriteKind,
    pub rows_affected: usize,
    pub inserted_id: Option<i64>,
    pub message: String,
    pub table: Option<EntityTable>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReadOutcome {
    pub rows: Vec<Row>,
    pub table: Option<EntityTable>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Write(WriteOutcome),
    Read(ReadOutcome),
}

impl ExecutionOutcome {
    /// The table observers should refresh. Reads and no-effect writes change nothing.
    pub fn table_changed(&self) -> Option<EntityTable> {
        match self {
            ExecutionOutcome::Write(w) if w.rows_affected > 0 => w.table,
            _ => None,
        }
    }
}

fn write_message(kind: WriteKind, rows: usize, inserted_id: Option<i64>) -> String {
    if rows == 0 {
        return NO_EFFECT_MESSAGE.to_string();
    }
    match (kind, inserted_id) {
        (WriteKind::Created, Some(id)) => format!("Successfully created new record (ID: {id})."),
        (WriteKind::Created, None) => format!("Successfully created {rows} record(s)."),
        (WriteKind::Updated, _) => format!("Successfully updated {rows} record(s)."),
        (WriteKind::Deleted, _) => format!("Successfully deleted {rows} record(s)."),
    }
}

/// Execute one statement on an open connection.
pub fn execute_on(conn: &mut Connection, sql: &str) -> Result<ExecutionOutcome, ExecutionError> {
    let table = EntityTable::detect_in(sql);

    let Some(kind) = classify_statement(sql) else {
        return Err(ExecutionError::UnsupportedStatement);
    };

    match kind {
        StatementKind::Read => {
            let rows = db::fetch_rows(conn, sql)?;
            Ok(ExecutionOutcome::Read(ReadOutcome { rows, table }))
        }
        StatementKind::Write(kind) => {
            let tx = conn.transaction()?;
            let rows_affected = tx.execute(sql, [])?;
            let inserted_id = (kind == WriteKind::Created && rows_affected > 0)
                .then(|| tx.last_insert_rowid());
            db::insert_audit_entry(&tx, sql)?;
            tx.commit()?;

            Ok(ExecutionOutcome::Write(WriteOutcome {
                kind,
                rows_affected,
                inserted_id,
                message: write_message(kind, rows_affected, inserted_id),
                table,
            }))
        }
    }
}

/// Async front for the blocking SQLite work.
#[derive(Debug, Clone)]
pub struct StatementExecutor {
    db: Database,
}

impl StatementExecutor {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn execute(&self, sql: &str) -> Result<ExecutionOutcome, ExecutionError> {
        let db = self.db.clone();
        let sql = sql.to_string();
        tokio::task::spawn_blocking(move || {
            let mut conn = db.connect()?;
            execute_on(&mut conn, &sql)
        })
        .await
        .map_err(|e| ExecutionError::Other(format!("Database task failed: {e}")))?
    }

    /// Current patients, used to ground name references.
    pub async fn patient_snapshot(&self) -> Result<Vec<PatientRef>, DatabaseError> {
        let db = self.db.clone();
        tokio::task::spawn_blocking(move || {
            let conn = db.connect()?;
            db::patient_snapshot(&conn)
        })
        .await
        .map_err(|e| DatabaseError::Task(e.to_string()))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::tests::seeded_database;
    use crate::db::{count_audit_entries, dump_audit_log};

    #[test]
    fn classification_by_leading_keyword() {
        assert_eq!(classify_statement("select * from visits"), Some(StatementKind::Read));
        assert_eq!(
            classify_statement("  INSERT INTO patients (name) VALUES ('x')"),
            Some(StatementKind::Write(WriteKind::Created))
        );
        assert_eq!(
            classify_statement("UPDATE billing SET status = 'Paid' WHERE id = 2"),
            Some(StatementKind::Write(WriteKind::Updated))
        );
        assert_eq!(
            classify_statement("WITH x AS (SELECT 1) DELETE FROM visits WHERE id IN x"),
            Some(StatementKind::Write(WriteKind::Deleted))
        );
        assert_eq!(
            classify_statement("WITH x AS (SELECT 1) SELECT * FROM x"),
            Some(StatementKind::Read)
        );
    }

    #[test]
    fn schema_statements_are_not_classified() {
        assert_eq!(classify_statement("ALTER TABLE patients ADD COLUMN ssn TEXT"), None);
        assert_eq!(classify_statement("CREATE TABLE t (id INTEGER)"), None);
        assert_eq!(classify_statement("PRAGMA foreign_keys = OFF"), None);
    }

    #[tokio::test]
    async fn schema_change_refused_without_touching_store() {
        let (_dir, db) = seeded_database();
        let executor = StatementExecutor::new(db.clone());
        let err = executor
            .execute("ALTER TABLE patients ADD COLUMN ssn TEXT")
            .await
            .unwrap_err();
        assert_eq!(err, ExecutionError::UnsupportedStatement);

        let conn = db.connect().unwrap();
        assert_eq!(count_audit_entries(&conn).unwrap(), 0);
        let rows = db::dump_table(&conn, EntityTable::Patients).unwrap();
        assert!(!rows[0].contains_key("ssn"));
    }

    #[tokio::test]
    async fn read_returns_rows_with_table() {
        let (_dir, db) = seeded_database();
        let executor = StatementExecutor::new(db);
        let outcome = executor
            .execute("SELECT * FROM billing WHERE status = 'Pending'")
            .await
            .unwrap();
        match outcome {
            ExecutionOutcome::Read(read) => {
                assert_eq!(read.rows.len(), 1);
                assert_eq!(read.rows[0]["amount"], 200.0);
                assert_eq!(read.table, Some(EntityTable::Billing));
            }
            other => panic!("expected read, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_commits_and_audits() {
        let (_dir, db) = seeded_database();
        let executor = StatementExecutor::new(db.clone());
        let sql = "UPDATE billing SET status = 'Paid' WHERE id = 2";
        let outcome = executor.execute(sql).await.unwrap();

        assert_eq!(outcome.table_changed(), Some(EntityTable::Billing));
        let ExecutionOutcome::Write(write) = outcome else {
            panic!("expected write");
        };
        assert_eq!(write.message, "Successfully updated 1 record(s).");

        let conn = db.connect().unwrap();
        let audit = dump_audit_log(&conn).unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0]["new_value"], sql);
    }

    #[tokio::test]
    async fn insert_reports_new_id() {
        let (_dir, db) = seeded_database();
        let executor = StatementExecutor::new(db);
        let outcome = executor
            .execute("INSERT INTO patients (name, age) VALUES ('Ada Park', 29)")
            .await
            .unwrap();
        let ExecutionOutcome::Write(write) = outcome else {
            panic!("expected write");
        };
        assert_eq!(write.inserted_id, Some(4));
        assert_eq!(write.message, "Successfully created new record (ID: 4).");
        assert_eq!(write.table, Some(EntityTable::Patients));
    }

    #[tokio::test]
    async fn zero_row_write_is_no_effect() {
        let (_dir, db) = seeded_database();
        let executor = StatementExecutor::new(db);
        let outcome = executor
            .execute("DELETE FROM visits WHERE id = 999")
            .await
            .unwrap();
        assert_eq!(outcome.table_changed(), None);
        let ExecutionOutcome::Write(write) = outcome else {
            panic!("expected write");
        };
        assert_eq!(write.message, NO_EFFECT_MESSAGE);
    }

    #[tokio::test]
    async fn foreign_key_violation_is_mapped() {
        let (_dir, db) = seeded_database();
        let executor = StatementExecutor::new(db.clone());
        let err = executor
            .execute("INSERT INTO visits (patient_id, date) VALUES (999, '2024-01-01')")
            .await
            .unwrap_err();
        assert_eq!(err, ExecutionError::ForeignKeyViolation);

        let conn = db.connect().unwrap();
        assert_eq!(count_audit_entries(&conn).unwrap(), 0);
    }

    #[tokio::test]
    async fn unknown_column_is_mapped() {
        let (_dir, db) = seeded_database();
        let executor = StatementExecutor::new(db);
        let err = executor
            .execute("SELECT shoe_size FROM patients")
            .await
            .unwrap_err();
        assert_eq!(err, ExecutionError::UnknownColumn);
    }

    #[tokio::test]
    async fn multiple_statements_refused() {
        let (_dir, db) = seeded_database();
        let executor = StatementExecutor::new(db);
        let err = executor
            .execute("UPDATE patients SET age = 1 WHERE id = 1; UPDATE patients SET age = 2 WHERE id = 2")
            .await
            .unwrap_err();
        assert_eq!(err, ExecutionError::MultiStatementAttempt);
    }

    #[tokio::test]
    async fn unique_violation_is_mapped() {
        let (_dir, db) = seeded_database();
        let executor = StatementExecutor::new(db);
        let err = executor
            .execute("INSERT INTO patients (id, name) VALUES (1, 'Duplicate')")
            .await
            .unwrap_err();
        assert_eq!(err, ExecutionError::UniqueConstraintViolation);
    }

    #[tokio::test]
    async fn snapshot_lists_seeded_patients() {
        let (_dir, db) = seeded_database();
        let executor = StatementExecutor::new(db);
        let snapshot = executor.patient_snapshot().await.unwrap();
        assert_eq!(snapshot.len(), 3);
        assert_eq!(snapshot[0].name, "John Doe");
    }
}
