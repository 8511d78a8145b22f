use rusqlite::{params, Connection};

use crate::db::DatabaseError;
use crate::models::{CHATBOT_ACTOR, SQL_EXECUTION_OPERATION};

use super::tables::{fetch_rows, Row};

/// Record a committed mutating statement. Callers pass the open transaction
/// so the audit row commits or rolls back with the statement itself.
pub fn insert_audit_entry(conn: &Connection, statement: &str) -> Result<i64, DatabaseError> {
    conn.execute(
        "INSERT INTO audit_log (operation, new_value, user) VALUES (?1, ?2, ?3)",
        params![SQL_EXECUTION_OPERATION, statement, CHATBOT_ACTOR],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Raw audit rows, newest first, for the table dump endpoint.
pub fn dump_audit_log(conn: &Connection) -> Result<Vec<Row>, DatabaseError> {
    fetch_rows(conn, "SELECT * FROM audit_log ORDER BY time DESC, id DESC")
}

pub fn count_audit_entries(conn: &Connection) -> Result<i64, DatabaseError> {
    Ok(conn.query_row("SELECT COUNT(*) FROM audit_log", [], |row| row.get(0))?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::open_memory_database;

    #[test]
    fn entries_listed_newest_first() {
        let conn = open_memory_database().unwrap();
        insert_audit_entry(&conn, "INSERT INTO patients (name) VALUES ('A')").unwrap();
        insert_audit_entry(&conn, "UPDATE patients SET age = 3 WHERE id = 1").unwrap();

        let entries = dump_audit_log(&conn).unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries[0]["new_value"].as_str().unwrap().starts_with("UPDATE"));
        assert_eq!(entries[0]["operation"], "SQL Execution");
        assert_eq!(entries[0]["user"], "chatbot");
        assert!(entries[0]["time"].is_string());
    }

    #[test]
    fn dump_includes_operation_column() {
        let conn = open_memory_database().unwrap();
        insert_audit_entry(&conn, "DELETE FROM visits WHERE id = 1").unwrap();
        let rows = dump_audit_log(&conn).unwrap();
        assert_eq!(rows.len(), 1);
        assert!(rows[0].contains_key("operation"));
        assert_eq!(count_audit_entries(&conn).unwrap(), 1);
    }
}
