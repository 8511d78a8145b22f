use base64::Engine;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, Statement};
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::db::DatabaseError;
use crate::models::EntityTable;

/// One result row: column name to value, in select-list order.
pub type Row = Map<String, Value>;

/// Convert a single SQLite value into JSON. Blobs become base64 text.
pub fn value_to_json(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
        ValueRef::Text(bytes) => Value::String(String::from_utf8_lossy(bytes).into_owned()),
        ValueRef::Blob(bytes) => {
            Value::String(base64::engine::general_purpose::STANDARD.encode(bytes))
        }
    }
}

/// Step a prepared statement to completion, collecting ordered row maps.
pub fn collect_rows(stmt: &mut Statement<'_>) -> Result<Vec<Row>, DatabaseError> {
    let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        let mut map = Row::new();
        for (idx, name) in columns.iter().enumerate() {
            map.insert(name.clone(), value_to_json(row.get_ref(idx)?));
        }
        out.push(map);
    }
    Ok(out)
}

/// Run an arbitrary read statement and return every row.
pub fn fetch_rows(conn: &Connection, sql: &str) -> Result<Vec<Row>, DatabaseError> {
    let mut stmt = conn.prepare(sql)?;
    collect_rows(&mut stmt)
}

/// Full dump of one entity table, ordered by id.
pub fn dump_table(conn: &Connection, table: EntityTable) -> Result<Vec<Row>, DatabaseError> {
    // Table names come from a closed enum, never from user input.
    fetch_rows(conn, &format!("SELECT * FROM {} ORDER BY id", table.as_str()))
}

/// Minimal patient reference used to ground entity resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PatientRef {
    pub id: i64,
    pub name: String,
}

/// Current `{id, name}` pairs for every patient.
pub fn patient_snapshot(conn: &Connection) -> Result<Vec<PatientRef>, DatabaseError> {
    let mut stmt = conn.prepare("SELECT id, name FROM patients ORDER BY id")?;
    let rows = stmt
        .query_map([], |row| {
            Ok(PatientRef {
                id: row.get(0)?,
                name: row.get(1)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}
