use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection};
use tracing;

use super::DatabaseError;

/// Handle to the clinic database file.
///
/// Cheap to clone. Every statement opens its own connection through
/// [`Database::connect`]; dropping the connection releases it.
#[derive(Debug, Clone)]
pub struct Database {
    path: PathBuf,
}

impl Database {
    /// Create the file if needed, configure it and run pending migrations.
    pub fn open(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let conn = open_database(path)?;
        drop(conn);
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a fresh connection with pragmas applied. Migrations already ran in `open`.
    pub fn connect(&self) -> Result<Connection, DatabaseError> {
        let conn = Connection::open(&self.path)?;
        configure_pragmas(&conn)?;
        Ok(conn)
    }
}

/// Open a SQLite connection to the given path and run migrations
pub fn open_database(path: &Path) -> Result<Connection, DatabaseError> {
    let conn = Connection::open(path)?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

/// Open an in-memory database (for testing)
pub fn open_memory_database() -> Result<Connection, DatabaseError> {
    let conn = Connection::open_in_memory()?;
    configure_pragmas(&conn)?;
    run_migrations(&conn)?;
    Ok(conn)
}

fn configure_pragmas(conn: &Connection) -> Result<(), DatabaseError> {
    conn.busy_timeout(Duration::from_secs(5))?;
    conn.execute_batch(
        "PRAGMA journal_mode=WAL;
         PRAGMA foreign_keys=ON;",
    )?;
    Ok(())
}

/// Run all pending migrations
pub fn run_migrations(conn: &Connection) -> Result<(), DatabaseError> {
    let current_version = get_current_version(conn);

    let migrations: Vec<(i64, &str)> = vec![
        (1, include_str!("../../resources/migrations/001_initial.sql")),
        (2, include_str!("../../resources/migrations/002_chat_turns.sql")),
    ];

    for (version, sql) in migrations {
        if version > current_version {
            tracing::info!("Running migration v{version}");
            conn.execute_batch(sql).map_err(|e| DatabaseError::MigrationFailed {
                version,
                reason: e.to_string(),
            })?;
        }
    }

    Ok(())
}

/// Get the current schema version (0 if no schema exists yet)
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row(
        "SELECT MAX(version) FROM schema_version",
        [],
        |row| row.get::<_, i64>(0),
    )
    .unwrap_or(0)
}

/// Insert the demo dataset when the patients table is empty.
///
/// Returns `true` when rows were written.
pub fn seed_demo_data(conn: &mut Connection) -> Result<bool, DatabaseError> {
    let existing: i64 = conn.query_row("SELECT COUNT(*) FROM patients", [], |row| row.get(0))?;
    if existing > 0 {
        return Ok(false);
    }

    let tx = conn.transaction()?;
    {
        let mut patients = tx.prepare(
            "INSERT INTO patients (name, age, gender, address, phone, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        )?;
        for (name, age, gender, address, phone, notes) in [
            ("John Doe", 45, "Male", "123 Maple St", "555-0101", "Hypertension history"),
            ("Sarah Ali", 35, "Female", "456 Oak St", "555-0102", "Allergy to penicillin"),
            ("Bob Smith", 60, "Male", "789 Pine St", "555-0103", "Diabetic"),
        ] {
            patients.execute(params![name, age, gender, address, phone, notes])?;
        }

        let mut visits = tx.prepare(
            "INSERT INTO visits (patient_id, date, diagnosis, doctor) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (patient_id, date, diagnosis, doctor) in [
            (1, "2023-10-01", "Routine Checkup", "Dr. House"),
            (2, "2023-10-05", "Flu Symptoms", "Dr. Wilson"),
            (1, "2023-11-15", "Blood Pressure Follow-up", "Dr. House"),
        ] {
            visits.execute(params![patient_id, date, diagnosis, doctor])?;
        }

        let mut prescriptions = tx.prepare(
            "INSERT INTO prescriptions (visit_id, medication, dosage) VALUES (?1, ?2, ?3)",
        )?;
        for (visit_id, medication, dosage) in [
            (3, "Lisinopril", "10mg daily"),
            (2, "Tamiflu", "75mg twice daily"),
        ] {
            prescriptions.execute(params![visit_id, medication, dosage])?;
        }

        let mut billing = tx.prepare(
            "INSERT INTO billing (patient_id, amount, status, date) VALUES (?1, ?2, ?3, ?4)",
        )?;
        for (patient_id, amount, status, date) in [
            (1, 150.00, "Paid", "2023-10-01"),
            (2, 200.00, "Pending", "2023-10-05"),
            (1, 100.00, "Paid", "2023-11-15"),
        ] {
            billing.execute(params![patient_id, amount, status, date])?;
        }
    }
    tx.commit()?;

    tracing::info!("Seeded demo clinic data");
    Ok(true)
}
