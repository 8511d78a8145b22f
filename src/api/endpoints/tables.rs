//! Read-only full-table dumps.

use axum::extract::State;
use axum::Json;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::db::{self, Database, DatabaseError, Row};
use crate::models::EntityTable;

async fn dump<F>(database: Database, read: F) -> Result<Json<Vec<Row>>, ApiError>
where
    F: FnOnce(&rusqlite::Connection) -> Result<Vec<Row>, DatabaseError> + Send + 'static,
{
    let rows = tokio::task::spawn_blocking(move || {
        let conn = database.connect()?;
        read(&conn)
    })
    .await
    .map_err(|e| ApiError::Internal(format!("Database task failed: {e}")))??;
    Ok(Json(rows))
}

async fn dump_entity(ctx: ApiContext, table: EntityTable) -> Result<Json<Vec<Row>>, ApiError> {
    dump(ctx.db, move |conn| db::dump_table(conn, table)).await
}

/// `GET /api/patients`
pub async fn patients(State(ctx): State<ApiContext>) -> Result<Json<Vec<Row>>, ApiError> {
    dump_entity(ctx, EntityTable::Patients).await
}

/// `GET /api/visits`
pub async fn visits(State(ctx): State<ApiContext>) -> Result<Json<Vec<Row>>, ApiError> {
    dump_entity(ctx, EntityTable::Visits).await
}

/// `GET /api/prescriptions`
pub async fn prescriptions(State(ctx): State<ApiContext>) -> Result<Json<Vec<Row>>, ApiError> {
    dump_entity(ctx, EntityTable::Prescriptions).await
}

/// `GET /api/billing`
pub async fn billing(State(ctx): State<ApiContext>) -> Result<Json<Vec<Row>>, ApiError> {
    dump_entity(ctx, EntityTable::Billing).await
}

/// `GET /api/audit_log`, newest first.
pub async fn audit_log(State(ctx): State<ApiContext>) -> Result<Json<Vec<Row>>, ApiError> {
    dump(ctx.db, db::dump_audit_log).await
}
