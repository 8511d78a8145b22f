//! Chat endpoints.
//!
//! - `POST /api/chat` runs one workflow pass for a session
//! - `POST /api/chat/clear` forgets a session's history

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::api::error::ApiError;
use crate::api::types::ApiContext;
use crate::pipeline::completion::CompletionError;
use crate::pipeline::{ReplyPayload, WorkflowError};
use crate::session::new_session_id;

pub const MAX_MESSAGE_CHARS: usize = 2000;

#[derive(Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct ChatResponse {
    pub response: ReplyPayload,
    pub session_id: String,
}

#[derive(Deserialize, Default)]
pub struct ClearRequest {
    #[serde(default)]
    pub session_id: Option<String>,
}

#[derive(Serialize)]
pub struct ClearResponse {
    pub status: &'static str,
    pub session_id: Option<String>,
}

/// Completion failures and deadline cancellations are surfaced as
/// 503/504 so clients know the same message can be resubmitted.
pub fn status_for(error: Option<&WorkflowError>) -> StatusCode {
    match error {
        Some(WorkflowError::Completion(CompletionError::Timeout(_)))
        | Some(WorkflowError::Cancelled) => StatusCode::GATEWAY_TIMEOUT,
        Some(WorkflowError::Completion(_)) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::OK,
    }
}

fn provided(session_id: Option<String>) -> Option<String> {
    session_id.filter(|id| !id.trim().is_empty())
}

/// Cancel `cancel` once `deadline` elapses, unless it is cancelled first.
fn arm_deadline(cancel: &CancellationToken, deadline: std::time::Duration) {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            _ = tokio::time::sleep(deadline) => {
                tracing::warn!(?deadline, "Chat request deadline elapsed");
                cancel.cancel();
            }
        }
    });
}

/// `POST /api/chat`
pub async fn send(
    State(ctx): State<ApiContext>,
    Json(req): Json<ChatRequest>,
) -> Result<(StatusCode, Json<ChatResponse>), ApiError> {
    let message = req.message.trim();
    if message.is_empty() {
        return Err(ApiError::BadRequest("Message cannot be empty".into()));
    }
    if message.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ApiError::BadRequest(format!(
            "Message too long (max {MAX_MESSAGE_CHARS} chars)"
        )));
    }

    let session_id = provided(req.session_id).unwrap_or_else(new_session_id);
    let _session_guard = ctx.locks.acquire(&session_id).await;
    let history = ctx.sessions.get(&session_id).await?;

    // Dropping the handler (client gone) cancels the pass.
    let cancel = CancellationToken::new();
    let _cancel_on_drop = cancel.clone().drop_guard();
    arm_deadline(&cancel, ctx.request_deadline);

    let result = ctx.orchestrator.run(message, history, &cancel).await;

    if result.completed() {
        if let Err(e) = ctx.sessions.append(&session_id, result.turns(message)).await {
            tracing::error!(session_id = %session_id, error = %e, "Failed to record chat turns");
        }
    }

    let status = status_for(result.error.as_ref());
    tracing::info!(
        session_id = %session_id,
        status = status.as_u16(),
        has_statement = result.statement.is_some(),
        "Chat request handled"
    );

    Ok((
        status,
        Json(ChatResponse {
            response: result.payload,
            session_id,
        }),
    ))
}

/// `POST /api/chat/clear`
pub async fn clear(
    State(ctx): State<ApiContext>,
    body: Option<Json<ClearRequest>>,
) -> Result<Json<ClearResponse>, ApiError> {
    let session_id = provided(body.map(|Json(b)| b).unwrap_or_default().session_id);

    if let Some(id) = &session_id {
        let _session_guard = ctx.locks.acquire(id).await;
        ctx.sessions.clear(id).await?;
        tracing::info!(session_id = %id, "Session cleared");
    }

    Ok(Json(ClearResponse {
        status: "cleared",
        session_id,
    }))
}
