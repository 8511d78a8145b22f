//! HTTP router.
//!
//! JSON routes live under `/api/`; the liveness check is `/` and the
//! observer socket is `/ws`. CORS is fully open for the browser dashboard.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use crate::api::endpoints;
use crate::api::types::ApiContext;
use crate::api::websocket;

/// Build the full application router.
pub fn build_router(ctx: ApiContext) -> Router {
    // NOTE: Path params use `:param` syntax (matchit 0.7 / axum 0.7).
    let api = Router::new()
        .route("/chat", post(endpoints::chat::send))
        .route("/chat/clear", post(endpoints::chat::clear))
        .route("/patients", get(endpoints::tables::patients))
        .route("/visits", get(endpoints::tables::visits))
        .route("/prescriptions", get(endpoints::tables::prescriptions))
        .route("/billing", get(endpoints::tables::billing))
        .route("/audit_log", get(endpoints::tables::audit_log));

    Router::new()
        .route("/", get(endpoints::health::check))
        .route("/ws", get(websocket::ws_upgrade))
        .nest("/api", api)
        .with_state(ctx)
        .layer(CorsLayer::permissive())
}
