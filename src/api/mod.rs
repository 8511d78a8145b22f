//! HTTP API.
//!
//! Exposes the chat workflow, read-only table dumps and the change observer
//! socket. The router is composable: `build_router()` returns a `Router`
//! that can be mounted on any axum server instance.

pub mod endpoints;
pub mod error;
pub mod router;
pub mod server;
pub mod types;
pub mod websocket;

pub use router::build_router;
pub use server::{serve, serve_on};
pub use types::ApiContext;
