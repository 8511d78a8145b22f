//! Bounded per-session conversation history.
//!
//! The store owns every session's turns. The orchestrator reads a snapshot
//! before a workflow pass and the chat handler appends the user/assistant
//! pair afterwards, while holding the session's lock from [`SessionLocks`].

mod locks;
mod memory;
mod sqlite;

pub use locks::SessionLocks;
pub use memory::InMemorySessionStore;
pub use sqlite::SqliteSessionStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::db::DatabaseError;
use crate::models::Turn;

#[derive(Error, Debug)]
pub enum SessionStoreError {
    #[error("Session storage failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Session store lock poisoned")]
    LockPoisoned,
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Maximum number of turns kept per session.
    fn limit(&self) -> usize;

    /// Snapshot of the session's turns, oldest first. Unknown sessions are empty.
    async fn get(&self, session_id: &str) -> Result<Vec<Turn>, SessionStoreError>;

    /// Append turns in order, evicting the oldest beyond [`SessionStore::limit`].
    async fn append(&self, session_id: &str, turns: Vec<Turn>) -> Result<(), SessionStoreError>;

    /// Forget every turn of the session.
    async fn clear(&self, session_id: &str) -> Result<(), SessionStoreError>;

    /// Drop the oldest turns beyond the limit. Returns how many were removed.
    async fn evict(&self, session_id: &str) -> Result<usize, SessionStoreError>;
}

/// Generate a fresh session identifier.
pub fn new_session_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
