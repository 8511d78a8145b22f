use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{SessionStore, SessionStoreError};
use crate::models::Turn;

/// Process-local session history.
pub struct InMemorySessionStore {
    limit: usize,
    sessions: Mutex<HashMap<String, VecDeque<Turn>>>,
}

impl InMemorySessionStore {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            sessions: Mutex::new(HashMap::new()),
        }
    }

    fn trim(turns: &mut VecDeque<Turn>, limit: usize) -> usize {
        let excess = turns.len().saturating_sub(limit);
        turns.drain(..excess);
        excess
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    fn limit(&self) -> usize {
        self.limit
    }

    async fn get(&self, session_id: &str) -> Result<Vec<Turn>, SessionStoreError> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|_| SessionStoreError::LockPoisoned)?;
        Ok(sessions
            .get(session_id)
            .map(|turns| turns.iter().cloned().collect())
            .unwrap_or_default())
    }

    async fn append(&self, session_id: &str, turns: Vec<Turn>) -> Result<(), SessionStoreError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| SessionStoreError::LockPoisoned)?;
        let entry = sessions.entry(session_id.to_string()).or_default();
        entry.extend(turns);
        Self::trim(entry, self.limit);
        Ok(())
    }

    async fn clear(&self, session_id: &str) -> Result<(), SessionStoreError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| SessionStoreError::LockPoisoned)?;
        sessions.remove(session_id);
        Ok(())
    }

    async fn evict(&self, session_id: &str) -> Result<usize, SessionStoreError> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| SessionStoreError::LockPoisoned)?;
        Ok(sessions
            .get_mut(session_id)
            .map(|turns| Self::trim(turns, self.limit))
            .unwrap_or(0))
    }
}
