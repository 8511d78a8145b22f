use async_trait::async_trait;

use super::{SessionStore, SessionStoreError};
use crate::db::{
    append_chat_turns, delete_chat_turns, load_chat_turns, Database, DatabaseError,
};
use crate::models::Turn;

/// Session history persisted in the `chat_turns` table, surviving restarts.
pub struct SqliteSessionStore {
    db: Database,
    limit: usize,
}

impl SqliteSessionStore {
    pub fn new(db: Database, limit: usize) -> Self {
        Self { db, limit }
    }

    async fn blocking<T, F>(&self, f: F) -> Result<T, SessionStoreError>
    where
        T: Send + 'static,
        F: FnOnce(&mut rusqlite::Connection) -> Result<T, DatabaseError> + Send + 'static,
    {
        let db = self.db.clone();
        let result = tokio::task::spawn_blocking(move || {
            let mut conn = db.connect()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| DatabaseError::Task(e.to_string()))?;
        Ok(result?)
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    fn limit(&self) -> usize {
        self.limit
    }

    async fn get(&self, session_id: &str) -> Result<Vec<Turn>, SessionStoreError> {
        let id = session_id.to_string();
        self.blocking(move |conn| load_chat_turns(conn, &id)).await
    }

    async fn append(&self, session_id: &str, turns: Vec<Turn>) -> Result<(), SessionStoreError> {
        let id = session_id.to_string();
        let keep = self.limit;
        self.blocking(move |conn| append_chat_turns(conn, &id, &turns, keep))
            .await
    }

    async fn clear(&self, session_id: &str) -> Result<(), SessionStoreError> {
        let id = session_id.to_string();
        self.blocking(move |conn| delete_chat_turns(conn, &id).map(|_| ()))
            .await
    }

    async fn evict(&self, session_id: &str) -> Result<usize, SessionStoreError> {
        let id = session_id.to_string();
        let keep = self.limit;
        self.blocking(move |conn| {
            let before = load_chat_turns(conn, &id)?.len();
            append_chat_turns(conn, &id, &[], keep)?;
            Ok(before.saturating_sub(keep))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(limit: usize) -> (tempfile::TempDir, SqliteSessionStore) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open(&dir.path().join("sessions.db")).unwrap();
        (dir, SqliteSessionStore::new(db, limit))
    }

    #[tokio::test]
    async fn history_is_bounded() {
        let (_dir, store) = store(20);
        for i in 0..11 {
            store
                .append("s", vec![Turn::user(format!("q{i}")), Turn::assistant(format!("a{i}"))])
                .await
                .unwrap();
        }
        let turns = store.get("s").await.unwrap();
        assert_eq!(turns.len(), 20);
        assert_eq!(turns[0].content, "q1");
    }

    #[tokio::test]
    async fn clear_then_get_is_empty() {
        let (_dir, store) = store(20);
        store.append("s", vec![Turn::user("hi")]).await.unwrap();
        store.clear("s").await.unwrap();
        assert!(store.get("s").await.unwrap().is_empty());
        assert_eq!(store.evict("s").await.unwrap(), 0);
    }
}
