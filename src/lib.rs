pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod pipeline;
pub mod session;

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::api::ApiContext;
use crate::config::{AppConfig, PlannerKind, SessionBackend};
use crate::db::{Database, DatabaseError};
use crate::pipeline::completion::{
    CompletionError, OpenAiCompatibleClient, ResilientCompletion, RetryPolicy,
};
use crate::pipeline::executor::StatementExecutor;
use crate::pipeline::planner::{LlmPlanner, RuleBasedPlanner, StatementPlanner};
use crate::pipeline::{ChangeNotifier, Orchestrator};
use crate::session::{InMemorySessionStore, SessionStore, SqliteSessionStore};

#[derive(Error, Debug)]
pub enum StartupError {
    #[error("Database setup failed: {0}")]
    Database(#[from] DatabaseError),

    #[error("Completion client setup failed: {0}")]
    Completion(#[from] CompletionError),

    #[error("Server error: {0}")]
    Io(#[from] std::io::Error),
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init();
}

fn build_planner(config: &AppConfig) -> Result<Arc<dyn StatementPlanner>, StartupError> {
    match config.planner {
        PlannerKind::Rules => {
            tracing::info!("Using rule-based planner");
            Ok(Arc::new(RuleBasedPlanner::new()))
        }
        PlannerKind::Llm => {
            let client = OpenAiCompatibleClient::new(&config.completion)?;
            tracing::info!(
                endpoint = %client.endpoint(),
                model = %config.completion.model,
                "Using completion-backed planner"
            );
            let resilient = ResilientCompletion::new(
                Arc::new(client),
                RetryPolicy::from(&config.completion),
            );
            Ok(Arc::new(LlmPlanner::new(Arc::new(resilient))))
        }
    }
}

fn build_session_store(config: &AppConfig, db: &Database) -> Arc<dyn SessionStore> {
    match config.session_backend {
        SessionBackend::Memory => Arc::new(InMemorySessionStore::new(config.history_turns)),
        SessionBackend::Sqlite => Arc::new(SqliteSessionStore::new(db.clone(), config.history_turns)),
    }
}

/// Open the database, seed it if asked, and wire the workflow together.
pub fn build_context(config: &AppConfig) -> Result<ApiContext, StartupError> {
    let db = Database::open(&config.database_path)?;
    tracing::info!(path = %config.database_path.display(), "Database ready");

    if config.seed_demo_data {
        let mut conn = db.connect()?;
        if db::seed_demo_data(&mut conn)? {
            tracing::info!("Demo data seeded");
        }
    }

    let orchestrator = Orchestrator::new(
        build_planner(config)?,
        StatementExecutor::new(db.clone()),
        ChangeNotifier::new(),
    );
    let sessions = build_session_store(config, &db);

    Ok(ApiContext::new(
        db,
        sessions,
        Arc::new(orchestrator),
        config.request_deadline,
    ))
}

/// Process entry point: configure, build, serve until Ctrl-C.
pub async fn run() -> Result<(), StartupError> {
    init_tracing();
    tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);

    let config = AppConfig::from_env();
    let ctx = build_context(&config)?;
    api::serve(config.bind_addr, ctx).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config_in(dir: &tempfile::TempDir) -> AppConfig {
        AppConfig {
            database_path: dir.path().join("nested").join("medical.db"),
            planner: PlannerKind::Rules,
            ..AppConfig::default()
        }
    }

    #[test]
    fn build_context_seeds_once() {
        let dir = tempfile::tempdir().unwrap();
        let config = config_in(&dir);

        let ctx = build_context(&config).unwrap();
        let conn = ctx.db.connect().unwrap();
        let count = |conn: &rusqlite::Connection| -> i64 {
            conn.query_row("SELECT COUNT(*) FROM patients", [], |r| r.get(0)).unwrap()
        };
        assert_eq!(count(&conn), 3);
        drop(conn);

        let ctx = build_context(&config).unwrap();
        assert_eq!(count(&ctx.db.connect().unwrap()), 3);
    }

    #[tokio::test]
    async fn sqlite_backend_persists_history() {
        let dir = tempfile::tempdir().unwrap();
        let config = AppConfig {
            session_backend: SessionBackend::Sqlite,
            ..config_in(&dir)
        };
        let ctx = build_context(&config).unwrap();
        ctx.sessions
            .append("s", vec![crate::models::Turn::user("hi")])
            .await
            .unwrap();

        let reopened = build_context(&config).unwrap();
        assert_eq!(reopened.sessions.get("s").await.unwrap().len(), 1);
    }

    #[test]
    fn llm_planner_builds_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config_in(&dir);
        config.planner = PlannerKind::Llm;
        config.completion.api_key = Some("test-key".into());
        assert!(build_planner(&config).is_ok());
    }
}
