//! Shared state for the HTTP layer.

use std::sync::Arc;
use std::time::Duration;

use crate::db::Database;
use crate::pipeline::{ChangeNotifier, Orchestrator};
use crate::session::{SessionLocks, SessionStore};

/// Shared context for all routes, cloned into every handler.
#[derive(Clone)]
pub struct ApiContext {
    pub db: Database,
    pub sessions: Arc<dyn SessionStore>,
    pub locks: SessionLocks,
    pub orchestrator: Arc<Orchestrator>,
    pub notifier: ChangeNotifier,
    /// Upper bound on one chat workflow before it is cancelled.
    pub request_deadline: Duration,
}

impl ApiContext {
    pub fn new(
        db: Database,
        sessions: Arc<dyn SessionStore>,
        orchestrator: Arc<Orchestrator>,
        request_deadline: Duration,
    ) -> Self {
        let notifier = orchestrator.notifier().clone();
        Self {
            db,
            sessions,
            locks: SessionLocks::new(),
            orchestrator,
            notifier,
            request_deadline,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::sqlite::tests::seeded_database;
    use crate::pipeline::executor::StatementExecutor;
    use crate::pipeline::planner::{RuleBasedPlanner, StatementPlanner};
    use crate::session::InMemorySessionStore;
    use tempfile::TempDir;

    /// Context over a seeded temp database with the given planner.
    pub(crate) fn context_with(planner: Arc<dyn StatementPlanner>) -> (TempDir, ApiContext) {
        let (dir, db) = seeded_database();
        let orchestrator = Orchestrator::new(
            planner,
            StatementExecutor::new(db.clone()),
            ChangeNotifier::new(),
        );
        let ctx = ApiContext::new(
            db,
            Arc::new(InMemorySessionStore::new(20)),
            Arc::new(orchestrator),
            Duration::from_secs(5),
        );
        (dir, ctx)
    }

    pub(crate) fn test_context() -> (TempDir, ApiContext) {
        context_with(Arc::new(RuleBasedPlanner::new()))
    }

    #[test]
    fn notifier_is_shared_with_orchestrator() {
        let (_dir, ctx) = test_context();
        let (_id, _rx) = ctx.notifier.register();
        assert_eq!(ctx.orchestrator.notifier().observer_count(), 1);
    }
}
