//! Best-effort change broadcast to connected observers.
//!
//! Each observer owns a bounded channel. Sends never wait: a full channel
//! drops the event for that observer, a closed one is pruned.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::models::EntityTable;

/// Buffered events per observer before new ones are dropped.
const OBSERVER_BUFFER: usize = 32;

pub const CHANGE_MESSAGE: &str = "Data updated via chatbot";

/// Pushed to observers after a committed change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub table: EntityTable,
    pub action: String,
    pub message: String,
}

impl ChangeEvent {
    pub fn refresh(table: EntityTable) -> Self {
        Self {
            table,
            action: "refresh".to_string(),
            message: CHANGE_MESSAGE.to_string(),
        }
    }
}

#[derive(Clone, Default)]
pub struct ChangeNotifier {
    observers: Arc<Mutex<HashMap<String, mpsc::Sender<ChangeEvent>>>>,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new observer. Returns its id and the receiving end.
    pub fn register(&self) -> (String, mpsc::Receiver<ChangeEvent>) {
        let (tx, rx) = mpsc::channel(OBSERVER_BUFFER);
        let id = uuid::Uuid::new_v4().to_string();
        if let Ok(mut observers) = self.observers.lock() {
            observers.insert(id.clone(), tx);
        }
        tracing::debug!(observer = %id, "Observer registered");
        (id, rx)
    }

    pub fn unregister(&self, id: &str) {
        if let Ok(mut observers) = self.observers.lock() {
            observers.remove(id);
        }
    }

    pub fn observer_count(&self) -> usize {
        self.observers.lock().map(|o| o.len()).unwrap_or(0)
    }

    /// Broadcast a refresh for one table. Returns how many observers accepted it.
    pub fn notify(&self, table: EntityTable) -> usize {
        let Ok(mut observers) = self.observers.lock() else {
            tracing::warn!(table = %table, "Observer registry unavailable, notification dropped");
            return 0;
        };

        let event = ChangeEvent::refresh(table);
        let mut delivered = 0;
        observers.retain(|id, tx| match tx.try_send(event.clone()) {
            Ok(()) => {
                delivered += 1;
                true
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(observer = %id, table = %table, "Observer lagging, event dropped");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(observer = %id, "Pruning closed observer");
                false
            }
        });

        tracing::debug!(table = %table, delivered, "Change broadcast");
        delivered
    }

    /// One broadcast per affected table.
    pub fn notify_all(&self, tables: &[EntityTable]) {
        for table in tables {
            self.notify(*table);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn every_observer_receives_refresh() {
        let notifier = ChangeNotifier::new();
        let (_a, mut rx_a) = notifier.register();
        let (_b, mut rx_b) = notifier.register();

        assert_eq!(notifier.notify(EntityTable::Billing), 2);

        let event = rx_a.recv().await.unwrap();
        assert_eq!(event, ChangeEvent::refresh(EntityTable::Billing));
        assert_eq!(rx_b.recv().await.unwrap().action, "refresh");
    }

    #[tokio::test]
    async fn closed_observers_are_pruned() {
        let notifier = ChangeNotifier::new();
        let (_id, rx) = notifier.register();
        drop(rx);
        assert_eq!(notifier.notify(EntityTable::Patients), 0);
        assert_eq!(notifier.observer_count(), 0);
    }

    #[tokio::test]
    async fn full_observer_does_not_block() {
        let notifier = ChangeNotifier::new();
        let (_id, _rx) = notifier.register();
        for _ in 0..OBSERVER_BUFFER {
            notifier.notify(EntityTable::Visits);
        }
        assert_eq!(notifier.notify(EntityTable::Visits), 0);
        assert_eq!(notifier.observer_count(), 1);
    }

    #[test]
    fn event_wire_format() {
        let json = serde_json::to_value(ChangeEvent::refresh(EntityTable::Prescriptions)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "table": "prescriptions",
                "action": "refresh",
                "message": "Data updated via chatbot"
            })
        );
    }

    #[test]
    fn notify_all_without_observers_is_noop() {
        let notifier = ChangeNotifier::new();
        notifier.notify_all(&[EntityTable::Patients, EntityTable::Billing]);
        let (id, _rx) = notifier.register();
        notifier.unregister(&id);
        assert_eq!(notifier.observer_count(), 0);
    }
}
