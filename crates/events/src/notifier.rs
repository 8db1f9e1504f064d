//! Owner-keyed connection registry.
//!
//! Groups are keyed by owner id; each group maps connection ids to the
//! sending half of an unbounded channel. Delivery is fire-and-forget: a
//! connection that is not registered when [`CompletionNotifier::publish`]
//! runs misses the event, and nothing is buffered or replayed.

use std::collections::HashMap;

use medassist_core::job_events::CompletionEvent;
use medassist_core::types::OwnerId;
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing events to one connection.
pub type EventSender = mpsc::UnboundedSender<CompletionEvent>;

/// Receiving half handed back by [`CompletionNotifier::subscribe`].
pub type EventReceiver = mpsc::UnboundedReceiver<CompletionEvent>;

/// Publish/subscribe hub for analysis completion events.
///
/// Thread-safe via an interior `RwLock`; wrap in `Arc` and share.
#[derive(Default)]
pub struct CompletionNotifier {
    groups: RwLock<HashMap<OwnerId, HashMap<String, EventSender>>>,
}

impl CompletionNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `conn_id` in `owner_id`'s group.
    ///
    /// Several connections may share an owner (multi-device). Registering a
    /// `conn_id` that is already in the group replaces the previous handle.
    pub async fn subscribe(&self, owner_id: &str, conn_id: &str) -> EventReceiver {
        let (tx, rx) = mpsc::unbounded_channel();
        self.groups
            .write()
            .await
            .entry(owner_id.to_string())
            .or_default()
            .insert(conn_id.to_string(), tx);
        tracing::debug!(owner_id, conn_id, "Connection joined owner group");
        rx
    }

    /// Remove `conn_id` from `owner_id`'s group. Empty groups are dropped.
    pub async fn unsubscribe(&self, owner_id: &str, conn_id: &str) {
        let mut groups = self.groups.write().await;
        if let Some(group) = groups.get_mut(owner_id) {
            group.remove(conn_id);
            if group.is_empty() {
                groups.remove(owner_id);
            }
        }
    }

    /// Deliver `event` to every connection in `owner_id`'s group.
    ///
    /// Returns the number of connections the event was handed to. Closed
    /// channels are skipped silently; their connection tasks unsubscribe
    /// on exit.
    pub async fn publish(&self, owner_id: &str, event: CompletionEvent) -> usize {
        let groups = self.groups.read().await;
        let Some(group) = groups.get(owner_id) else {
            tracing::debug!(owner_id, job_id = %event.job_id, "No subscribers for owner");
            return 0;
        };

        let delivered = group
            .values()
            .filter(|sender| sender.send(event.clone()).is_ok())
            .count();

        tracing::debug!(
            owner_id,
            job_id = %event.job_id,
            kind = event.kind.as_str(),
            delivered,
            "Completion event published",
        );
        delivered
    }

    /// Number of connections in one owner's group.
    pub async fn group_size(&self, owner_id: &str) -> usize {
        self.groups
            .read()
            .await
            .get(owner_id)
            .map_or(0, HashMap::len)
    }

    /// Total number of registered connections across all groups.
    pub async fn connection_count(&self) -> usize {
        self.groups.read().await.values().map(HashMap::len).sum()
    }

    /// Drop every registration, closing all receivers.
    ///
    /// Used during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let mut groups = self.groups.write().await;
        let count: usize = groups.values().map(HashMap::len).sum();
        groups.clear();
        tracing::info!(count, "Closed all notifier subscriptions");
    }
}
