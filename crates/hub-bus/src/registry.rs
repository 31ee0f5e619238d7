//! # Subscription Registry
//!
//! Tracks the active subscriptions of one bus. Each entry holds the closing
//! half of a signal observed by the subscription's [`ContextStream`]:
//! removing the entry ends the stream, which terminates its dispatch task
//! even if the transport never closes the channel.
//!
//! [`ContextStream`]: crate::ContextStream

use crate::error::BusError;
use crate::transport::SubscriptionId;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::debug;

/// Delivery mode of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionMode {
    /// Competing consumer: each message reaches one subscriber.
    Subscribe,
    /// Broadcast observer: every listener sees every message, without reply.
    Listen,
}

/// Snapshot of a registered subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub id: SubscriptionId,
    pub subject: String,
    pub mode: SubscriptionMode,
    pub created_at: Instant,
}

struct Entry {
    info: SubscriptionInfo,
    /// Dropped on removal, ending the subscription's stream.
    _closer: oneshot::Sender<()>,
}

/// Registry of active subscriptions, owned by one bus.
#[derive(Default)]
pub struct SubscriptionRegistry {
    entries: RwLock<HashMap<SubscriptionId, Entry>>,
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a subscription, returning the signal that fires on removal.
    ///
    /// # Errors
    ///
    /// - `BusError::Registry` - The lock is poisoned; nothing was recorded
    pub fn register(&self, info: SubscriptionInfo) -> Result<oneshot::Receiver<()>, BusError> {
        let (closer, closed) = oneshot::channel();
        let id = info.id.clone();

        self.entries
            .write()
            .map_err(|e| BusError::Registry(e.to_string()))?
            .insert(
                id.clone(),
                Entry {
                    info,
                    _closer: closer,
                },
            );

        debug!(subscription_id = %id, "Subscription registered");
        Ok(closed)
    }

    /// Remove subscriptions, returning how many were registered.
    pub fn remove(&self, ids: &[SubscriptionId]) -> usize {
        let Ok(mut entries) = self.entries.write() else {
            return 0;
        };

        ids.iter()
            .filter(|id| entries.remove(*id).is_some())
            .count()
    }

    #[must_use]
    pub fn contains(&self, id: &SubscriptionId) -> bool {
        self.entries
            .read()
            .map(|entries| entries.contains_key(id))
            .unwrap_or(false)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().map(|entries| entries.len()).unwrap_or(0)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn snapshot(&self) -> Vec<SubscriptionInfo> {
        self.entries
            .read()
            .map(|entries| entries.values().map(|entry| entry.info.clone()).collect())
            .unwrap_or_default()
    }
}
