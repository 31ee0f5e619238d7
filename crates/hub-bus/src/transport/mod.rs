//! # Transport
//!
//! The connection the bus runs over. Implementations supply two delivery
//! modes for inbound subscriptions:
//!
//! - **subscribe**: competing consumers. Within one queue group each message
//!   reaches exactly one subscriber.
//! - **listen**: broadcast. Every listener receives every message.
//!
//! Inbound messages arrive on an `mpsc` channel. `unsubscribe` is idempotent
//! and closes the channel of every named subscription.

mod in_memory;

pub use in_memory::{subject_matches, InMemoryTransport, TransportStats, DEFAULT_QUEUE_GROUP};

use crate::envelope::Envelope;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Errors reported by a transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TransportError {
    /// The transport connection has been shut down.
    #[error("Transport connection closed")]
    Closed,

    #[error("Invalid subject: {0:?}")]
    InvalidSubject(String),

    #[error("Subscribe to {subject} failed: {reason}")]
    Subscribe { subject: String, reason: String },

    #[error("Publish to {subject} failed: {reason}")]
    Publish { subject: String, reason: String },

    #[error("Unsubscribe failed: {0}")]
    Unsubscribe(String),
}

/// Opaque identifier of an inbound subscription.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubscriptionId(String);

impl SubscriptionId {
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SubscriptionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Subscription handle returned by a transport.
#[derive(Debug)]
pub struct InboundSubscription {
    pub id: SubscriptionId,
    pub messages: mpsc::Receiver<Envelope>,
}

/// Connection to a publish/subscribe substrate.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Competing-consumer subscription within the connection's queue group.
    async fn subscribe(&self, subject: &str) -> Result<InboundSubscription, TransportError>;

    /// Broadcast subscription.
    async fn listen(&self, subject: &str) -> Result<InboundSubscription, TransportError>;

    async fn publish(&self, envelope: Envelope) -> Result<(), TransportError>;

    /// Cancel subscriptions, closing their inbound channels. Unknown IDs are ignored.
    async fn unsubscribe(&self, ids: &[SubscriptionId]) -> Result<(), TransportError>;
}
