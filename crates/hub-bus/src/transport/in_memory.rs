//! # In-Memory Transport
//!
//! Single-process implementation of [`Transport`]. Several handles can share
//! one broker through [`InMemoryTransport::connect`], each with its own queue
//! group, which models several services attached to the same substrate.
//!
//! Subjects are dot-separated tokens. Subscription patterns may use `*` to
//! match exactly one token and a trailing `>` to match one or more tokens.

use super::{InboundSubscription, SubscriptionId, Transport, TransportError};
use crate::envelope::Envelope;
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

/// Default queue group for competing consumers.
pub const DEFAULT_QUEUE_GROUP: &str = "hub";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Delivery {
    Queue(String),
    Broadcast,
}

struct Route {
    /// Creation order, breaks ties between equally loaded queue members.
    seq: u64,
    pattern: String,
    delivery: Delivery,
    sender: mpsc::Sender<Envelope>,
    /// Envelopes accepted by this route.
    accepted: AtomicU64,
}

/// Delivery counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportStats {
    pub published: u64,
    pub delivered: u64,
    pub dropped: u64,
    pub active_subscriptions: usize,
}

struct Broker {
    routes: RwLock<HashMap<SubscriptionId, Route>>,
    next_seq: AtomicU64,
    published: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    closed: AtomicBool,
    capacity: usize,
}

impl Broker {
    fn new(capacity: usize) -> Self {
        Self {
            routes: RwLock::new(HashMap::new()),
            next_seq: AtomicU64::new(0),
            published: AtomicU64::new(0),
            delivered: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            closed: AtomicBool::new(false),
            capacity,
        }
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed.load(Ordering::Acquire) {
            return Err(TransportError::Closed);
        }
        Ok(())
    }

    fn add_route(
        &self,
        subject: &str,
        delivery: Delivery,
    ) -> Result<InboundSubscription, TransportError> {
        self.ensure_open()?;
        validate_subject(subject, true)?;

        let (sender, messages) = mpsc::channel(self.capacity);
        let id = SubscriptionId::generate();
        let route = Route {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            pattern: subject.to_string(),
            delivery,
            sender,
            accepted: AtomicU64::new(0),
        };

        let mut routes = self
            .routes
            .write()
            .map_err(|e| TransportError::Subscribe {
                subject: subject.to_string(),
                reason: e.to_string(),
            })?;
        routes.insert(id.clone(), route);

        debug!(subject = %subject, subscription_id = %id, "Route added");
        Ok(InboundSubscription { id, messages })
    }

    fn route(&self, envelope: Envelope) -> Result<usize, TransportError> {
        self.ensure_open()?;
        validate_subject(&envelope.topic, false)?;

        self.published.fetch_add(1, Ordering::Relaxed);

        let routes = self.routes.read().map_err(|e| TransportError::Publish {
            subject: envelope.topic.clone(),
            reason: e.to_string(),
        })?;

        let mut listeners = Vec::new();
        let mut groups: BTreeMap<&str, Vec<&Route>> = BTreeMap::new();
        for route in routes.values() {
            if !subject_matches(&route.pattern, &envelope.topic) {
                continue;
            }
            match &route.delivery {
                Delivery::Broadcast => listeners.push(route),
                Delivery::Queue(group) => groups.entry(group.as_str()).or_default().push(route),
            }
        }

        let mut receivers = 0;

        for route in listeners {
            if self.offer(route, envelope.clone()) {
                receivers += 1;
            }
        }

        // Least-loaded member first, so a group's members alternate.
        for (_, mut members) in groups {
            members.sort_by_key(|route| (route.accepted.load(Ordering::Relaxed), route.seq));
            let delivered = members
                .into_iter()
                .any(|route| self.offer(route, envelope.clone()));
            if delivered {
                receivers += 1;
            }
        }

        if receivers == 0 {
            debug!(subject = %envelope.topic, id = %envelope.id, "Envelope had no receivers");
        }
        Ok(receivers)
    }

    fn offer(&self, route: &Route, envelope: Envelope) -> bool {
        match route.sender.try_send(envelope) {
            Ok(()) => {
                route.accepted.fetch_add(1, Ordering::Relaxed);
                self.delivered.fetch_add(1, Ordering::Relaxed);
                true
            }
            Err(TrySendError::Full(envelope)) => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                warn!(
                    subject = %envelope.topic,
                    pattern = %route.pattern,
                    "Envelope dropped (slow consumer)"
                );
                false
            }
            Err(TrySendError::Closed(_)) => false,
        }
    }

    fn remove_routes(&self, ids: &[SubscriptionId]) -> Result<(), TransportError> {
        let mut routes = self
            .routes
            .write()
            .map_err(|e| TransportError::Unsubscribe(e.to_string()))?;
        for id in ids {
            // Dropping the route drops its sender, closing the inbound channel.
            if routes.remove(id).is_some() {
                debug!(subscription_id = %id, "Route removed");
            }
        }
        Ok(())
    }
}

/// In-process transport handle.
#[derive(Clone)]
pub struct InMemoryTransport {
    broker: Arc<Broker>,
    group: String,
}

impl InMemoryTransport {
    /// Create a broker with the default channel capacity.
    #[must_use]
    pub fn new(group: impl Into<String>) -> Self {
        Self::with_capacity(group, DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a broker whose subscriptions buffer at most `capacity` envelopes.
    #[must_use]
    pub fn with_capacity(group: impl Into<String>, capacity: usize) -> Self {
        Self {
            broker: Arc::new(Broker::new(capacity.max(1))),
            group: group.into(),
        }
    }

    /// Another handle on the same broker with its own queue group.
    #[must_use]
    pub fn connect(&self, group: impl Into<String>) -> Self {
        Self {
            broker: Arc::clone(&self.broker),
            group: group.into(),
        }
    }

    #[must_use]
    pub fn group(&self) -> &str {
        &self.group
    }

    #[must_use]
    pub fn stats(&self) -> TransportStats {
        let active_subscriptions = self.broker.routes.read().map(|r| r.len()).unwrap_or(0);
        TransportStats {
            published: self.broker.published.load(Ordering::Relaxed),
            delivered: self.broker.delivered.load(Ordering::Relaxed),
            dropped: self.broker.dropped.load(Ordering::Relaxed),
            active_subscriptions,
        }
    }

    /// Close the broker for every handle, dropping all subscriptions.
    pub fn shutdown(&self) {
        self.broker.closed.store(true, Ordering::Release);
        if let Ok(mut routes) = self.broker.routes.write() {
            routes.clear();
        }
        debug!(group = %self.group, "In-memory transport shut down");
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.broker.closed.load(Ordering::Acquire)
    }
}

impl Default for InMemoryTransport {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_GROUP)
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn subscribe(&self, subject: &str) -> Result<InboundSubscription, TransportError> {
        self.broker
            .add_route(subject, Delivery::Queue(self.group.clone()))
    }

    async fn listen(&self, subject: &str) -> Result<InboundSubscription, TransportError> {
        self.broker.add_route(subject, Delivery::Broadcast)
    }

    async fn publish(&self, envelope: Envelope) -> Result<(), TransportError> {
        let subject = envelope.topic.clone();
        let receivers = self.broker.route(envelope)?;
        debug!(subject = %subject, receivers, "Envelope published");
        Ok(())
    }

    async fn unsubscribe(&self, ids: &[SubscriptionId]) -> Result<(), TransportError> {
        self.broker.remove_routes(ids)
    }
}

/// Whether `subject` is matched by the subscription `pattern`.
#[must_use]
pub fn subject_matches(pattern: &str, subject: &str) -> bool {
    let mut pattern_tokens = pattern.split('.');
    let mut subject_tokens = subject.split('.');

    loop {
        match (pattern_tokens.next(), subject_tokens.next()) {
            (None, None) => return true,
            (Some(">"), Some(_)) => return true,
            (Some("*"), Some(_)) => continue,
            (Some(p), Some(s)) if p == s => continue,
            _ => return false,
        }
    }
}

fn validate_subject(subject: &str, allow_wildcards: bool) -> Result<(), TransportError> {
    let invalid = subject.is_empty()
        || subject.split('.').any(|token| {
            token.is_empty() || (!allow_wildcards && (token == "*" || token == ">"))
        });
    if invalid {
        return Err(TransportError::InvalidSubject(subject.to_string()));
    }
    Ok(())
}
