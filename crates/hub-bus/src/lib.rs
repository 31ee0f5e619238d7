//! # Hub Bus - Topic-Addressed Messaging
//!
//! A transport-agnostic messaging layer with three patterns on top of a
//! pluggable [`Transport`]:
//!
//! ```text
//! ┌──────────────┐   request(T)   ┌───────────┐   T.REQ    ┌──────────────┐
//! │  Requester   │ ─────────────► │           │ ─────────► │  Subscriber  │
//! │              │ ◄───────────── │ Transport │ ◄───────── │  (respond)   │
//! └──────────────┘  T.RES.<uuid>  │           │            └──────────────┘
//!                                 │           │   T.REQ    ┌──────────────┐
//!                                 │           │ ─────────► │  Listeners   │
//!                                 └───────────┘  (all)     └──────────────┘
//! ```
//!
//! ## Subjects
//!
//! Subjects are derived from a [`Topic`] by appending segments: `REQ` for
//! requests and publishes, `RES.<uuid>` for a single reply, `RES.*` for
//! observing all replies. See [`topic`].
//!
//! ## Delivery
//!
//! - `subscribe`: competing consumers, each message handled once per queue group
//! - `listen`: broadcast, never replyable
//! - duplicate envelope IDs are dropped within the de-duplication window

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod bus;
pub mod config;
pub mod context;
pub mod dedup;
pub mod envelope;
pub mod error;
pub mod registry;
pub mod serializer;
pub mod stream;
pub mod topic;
pub mod transport;

use std::time::Duration;

pub use bus::{Bus, MessageHandler};
pub use config::BusConfig;
pub use context::Context;
pub use dedup::RecentIdCache;
pub use envelope::{Envelope, Payload};
pub use error::BusError;
pub use registry::{SubscriptionInfo, SubscriptionMode};
pub use serializer::{
    BinarySerializer, BusSerializer, JsonSerializer, SerializationError, SerializationFormat,
};
pub use stream::ContextStream;
pub use topic::{Topic, TopicError};
pub use transport::{
    subject_matches, InMemoryTransport, InboundSubscription, SubscriptionId, Transport,
    TransportError, TransportStats,
};

/// Default capacity of each subscription's inbound channel.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;

/// Default time a request waits for its reply.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(5);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        assert_eq!(DEFAULT_REQUEST_TIMEOUT, Duration::from_secs(5));
        assert_eq!(BusConfig::default().default_timeout, DEFAULT_REQUEST_TIMEOUT);
    }
}
