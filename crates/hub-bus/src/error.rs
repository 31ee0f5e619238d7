//! Error types for the bus.

use crate::serializer::SerializationError;
use crate::topic::TopicError;
use crate::transport::TransportError;
use std::time::Duration;
use thiserror::Error;

/// Errors surfaced by [`Bus`](crate::Bus) and [`Context`](crate::Context).
#[derive(Debug, Error)]
pub enum BusError {
    /// Illegal topic derivation (programming error).
    #[error(transparent)]
    Topic(#[from] TopicError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),

    #[error(transparent)]
    Transport(#[from] TransportError),

    /// No reply arrived within the request window.
    #[error("Request to {subject} timed out after {timeout:?}")]
    Timeout { subject: String, timeout: Duration },

    /// Error signalled by the remote handler. Displays as the remote message.
    #[error("{0}")]
    Application(String),

    /// Respond was attempted on a context that cannot be answered.
    #[error("Respond not allowed: envelope {id} is not replyable")]
    NotReplyable { id: String },

    #[error("Reply channel for {subject} closed before a response arrived")]
    ReplyChannelClosed { subject: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Subscription bookkeeping could not be updated.
    #[error("Subscription registry unavailable: {0}")]
    Registry(String),
}

impl BusError {
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Whether the error came from the remote handler rather than the bus.
    #[must_use]
    pub fn is_application(&self) -> bool {
        matches!(self, Self::Application(_))
    }
}
