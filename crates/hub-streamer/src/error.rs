//! Error types for hub-streamer.

use hub_bus::{BusError, TopicError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StreamError {
    #[error(transparent)]
    Bus(#[from] BusError),

    #[error(transparent)]
    Topic(#[from] TopicError),

    #[error("stream is closed")]
    Closed,

    #[error("invalid stream configuration: {0}")]
    Config(String),
}
