//! Stream descriptor shared between a producer and its consumers.
//!
//! The JSON form uses the keys `topic`, `heartbeatTopic` and
//! `heartbeatInterval` (nanoseconds), so a producer can hand its descriptor
//! to consumers over the bus.

use crate::error::StreamError;
use crate::MIN_HEARTBEAT_INTERVAL;
use hub_bus::{Topic, TopicError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Subjects and timing of one producer instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    #[serde(rename = "topic")]
    stream_topic: Topic,
    #[serde(rename = "heartbeatTopic")]
    heartbeat_topic: Topic,
    #[serde(rename = "heartbeatInterval", with = "duration_nanos")]
    heartbeat_interval: Duration,
}

impl StreamInfo {
    /// Derive a fresh stream and heartbeat subject pair from `topic`.
    pub fn derive(topic: &Topic, heartbeat_interval: Duration) -> Result<Self, TopicError> {
        Ok(Self {
            stream_topic: topic.stream()?,
            heartbeat_topic: topic.heartbeat()?,
            heartbeat_interval,
        })
    }

    /// `T.STREAM.<uuid>`; events travel on its `REQ` subject.
    #[must_use]
    pub fn stream_topic(&self) -> &Topic {
        &self.stream_topic
    }

    /// `T.HEARTBEAT.<uuid>`; probes travel on its `REQ` subject.
    #[must_use]
    pub fn heartbeat_topic(&self) -> &Topic {
        &self.heartbeat_topic
    }

    #[must_use]
    pub fn heartbeat_interval(&self) -> Duration {
        self.heartbeat_interval
    }

    /// Reject descriptors a consumer cannot safely follow.
    ///
    /// A descriptor usually arrives from a peer, so its interval is checked
    /// against the same floor as [`StreamConfig`](crate::StreamConfig).
    pub fn validate(&self) -> Result<(), StreamError> {
        if self.heartbeat_interval < MIN_HEARTBEAT_INTERVAL {
            return Err(StreamError::Config(format!(
                "heartbeatInterval {:?} is below the minimum of {MIN_HEARTBEAT_INTERVAL:?}",
                self.heartbeat_interval
            )));
        }
        Ok(())
    }

    /// How often a consumer probes the producer.
    #[must_use]
    pub fn probe_period(&self) -> Duration {
        self.heartbeat_interval / 3
    }
}

/// Body of heartbeat probes and acknowledgements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Heartbeat {}

mod duration_nanos {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        let nanos = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        serializer.serialize_u64(nanos)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_nanos)
    }
}
