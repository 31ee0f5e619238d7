//! Stream configuration.

use crate::error::StreamError;
use crate::{DEFAULT_BUFFER_CAPACITY, DEFAULT_HEARTBEAT_INTERVAL, MIN_HEARTBEAT_INTERVAL};
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConfig {
    /// Producer closes when no probe arrives within this interval.
    pub heartbeat_interval: Duration,
    /// Events a consumer keeps before evicting the oldest.
    pub buffer_capacity: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval: DEFAULT_HEARTBEAT_INTERVAL,
            buffer_capacity: DEFAULT_BUFFER_CAPACITY,
        }
    }
}

impl StreamConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `HUB_HEARTBEAT_INTERVAL_MS`: heartbeat interval (default: 6000)
    /// - `HUB_STREAM_BUFFER`: consumer buffer capacity (default: 50)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            heartbeat_interval: env::var("HUB_HEARTBEAT_INTERVAL_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.heartbeat_interval),

            buffer_capacity: env::var("HUB_STREAM_BUFFER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.buffer_capacity),
        }
    }

    pub fn validate(&self) -> Result<(), StreamError> {
        if self.heartbeat_interval < MIN_HEARTBEAT_INTERVAL {
            return Err(StreamError::Config(format!(
                "heartbeat_interval must be at least {MIN_HEARTBEAT_INTERVAL:?}"
            )));
        }

        self.validate_buffer()
    }

    /// Check only the consumer-side setting.
    pub fn validate_buffer(&self) -> Result<(), StreamError> {
        if self.buffer_capacity == 0 {
            return Err(StreamError::Config(
                "buffer_capacity must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn with_heartbeat_interval(mut self, interval: Duration) -> Self {
        self.heartbeat_interval = interval;
        self
    }

    pub fn with_buffer_capacity(mut self, capacity: usize) -> Self {
        self.buffer_capacity = capacity;
        self
    }
}
