//! Bus configuration.
//!
//! # Example
//!
//! ```ignore
//! use hub_bus::{BusConfig, SerializationFormat};
//! use std::time::Duration;
//!
//! let config = BusConfig::from_env()
//!     .with_default_timeout(Duration::from_secs(2))
//!     .with_serialization(SerializationFormat::Binary);
//! config.validate()?;
//! ```

use crate::dedup::RecentIdCache;
use crate::error::BusError;
use crate::serializer::SerializationFormat;
use crate::DEFAULT_REQUEST_TIMEOUT;
use std::env;
use std::time::Duration;
use tokio::sync::Semaphore;

/// Default bound on concurrently running handler tasks per bus.
pub const DEFAULT_MAX_CONCURRENT_HANDLERS: usize = 1024;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusConfig {
    /// How long `request` waits for a reply.
    pub default_timeout: Duration,
    /// Payload codec.
    pub serialization: SerializationFormat,
    /// Handler tasks allowed to run at once across all subscriptions.
    pub max_concurrent_handlers: usize,
    /// How long envelope IDs are remembered for de-duplication.
    pub dedup_window: Duration,
}

impl Default for BusConfig {
    fn default() -> Self {
        Self {
            default_timeout: DEFAULT_REQUEST_TIMEOUT,
            serialization: SerializationFormat::Json,
            max_concurrent_handlers: DEFAULT_MAX_CONCURRENT_HANDLERS,
            dedup_window: RecentIdCache::DEFAULT_WINDOW,
        }
    }
}

impl BusConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `HUB_REQUEST_TIMEOUT_MS`: request timeout (default: 5000)
    /// - `HUB_SERIALIZER`: `json` or `binary` (default: json)
    /// - `HUB_MAX_CONCURRENT_HANDLERS`: handler bound (default: 1024)
    /// - `HUB_DEDUP_WINDOW_SECS`: de-duplication window (default: 120)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            default_timeout: env::var("HUB_REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_millis)
                .unwrap_or(defaults.default_timeout),

            serialization: env::var("HUB_SERIALIZER")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.serialization),

            max_concurrent_handlers: env::var("HUB_MAX_CONCURRENT_HANDLERS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.max_concurrent_handlers),

            dedup_window: env::var("HUB_DEDUP_WINDOW_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.dedup_window),
        }
    }

    pub fn validate(&self) -> Result<(), BusError> {
        if self.default_timeout.is_zero() {
            return Err(BusError::Config(
                "default_timeout must be greater than 0".to_string(),
            ));
        }

        if self.max_concurrent_handlers == 0 || self.max_concurrent_handlers > Semaphore::MAX_PERMITS
        {
            return Err(BusError::Config(format!(
                "max_concurrent_handlers must be between 1 and {}",
                Semaphore::MAX_PERMITS
            )));
        }

        Ok(())
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout;
        self
    }

    pub fn with_serialization(mut self, format: SerializationFormat) -> Self {
        self.serialization = format;
        self
    }

    pub fn with_max_concurrent_handlers(mut self, max: usize) -> Self {
        self.max_concurrent_handlers = max;
        self
    }

    pub fn with_dedup_window(mut self, window: Duration) -> Self {
        self.dedup_window = window;
        self
    }
}
