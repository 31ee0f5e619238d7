//! # Hub Telemetry
//!
//! Structured logging for hub services, built on `tracing-subscriber`.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use hub_telemetry::{init_logging, TelemetryConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging(&TelemetryConfig::from_env())?;
//!     // Bus and streamer logs are now emitted.
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HUB_SERVICE_NAME` | `hub` | Service name attached to the startup log |
//! | `HUB_LOG_LEVEL` / `RUST_LOG` | `info` | Log level filter |
//! | `HUB_JSON_LOGS` | `false` | Emit JSON lines instead of human output |
//! | `HUB_CONSOLE_OUTPUT` | `true` | Write logs to stdout at all |

mod config;
mod logging;

pub use config::TelemetryConfig;
pub use logging::{init_logging, init_test_logging};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid log filter '{filter}': {reason}")]
    Filter { filter: String, reason: String },

    #[error("Failed to install subscriber: {0}")]
    Init(String),
}
