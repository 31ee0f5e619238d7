//! Telemetry configuration from environment variables.

use std::env;

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelemetryConfig {
    /// Service name recorded when logging starts
    pub service_name: String,

    /// Log level filter (trace, debug, info, warn, error, or an `EnvFilter` directive)
    pub log_level: String,

    /// Whether to enable JSON formatted logs
    pub json_logs: bool,

    /// Whether to write logs to stdout
    pub console_output: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "hub".to_string(),
            log_level: "info".to_string(),
            json_logs: false,
            console_output: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `HUB_SERVICE_NAME`: Service name (default: hub)
    /// - `HUB_LOG_LEVEL` or `RUST_LOG`: Log level (default: info)
    /// - `HUB_JSON_LOGS`: Enable JSON logs (default: false)
    /// - `HUB_CONSOLE_OUTPUT`: Enable console output (default: true)
    pub fn from_env() -> Self {
        Self {
            service_name: env::var("HUB_SERVICE_NAME").unwrap_or_else(|_| "hub".to_string()),

            log_level: env::var("HUB_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),

            json_logs: env::var("HUB_JSON_LOGS")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),

            console_output: env::var("HUB_CONSOLE_OUTPUT")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(true),
        }
    }

    /// Configuration for one named service.
    pub fn for_service(name: &str) -> Self {
        Self {
            service_name: name.to_string(),
            ..Self::from_env()
        }
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_json_logs(mut self, enabled: bool) -> Self {
        self.json_logs = enabled;
        self
    }
}
