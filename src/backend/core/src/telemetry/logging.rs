//! Structured logging with JSON or pretty output.
//!
//! - JSON format for production environments
//! - Pretty format when `human_readable_output` is set
//! - `RUST_LOG` overrides the configured level
//! - A root span carries the service name, version and host

use serde::Deserialize;
use tracing::Span;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::BaseConfig;

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Service name attached to the root span
    pub service: String,

    /// Service version attached to the root span
    pub version: String,

    /// Global log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format
    #[serde(default)]
    pub format: LogFormat,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// JSON format for production/structured logging
    #[default]
    Json,
    /// Pretty format for development
    Pretty,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    pub fn new(service: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            version: version.into(),
            level: default_log_level(),
            format: LogFormat::Json,
        }
    }

    /// Level and format taken from the shared service config.
    pub fn from_base(
        service: impl Into<String>,
        version: impl Into<String>,
        base: &BaseConfig,
    ) -> Self {
        Self {
            level: base.log_level.clone(),
            format: if base.human_readable_output {
                LogFormat::Pretty
            } else {
                LogFormat::Json
            },
            ..Self::new(service, version)
        }
    }
}

/// Install the global subscriber and return the service root span.
///
/// Enter the span (or instrument the server future with it) so every event
/// carries `service`, `version` and `host`.
///
/// # Errors
///
/// Returns an error if the level is not a valid filter or a global
/// subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<Span> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)?,
    };

    match config.format {
        LogFormat::Json => {
            let fmt_layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
        LogFormat::Pretty => {
            let fmt_layer = fmt::layer().pretty().with_target(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(fmt_layer)
                .try_init()?;
        }
    }

    Ok(root_span(config))
}

/// Span carrying the service identity fields.
pub fn root_span(config: &LoggingConfig) -> Span {
    tracing::info_span!(
        "service",
        service = %config.service,
        version = %config.version,
        host = %hostname(),
    )
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
}
