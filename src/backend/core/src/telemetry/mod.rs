//! Telemetry: structured logging setup.
//!
//! Metrics are emitted through the `metrics` facade throughout the crate;
//! installing a recorder is left to the host service.
//!
//! # Example
//!
//! ```rust,no_run
//! use servicekit_core::config::BaseConfig;
//! use servicekit_core::telemetry::{init_logging, LoggingConfig};
//!
//! let base = BaseConfig::default();
//! let config = LoggingConfig::from_base("docs", env!("CARGO_PKG_VERSION"), &base);
//! let _root = init_logging(&config)?.entered();
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod logging;

pub use logging::{init_logging, root_span, LogFormat, LoggingConfig};
