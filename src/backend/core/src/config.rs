//! Configuration management.
//!
//! Every service shares [`BaseConfig`] and layers its own settings on top by
//! flattening it into a larger struct:
//!
//! ```rust,ignore
//! #[derive(Deserialize)]
//! struct DocsConfig {
//!     #[serde(flatten)]
//!     base: BaseConfig,
//!     storage_dir: String,
//! }
//!
//! impl HasBaseConfig for DocsConfig {
//!     fn base(&self) -> &BaseConfig { &self.base }
//! }
//!
//! let cfg: DocsConfig = ConfigLoader::new("docs")
//!     .default("storage_dir", "/var/lib/docs")
//!     .load()?;
//! ```
//!
//! Sources, lowest precedence first:
//!
//! 1. built-in [`BaseConfig`] defaults
//! 2. defaults registered with [`ConfigLoader::default`]
//! 3. `/etc/servicekit/<service>.yml`
//! 4. `~/.servicekit/<service>.yml`
//! 5. `./<service>.yml`
//! 6. `SERVICEKIT_*` environment variables (`__` separates nested keys)

use std::path::PathBuf;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "SERVICEKIT";

/// Directory name used under `/etc` and the home directory.
pub const CONFIG_DIR: &str = "servicekit";

const LOG_LEVELS: [&str; 4] = ["debug", "info", "warn", "error"];

/// Settings every service has.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseConfig {
    /// Pretty console logs instead of JSON
    #[serde(default)]
    pub human_readable_output: bool,

    /// One of debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default = "default_production_environment")]
    pub production_environment: bool,

    /// HTTP listen port
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for BaseConfig {
    fn default() -> Self {
        Self {
            human_readable_output: false,
            log_level: default_log_level(),
            production_environment: default_production_environment(),
            port: default_port(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_production_environment() -> bool {
    true
}

fn default_port() -> u16 {
    8080
}

impl BaseConfig {
    /// Violations of the shared rules, one message per field.
    pub fn violations(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            errors.push(format!(
                "Field 'log_level' must be one of the following: {}",
                LOG_LEVELS.join(" ")
            ));
        }
        if self.port == 0 {
            errors.push("Field 'port' must be at least 1".to_string());
        }

        errors
    }
}

/// Implemented by every service config that embeds [`BaseConfig`].
pub trait HasBaseConfig {
    fn base(&self) -> &BaseConfig;

    /// Service specific checks, run after the shared ones.
    fn validate(&self) -> Vec<String> {
        Vec::new()
    }
}

impl HasBaseConfig for BaseConfig {
    fn base(&self) -> &BaseConfig {
        self
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Config is invalid: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

// ═══════════════════════════════════════════════════════════════════════════════
// Loader
// ═══════════════════════════════════════════════════════════════════════════════

/// Layered configuration loader for one service.
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    service: String,
    defaults: Vec<(String, config::Value)>,
    search_paths: Vec<PathBuf>,
    env_prefix: String,
}

impl ConfigLoader {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
            defaults: Vec::new(),
            search_paths: default_search_paths(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Register a default that overrides the built-in one.
    pub fn default(mut self, key: impl Into<String>, value: impl Into<config::Value>) -> Self {
        self.defaults.push((key.into(), value.into()));
        self
    }

    /// Replace the directories searched for `<service>.yml`, lowest
    /// precedence first.
    pub fn search_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.search_paths = paths;
        self
    }

    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Merge every source, deserialize and validate.
    pub fn load<T>(&self) -> Result<T, ConfigError>
    where
        T: DeserializeOwned + HasBaseConfig,
    {
        let base = BaseConfig::default();
        let mut builder = config::Config::builder()
            .set_default("human_readable_output", base.human_readable_output)?
            .set_default("log_level", base.log_level)?
            .set_default("production_environment", base.production_environment)?
            .set_default("port", i64::from(base.port))?;

        for (key, value) in &self.defaults {
            builder = builder.set_default(key.as_str(), value.clone())?;
        }

        let file_name = format!("{}.yml", self.service);
        for dir in &self.search_paths {
            let path = dir.join(&file_name);
            debug!(path = %path.display(), "Config file candidate");
            builder = builder.add_source(
                config::File::from(path)
                    .format(config::FileFormat::Yaml)
                    .required(false),
            );
        }

        builder = builder.add_source(
            config::Environment::with_prefix(&self.env_prefix)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let cfg: T = builder.build()?.try_deserialize()?;

        let mut errors = cfg.base().violations();
        errors.extend(cfg.validate());
        if !errors.is_empty() {
            return Err(ConfigError::Invalid(errors));
        }

        Ok(cfg)
    }
}

fn default_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from("/etc").join(CONFIG_DIR)];
    if let Some(home) = dirs::home_dir() {
        paths.push(home.join(format!(".{}", CONFIG_DIR)));
    }
    paths.push(PathBuf::from("."));
    paths
}

// ═══════════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════════
