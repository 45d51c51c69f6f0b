//! Persistent CLI settings.
//!
//! Settings live in `~/.servicekit/config.toml` and fill in whatever the
//! command line and environment leave unset. Passwords are never stored.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::output::{self, OutputFormat};

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Store a setting
    Set { key: ConfigKey, value: String },

    /// Forget a setting
    Unset { key: ConfigKey },

    /// Print one setting
    Get { key: ConfigKey },

    /// Print every stored setting
    Show,

    /// Print the settings file location
    Path,
}

/// Settings the CLI knows how to store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ConfigKey {
    /// Server base URL
    ApiUrl,
    /// Mount point of the admin API
    AdminPath,
    /// Basic auth user
    User,
}

#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CliConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub admin_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
}

impl CliConfig {
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;
        Ok(home.join(".servicekit").join("config.toml"))
    }

    /// Settings from the default location; empty when the file is missing.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create {}", dir.display()))?;
        }
        let raw = toml::to_string_pretty(self).context("Failed to serialize settings")?;
        std::fs::write(path, raw).with_context(|| format!("Failed to write {}", path.display()))
    }

    pub fn get(&self, key: ConfigKey) -> Option<&str> {
        self.slot(key).as_deref()
    }

    pub fn set(&mut self, key: ConfigKey, value: Option<String>) {
        *self.slot_mut(key) = value;
    }

    fn slot(&self, key: ConfigKey) -> &Option<String> {
        match key {
            ConfigKey::ApiUrl => &self.api_url,
            ConfigKey::AdminPath => &self.admin_path,
            ConfigKey::User => &self.user,
        }
    }

    fn slot_mut(&mut self, key: ConfigKey) -> &mut Option<String> {
        match key {
            ConfigKey::ApiUrl => &mut self.api_url,
            ConfigKey::AdminPath => &mut self.admin_path,
            ConfigKey::User => &mut self.user,
        }
    }
}

fn key_name(key: ConfigKey) -> String {
    key.to_possible_value()
        .map(|v| v.get_name().to_string())
        .unwrap_or_else(|| format!("{:?}", key))
}

pub async fn execute(cmd: ConfigCommands, format: OutputFormat) -> Result<()> {
    let path = CliConfig::default_path()?;

    match cmd {
        ConfigCommands::Set { key, value } => {
            let mut cfg = CliConfig::load_from(&path)?;
            cfg.set(key, Some(value.clone()));
            cfg.save_to(&path)?;
            output::print_success(&format!("{} = {}", key_name(key), value));
        }

        ConfigCommands::Unset { key } => {
            let mut cfg = CliConfig::load_from(&path)?;
            cfg.set(key, None);
            cfg.save_to(&path)?;
            output::print_success(&format!("{} unset", key_name(key)));
        }

        ConfigCommands::Get { key } => {
            let cfg = CliConfig::load_from(&path)?;
            let Some(value) = cfg.get(key) else {
                anyhow::bail!("{} is not set", key_name(key));
            };
            if format.is_table() {
                println!("{}", value);
            } else {
                let entry = std::collections::BTreeMap::from([(key_name(key), value)]);
                output::print_item(&entry, format)?;
            }
        }

        ConfigCommands::Show => {
            let cfg = CliConfig::load_from(&path)?;
            if !format.is_table() {
                return output::print_item(&cfg, format);
            }

            let keys = [ConfigKey::ApiUrl, ConfigKey::AdminPath, ConfigKey::User];
            let names: Vec<String> = keys.iter().map(|k| key_name(*k)).collect();
            let fields: Vec<(&str, &str)> = keys
                .iter()
                .zip(&names)
                .map(|(key, name)| (name.as_str(), cfg.get(*key).unwrap_or("-")))
                .collect();
            output::print_fields(&path.display().to_string(), &fields);
        }

        ConfigCommands::Path => println!("{}", path.display()),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = CliConfig::load_from(&dir.path().join("config.toml")).unwrap();
        assert_eq!(cfg, CliConfig::default());
    }

    #[test]
    fn test_settings_survive_save() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut cfg = CliConfig::default();
        cfg.set(ConfigKey::ApiUrl, Some("http://authz:8080".into()));
        cfg.set(ConfigKey::User, Some("root".into()));
        cfg.save_to(&path).unwrap();

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("api-url = \"http://authz:8080\""));
        assert!(!raw.contains("admin-path"));

        let loaded = CliConfig::load_from(&path).unwrap();
        assert_eq!(loaded.get(ConfigKey::User), Some("root"));
        assert_eq!(loaded.get(ConfigKey::AdminPath), None);
    }

    #[test]
    fn test_unknown_keys_rejected_by_name() {
        assert_eq!(key_name(ConfigKey::AdminPath), "admin-path");
        assert!(ConfigKey::from_str("password", true).is_err());
    }
}
