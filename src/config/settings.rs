//! Configuration settings management
//!
//! This module handles loading configuration from multiple sources,
//! validation, and persistence.

use crate::error::{BlobCopyError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tabled::Tabled;

fn default_endpoint_suffix() -> String {
    "core.windows.net".to_string()
}

fn default_poll_interval_secs() -> u64 {
    1
}

fn default_poll_slot_count() -> usize {
    4
}

#[derive(Debug, Clone, Serialize, Deserialize, Tabled)]
pub struct Config {
    #[tabled(rename = "Debug")]
    pub debug: bool,
    #[tabled(rename = "Subscription ID")]
    pub subscription_id: String,
    #[tabled(rename = "Resource Group")]
    pub resource_group: String,
    #[tabled(rename = "Storage Account")]
    pub storage_account: String,
    #[tabled(rename = "Endpoint Suffix")]
    #[serde(default = "default_endpoint_suffix")]
    pub endpoint_suffix: String,
    #[tabled(skip)]
    #[serde(default)]
    pub access_key: String,
    #[tabled(skip)]
    #[serde(default)]
    pub sas_token: String,
    #[tabled(rename = "Poll Interval (s)")]
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[tabled(rename = "Poll Slots")]
    #[serde(default = "default_poll_slot_count")]
    pub poll_slot_count: usize,
    #[tabled(rename = "JSON Output")]
    #[serde(default)]
    pub output_json: bool,
    #[tabled(rename = "No Color")]
    #[serde(default)]
    pub no_color: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            debug: false,
            subscription_id: String::new(),
            resource_group: String::new(),
            storage_account: String::new(),
            endpoint_suffix: default_endpoint_suffix(),
            access_key: String::new(),
            sas_token: String::new(),
            poll_interval_secs: default_poll_interval_secs(),
            poll_slot_count: default_poll_slot_count(),
            output_json: false,
            no_color: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        if self.storage_account.is_empty() {
            return Err(BlobCopyError::config(
                "Storage account is required. Set AZURE_STORAGE_ACCOUNT or run 'bcp config set storage_account <name>'.",
            ));
        }

        if self.poll_slot_count == 0 {
            return Err(BlobCopyError::config("Poll slot count must be at least 1"));
        }

        Ok(())
    }

    pub fn get_config_path() -> Result<PathBuf> {
        // Use XDG Base Directory specification on Linux and macOS
        #[cfg(any(target_os = "linux", target_os = "macos"))]
        {
            use std::env;
            let config_dir = if let Ok(xdg_config_home) = env::var("XDG_CONFIG_HOME") {
                PathBuf::from(xdg_config_home)
            } else {
                let home_dir = env::var("HOME")
                    .map_err(|_| BlobCopyError::config("HOME environment variable not set"))?;
                PathBuf::from(home_dir).join(".config")
            };
            Ok(config_dir.join("bcp").join("bcp.conf"))
        }

        #[cfg(not(any(target_os = "linux", target_os = "macos")))]
        {
            let config_dir = dirs::config_dir()
                .ok_or_else(|| BlobCopyError::config("Unable to determine config directory"))?;
            Ok(config_dir.join("bcp").join("bcp.conf"))
        }
    }

    pub async fn save(&self) -> Result<()> {
        let path = Self::get_config_path()?;
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| BlobCopyError::config(format!("Failed to serialize config: {e}")))?;
        tokio::fs::write(&path, contents).await?;

        Ok(())
    }

    /// Apply a `config set` assignment
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "subscription_id" => self.subscription_id = value.to_string(),
            "resource_group" => self.resource_group = value.to_string(),
            "storage_account" => self.storage_account = value.to_string(),
            "endpoint_suffix" => self.endpoint_suffix = value.to_string(),
            "access_key" => self.access_key = value.to_string(),
            "sas_token" => self.sas_token = value.to_string(),
            "poll_interval_secs" => {
                self.poll_interval_secs = value.parse().map_err(|_| {
                    BlobCopyError::config(format!("'{value}' is not a valid interval in seconds"))
                })?
            }
            "poll_slot_count" => {
                self.poll_slot_count = value.parse().map_err(|_| {
                    BlobCopyError::config(format!("'{value}' is not a valid slot count"))
                })?
            }
            "debug" => self.debug = value.eq_ignore_ascii_case("true") || value == "1",
            other => {
                return Err(BlobCopyError::config(format!(
                    "Unknown configuration key '{other}'"
                )))
            }
        }
        Ok(())
    }
}

/// Load configuration from file and environment, then validate
pub async fn load_config() -> Result<Config> {
    let config = load_config_unvalidated().await?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from file and environment without validation
pub async fn load_config_unvalidated() -> Result<Config> {
    let mut config = Config::default();

    let config_path = Config::get_config_path()?;
    if config_path.exists() {
        config = load_from_file(&config_path).await?;
    }

    load_from_env(&mut config);

    Ok(config)
}

async fn load_from_file(path: &PathBuf) -> Result<Config> {
    let contents = tokio::fs::read_to_string(path).await?;

    // Try to parse as TOML first, then JSON as fallback
    if let Ok(config) = toml::from_str::<Config>(&contents) {
        return Ok(config);
    }

    let config = serde_json::from_str::<Config>(&contents)?;
    Ok(config)
}

fn load_from_env(config: &mut Config) {
    if let Ok(value) = std::env::var("DEBUG") {
        config.debug = value.to_lowercase() == "true" || value == "1";
    }

    if let Ok(value) = std::env::var("AZURE_SUBSCRIPTION_ID") {
        config.subscription_id = value;
    }

    if let Ok(value) = std::env::var("AZURE_RESOURCE_GROUP") {
        config.resource_group = value;
    }

    if let Ok(value) = std::env::var("AZURE_STORAGE_ACCOUNT") {
        config.storage_account = value;
    }

    if let Ok(value) = std::env::var("AZURE_STORAGE_KEY") {
        config.access_key = value;
    }

    if let Ok(value) = std::env::var("AZURE_STORAGE_SAS_TOKEN") {
        config.sas_token = value.trim_start_matches('?').to_string();
    }

    if let Ok(value) = std::env::var("AZURE_STORAGE_ENDPOINT_SUFFIX") {
        config.endpoint_suffix = value;
    }
}
