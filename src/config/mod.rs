use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Result, ScrapeError};
use crate::provider;

/// Run configuration: which provider, whose feed, how many posts, and
/// where session state and results live on disk.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub provider: String,
    pub user: String,
    pub limit: usize,
    pub headless: bool,
    pub login: bool,
    pub storage_dir: PathBuf,
    pub results_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            provider: "x".to_string(),
            user: "flutterdev".to_string(),
            limit: 10,
            headless: true,
            login: true,
            storage_dir: PathBuf::from("./storage"),
            results_dir: PathBuf::from("./results"),
        }
    }
}

impl Config {
    /// Loads the TOML config, creating a default file first when none
    /// exists. The loaded config is validated before it is returned.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            warn!("configuration file not found, creating default at {:?}", path);
            Self::default().save(path)?;
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ScrapeError::ConfigError(format!("Failed to read config file: {}", e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| ScrapeError::ConfigError(format!("Failed to parse TOML config: {}", e)))?;

        config.validate()?;
        info!("configuration loaded from {:?}", path);
        Ok(config)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self)
            .map_err(|e| ScrapeError::ConfigError(format!("Failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| {
                    ScrapeError::ConfigError(format!("Failed to create config directory: {}", e))
                })?;
            }
        }
        fs::write(path, content)
            .map_err(|e| ScrapeError::ConfigError(format!("Failed to write config file: {}", e)))?;
        Ok(())
    }

    /// Same fatal-before-browser contract as scrape itself: a bad config
    /// never reaches a browser launch.
    pub fn validate(&self) -> Result<()> {
        if provider::spec_by_name(&self.provider).is_none() {
            return Err(ScrapeError::ConfigError(format!(
                "Unknown provider '{}', expected one of: {:?}",
                self.provider,
                provider::known_providers()
            ))
            .into());
        }
        if self.user.trim().is_empty() {
            return Err(ScrapeError::ConfigError("user must not be empty".to_string()).into());
        }
        if self.limit == 0 {
            return Err(ScrapeError::ConfigError(
                "limit must be a positive number of posts".to_string(),
            )
            .into());
        }
        Ok(())
    }
}
