//! Configuration management for skilltree

use std::path::PathBuf;

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::ledger::DEFAULT_HISTORY_LIMIT;
use crate::rewards::XpContext;

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Catalog file loaded at startup
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_path: Option<PathBuf>,

    /// XP table used when a completion event does not name one
    #[serde(default)]
    pub default_xp_context: XpContext,

    /// Gem transactions kept per learner (older ones are pruned)
    ///
    /// Applied to stored ledgers too, whenever a learner is loaded.
    #[serde(default = "default_history_limit")]
    pub ledger_history_limit: usize,

    /// Gems paid by the daily login bonus
    #[serde(default = "default_login_bonus")]
    pub daily_login_bonus: u32,

    /// Gems paid on league promotion
    #[serde(default = "default_league_gems")]
    pub league_promotion_gems: u32,

    /// Extra attempts after a concurrent write
    #[serde(default = "default_retries")]
    pub max_write_retries: u32,
}

fn default_history_limit() -> usize {
    DEFAULT_HISTORY_LIMIT
}

fn default_login_bonus() -> u32 {
    5
}

fn default_league_gems() -> u32 {
    25
}

fn default_retries() -> u32 {
    3
}

impl Default for Config {
    fn default() -> Self {
        Self {
            catalog_path: None,
            default_xp_context: XpContext::default(),
            ledger_history_limit: default_history_limit(),
            daily_login_bonus: default_login_bonus(),
            league_promotion_gems: default_league_gems(),
            max_write_retries: default_retries(),
        }
    }
}

impl Config {
    /// Load configuration from disk, or create default if not exists
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            let contents = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read config from {:?}", config_path))?;
            serde_json::from_str(&contents).with_context(|| "Failed to parse config.json")
        } else {
            let config = Self::default();
            config.save()?;
            Ok(config)
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory {:?}", parent))?;
        }

        let contents =
            serde_json::to_string_pretty(self).with_context(|| "Failed to serialize config")?;

        std::fs::write(&config_path, contents)
            .with_context(|| format!("Failed to write config to {:?}", config_path))?;

        Ok(())
    }

    /// Get the path to the config file
    pub fn config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("", "", "skilltree")
            .context("Failed to determine config directory")?;
        Ok(proj_dirs.config_dir().join("config.json"))
    }

    /// Get the data directory path
    pub fn data_dir() -> Result<PathBuf> {
        let proj_dirs =
            ProjectDirs::from("", "", "skilltree").context("Failed to determine data directory")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    /// Get the learner state directory path
    pub fn learners_dir() -> Result<PathBuf> {
        Ok(Self::data_dir()?.join("learners"))
    }

    /// Catalog path: explicit override, then config, then `catalog.json` in the data dir
    pub fn resolve_catalog_path(&self, explicit: Option<PathBuf>) -> Result<PathBuf> {
        match explicit.or_else(|| self.catalog_path.clone()) {
            Some(path) => Ok(path),
            None => Ok(Self::data_dir()?.join("catalog.json")),
        }
    }
}
