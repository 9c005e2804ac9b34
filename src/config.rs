//! Configuration Management
//!
//! Handles persistent configuration storage for ytbulk.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Backup ledger location (defaults to the config dir)
    #[serde(default)]
    pub backup_file: Option<PathBuf>,
    /// Session quota budget in API units
    #[serde(default)]
    pub quota_units: Option<u64>,
    /// Write pacing ceiling per minute
    #[serde(default)]
    pub writes_per_minute: Option<u32>,
    /// Worker pool size for updates and probes
    #[serde(default)]
    pub concurrency: Option<usize>,
    /// Link probe timeout in seconds
    #[serde(default)]
    pub probe_timeout_secs: Option<u64>,
}

impl Config {
    /// Get the config file path
    fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("ytbulk").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };

        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_default(),
            Err(_) => Self::default(),
        }
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(&path, content)?;

        Ok(())
    }

    /// Get effective backup file path (CLI > config > default location)
    pub fn effective_backup_file(&self, cli: Option<&PathBuf>) -> PathBuf {
        if let Some(path) = cli {
            return path.clone();
        }
        if let Some(path) = &self.backup_file {
            return path.clone();
        }
        dirs::config_dir()
            .map(|p| p.join("ytbulk").join("backups.jsonl"))
            .unwrap_or_else(|| PathBuf::from("backups.jsonl"))
    }

    pub fn effective_quota_units(&self) -> u64 {
        self.quota_units
            .unwrap_or(crate::engine::mutator::DEFAULT_DAILY_UNITS)
    }

    pub fn effective_writes_per_minute(&self) -> u32 {
        self.writes_per_minute.unwrap_or(30)
    }

    pub fn effective_concurrency(&self) -> usize {
        self.concurrency.unwrap_or(4)
    }

    pub fn effective_probe_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.probe_timeout_secs.unwrap_or(5))
    }
}
