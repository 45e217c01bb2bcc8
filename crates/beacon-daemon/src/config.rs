//! Configuration file management.
//!
//! The config lives at `$BEACON_CONFIG` if set, else
//! `$BEACON_DATA_DIR/config.toml`, else `~/.beacon/config.toml`. A missing
//! file means defaults.

use std::path::PathBuf;

use beacon_protocol::config::ProtocolConfig;
use serde::{Deserialize, Serialize};

/// Errors raised while loading the configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BeaconConfig {
    /// Threshold and reveal policy shared by every witness.
    #[serde(default)]
    pub protocol: ProtocolConfig,
    /// Witness set and round pacing.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Logging and event output.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Simulation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of witnesses, ids `0..witnesses`.
    #[serde(default = "default_witnesses")]
    pub witnesses: u32,
    /// Rounds to run. 0 = until interrupted.
    #[serde(default = "default_rounds")]
    pub rounds: u64,
    /// Pause between rounds in milliseconds.
    #[serde(default = "default_round_interval")]
    pub round_interval_ms: u64,
    /// Witness ids that never produce.
    #[serde(default)]
    pub offline: Vec<u32>,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "trace" | "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Print every event as a JSON line on stdout.
    #[serde(default)]
    pub json_events: bool,
    /// Event categories to print. Empty = all.
    #[serde(default)]
    pub event_categories: Vec<String>,
}

fn default_witnesses() -> u32 {
    5
}

fn default_rounds() -> u64 {
    10
}

fn default_round_interval() -> u64 {
    1000
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            witnesses: default_witnesses(),
            rounds: default_rounds(),
            round_interval_ms: default_round_interval(),
            offline: Vec::new(),
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_events: false,
            event_categories: Vec::new(),
        }
    }
}

const LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

impl BeaconConfig {
    /// Load configuration from the config file location.
    ///
    /// Falls back to defaults if the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::config_path();
        if !path.exists() {
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }
        let content = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::from_toml(&content)
    }

    /// Parse and validate a TOML document.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: BeaconConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check cross-section constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.protocol
            .validate(self.simulation.witnesses as usize)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if let Some(id) = self
            .simulation
            .offline
            .iter()
            .find(|id| **id >= self.simulation.witnesses)
        {
            return Err(ConfigError::Invalid(format!(
                "offline witness {id} is not in the witness set"
            )));
        }
        if !LOG_LEVELS.contains(&self.advanced.log_level.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "unknown log level {:?}",
                self.advanced.log_level
            )));
        }
        Ok(())
    }

    /// Get the config file path.
    pub fn config_path() -> PathBuf {
        if let Ok(path) = std::env::var("BEACON_CONFIG") {
            return PathBuf::from(path);
        }
        Self::data_dir().join("config.toml")
    }

    /// Data directory: `$BEACON_DATA_DIR` or `~/.beacon`.
    fn data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("BEACON_DATA_DIR") {
            return PathBuf::from(dir);
        }
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".beacon"))
            .unwrap_or_else(|_| PathBuf::from("/tmp/beacon"))
    }
}
