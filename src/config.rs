//! Configuration management for the profiler.
//!
//! This module handles loading and validating configuration from files.
//! It supports YAML, JSON, and TOML formats, picked by file extension.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::info;

// Default configuration constants
pub const DEFAULT_TOP_N_STATS_PER_CATEGORY: usize = 10;
pub const DEFAULT_TOP_N_STATS_PER_SUBCATEGORY: usize = 5;
pub const DEFAULT_PERIODIC_COLLECTION_BUFFER_SIZE: usize = 180;
pub const DEFAULT_MAX_USER_SWITCH_EVENTS: usize = 5;
pub const DEFAULT_SYSTEM_EVENT_DATA_CACHE_DURATION_SECS: u64 = 3600;

/// Errors raised while loading a configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Invalid YAML configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("Invalid JSON configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid TOML configuration: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("{0}")]
    Invalid(String),
}

/// Sizing and retention settings of the profiler.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfilerConfig {
    /// Entries kept per ranked category (default: 10)
    #[serde(default = "default_top_n_per_category", alias = "top-n-stats-per-category")]
    pub top_n_stats_per_category: usize,

    /// Processes kept inside each ranked entry (default: 5)
    #[serde(
        default = "default_top_n_per_subcategory",
        alias = "top-n-stats-per-subcategory"
    )]
    pub top_n_stats_per_subcategory: usize,

    /// Capacity of the periodic collection (default: 180)
    #[serde(
        default = "default_periodic_buffer_size",
        alias = "periodic-collection-buffer-size"
    )]
    pub periodic_collection_buffer_size: usize,

    /// User-switch events retained (default: 5)
    #[serde(default = "default_max_user_switch_events", alias = "max-user-switch-events")]
    pub max_user_switch_events: usize,

    /// Age after which boot-time, wake-up and the oldest user-switch data are
    /// purged on a periodic poll (default: 3600)
    #[serde(
        default = "default_cache_duration_secs",
        alias = "system-event-data-cache-duration-secs"
    )]
    pub system_event_data_cache_duration_secs: u64,
}

fn default_top_n_per_category() -> usize {
    DEFAULT_TOP_N_STATS_PER_CATEGORY
}
fn default_top_n_per_subcategory() -> usize {
    DEFAULT_TOP_N_STATS_PER_SUBCATEGORY
}
fn default_periodic_buffer_size() -> usize {
    DEFAULT_PERIODIC_COLLECTION_BUFFER_SIZE
}
fn default_max_user_switch_events() -> usize {
    DEFAULT_MAX_USER_SWITCH_EVENTS
}
fn default_cache_duration_secs() -> u64 {
    DEFAULT_SYSTEM_EVENT_DATA_CACHE_DURATION_SECS
}

impl Default for ProfilerConfig {
    fn default() -> Self {
        Self {
            top_n_stats_per_category: default_top_n_per_category(),
            top_n_stats_per_subcategory: default_top_n_per_subcategory(),
            periodic_collection_buffer_size: default_periodic_buffer_size(),
            max_user_switch_events: default_max_user_switch_events(),
            system_event_data_cache_duration_secs: default_cache_duration_secs(),
        }
    }
}

impl ProfilerConfig {
    pub fn system_event_data_cache_duration(&self) -> Duration {
        Duration::from_secs(self.system_event_data_cache_duration_secs)
    }

    /// Rejects settings that would make every poll of some collection fail.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.top_n_stats_per_category == 0 {
            return Err(ConfigError::Invalid(
                "top_n_stats_per_category must be at least 1".into(),
            ));
        }
        if self.periodic_collection_buffer_size == 0 {
            return Err(ConfigError::Invalid(
                "periodic_collection_buffer_size must be at least 1".into(),
            ));
        }
        if self.max_user_switch_events == 0 {
            return Err(ConfigError::Invalid(
                "max_user_switch_events must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Intervals between polls of each collection event, in milliseconds.
///
/// The profiler does not schedule anything itself; these values are
/// reported in the structured dump and used by the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionIntervals {
    #[serde(default = "default_boottime_interval")]
    pub boottime_interval_millis: u64,
    #[serde(default = "default_periodic_interval")]
    pub periodic_interval_millis: u64,
    #[serde(default = "default_user_switch_interval")]
    pub user_switch_interval_millis: u64,
    #[serde(default = "default_wake_up_interval")]
    pub wake_up_interval_millis: u64,
    #[serde(default = "default_custom_interval")]
    pub custom_interval_millis: u64,
}

fn default_boottime_interval() -> u64 {
    1_000
}
fn default_periodic_interval() -> u64 {
    20_000
}
fn default_user_switch_interval() -> u64 {
    2_000
}
fn default_wake_up_interval() -> u64 {
    2_000
}
fn default_custom_interval() -> u64 {
    10_000
}

impl Default for CollectionIntervals {
    fn default() -> Self {
        Self {
            boottime_interval_millis: default_boottime_interval(),
            periodic_interval_millis: default_periodic_interval(),
            user_switch_interval_millis: default_user_switch_interval(),
            wake_up_interval_millis: default_wake_up_interval(),
            custom_interval_millis: default_custom_interval(),
        }
    }
}

/// Full configuration of the command-line driver.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    // Logging
    pub log_level: Option<String>,

    /// Recorded deltas to replay instead of synthetic data
    #[serde(alias = "replay-file")]
    pub replay_file: Option<PathBuf>,

    #[serde(default)]
    pub profiler: ProfilerConfig,

    #[serde(default)]
    pub intervals: CollectionIntervals,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.profiler.validate()?;
        if self.intervals.periodic_interval_millis == 0 {
            return Err(ConfigError::Invalid(
                "periodic_interval_millis must be greater than 0".into(),
            ));
        }
        Ok(())
    }
}

/// Loads configuration from `path`, or from the first default location that
/// exists. Returns defaults when no file is found.
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => {
            let defaults = [
                "/etc/perf-profiler/perf-profiler.yaml",
                "/etc/perf-profiler/perf-profiler.yml",
                "/etc/perf-profiler/perf-profiler.json",
                "./perf-profiler.yaml",
                "./perf-profiler.yml",
                "./perf-profiler.json",
            ];
            match defaults.iter().map(Path::new).find(|p| p.exists()) {
                Some(p) => p.to_path_buf(),
                None => return Ok(AppConfig::default()),
            }
        }
    };

    let content = fs::read_to_string(&path).map_err(|source| ConfigError::Read {
        path: path.clone(),
        source,
    })?;

    let config: AppConfig = match path.extension().and_then(|s| s.to_str()) {
        Some("json") => serde_json::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        // Default to YAML
        _ => serde_yaml::from_str(&content)?,
    };
    info!("Loaded configuration from: {}", path.display());
    Ok(config)
}
