//! # Hub Configuration
//!
//! Runtime parameters for the hub process, read from the environment.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `HUB_DATA_DIR` | `./data` | Directory of the RocksDB store |
//! | `HUB_STORE_BACKEND` | `memory` | `memory` or `rocksdb` |
//! | `HUB_FLUSH_INTERVAL_SECS` | `5` | Latest-value cache flush period |
//! | `HUB_CURSOR_LIFESPAN_SECS` | `60` | Idle time before a cursor is closed |
//! | `HUB_BUS_CAPACITY` | `1000` | Event bus channel capacity |
//! | `HUB_RETENTION_FILE` | unset | JSON rule set used as default retention rules |

use hub_history::{HistoryConfig, RetentionRuleSet};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default latest-value flush period.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(5);

/// Default event bus capacity.
pub const DEFAULT_BUS_CAPACITY: usize = 1000;

/// Complete hub configuration.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// History service configuration.
    pub history: HistoryConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// How often dirty latest values are written back.
    pub flush_interval: Duration,
    /// Event bus channel capacity.
    pub bus_capacity: usize,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            history: HistoryConfig::default(),
            storage: StorageConfig::default(),
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            bus_capacity: DEFAULT_BUS_CAPACITY,
        }
    }
}

/// Which bucket store backs the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    /// Volatile `BTreeMap` store.
    #[default]
    Memory,
    /// RocksDB database under `data_dir`.
    RocksDb,
}

impl FromStr for StoreBackend {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" | "mem" => Ok(Self::Memory),
            "rocksdb" | "rocks" => Ok(Self::RocksDb),
            other => Err(ConfigError::UnknownBackend(other.to_string())),
        }
    }
}

/// Storage configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Data directory for persistent stores.
    pub data_dir: PathBuf,
    /// Selected backend.
    pub backend: StoreBackend,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            backend: StoreBackend::Memory,
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `HUB_STORE_BACKEND` names no known store.
    #[error("unknown store backend '{0}', expected 'memory' or 'rocksdb'")]
    UnknownBackend(String),

    /// A variable holds something other than the expected number.
    #[error("{var} must be a number, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },

    /// A period or capacity is zero.
    #[error("{0} must be greater than zero")]
    Zero(&'static str),

    /// The retention rule file cannot be used.
    #[error("retention file '{path}': {reason}")]
    RetentionFile { path: PathBuf, reason: String },

    /// RocksDB was requested but the binary was built without it.
    #[error("store backend 'rocksdb' requires the 'rocksdb' feature")]
    BackendUnavailable,
}

impl HubConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Load configuration through a variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("HUB_DATA_DIR") {
            config.storage.data_dir = PathBuf::from(dir);
        }
        if let Some(backend) = lookup("HUB_STORE_BACKEND") {
            config.storage.backend = backend.parse()?;
        }
        if let Some(secs) = parse_number(&lookup, "HUB_FLUSH_INTERVAL_SECS")? {
            config.flush_interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_number(&lookup, "HUB_CURSOR_LIFESPAN_SECS")? {
            config.history = config.history.with_cursor_lifespan(Duration::from_secs(secs));
        }
        if let Some(capacity) = parse_number(&lookup, "HUB_BUS_CAPACITY")? {
            config.bus_capacity = capacity as usize;
        }
        if let Some(path) = lookup("HUB_RETENTION_FILE") {
            let rules = load_rules_file(Path::new(&path))?;
            config.history = config.history.with_default_rules(rules);
        }

        Ok(config)
    }

    /// Reject settings the runtime cannot work with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.flush_interval.is_zero() {
            return Err(ConfigError::Zero("HUB_FLUSH_INTERVAL_SECS"));
        }
        if self.history.cursor_lifespan.is_zero() {
            return Err(ConfigError::Zero("HUB_CURSOR_LIFESPAN_SECS"));
        }
        if self.history.cursor_sweep_interval.is_zero() {
            return Err(ConfigError::Zero("cursor sweep interval"));
        }
        if self.bus_capacity == 0 {
            return Err(ConfigError::Zero("HUB_BUS_CAPACITY"));
        }
        if self.history.max_batch_limit == 0 {
            return Err(ConfigError::Zero("max batch limit"));
        }
        if self.storage.backend == StoreBackend::RocksDb && !cfg!(feature = "rocksdb") {
            return Err(ConfigError::BackendUnavailable);
        }
        Ok(())
    }
}

fn parse_number<F>(lookup: &F, var: &'static str) -> Result<Option<u64>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value }),
    }
}

/// Read a JSON retention rule set from disk.
pub fn load_rules_file(path: &Path) -> Result<RetentionRuleSet, ConfigError> {
    let text = std::fs::read_to_string(path).map_err(|e| ConfigError::RetentionFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    serde_json::from_str(&text).map_err(|e| ConfigError::RetentionFile {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
