//! Configuration – reads/writes `~/.recall/config.toml`.
//!
//! Every field has a default, so a partial (or absent) file is valid.
//! `RECALL_*` environment variables override whatever the file says.

use std::path::{Path, PathBuf};
use std::time::Duration;

use recall_memory::graph::{GraphLimits, MAX_TRAVERSAL_DEPTH};
use recall_memory::persistence::{LOCK_STALE_AFTER, PersistenceConfig};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("failed to write config at {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Persisted settings stored in `~/.recall/config.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecallConfig {
    /// Directory holding `memories.json`, its backup and the lock file.
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    #[serde(default = "default_scratch_capacity")]
    pub scratch_capacity: usize,

    /// Auto-save period in milliseconds; `0` disables the timer.
    #[serde(default = "default_auto_save_interval_ms")]
    pub auto_save_interval_ms: u64,

    /// Result cap for searches that do not pass their own limit.
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,

    /// Traversal depth for recalls that do not pass their own depth.
    #[serde(default = "default_association_depth")]
    pub association_depth: usize,

    #[serde(default = "default_backup_enabled")]
    pub backup_enabled: bool,
}

fn home_dir() -> PathBuf {
    PathBuf::from(
        std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

fn default_storage_dir() -> PathBuf {
    home_dir().join(".recall").join("data")
}
fn default_scratch_capacity() -> usize {
    recall_memory::scratch::DEFAULT_CAPACITY
}
fn default_auto_save_interval_ms() -> u64 {
    300_000
}
fn default_search_limit() -> usize {
    recall_memory::graph::DEFAULT_SEARCH_LIMIT
}
fn default_association_depth() -> usize {
    recall_memory::graph::DEFAULT_TRAVERSAL_DEPTH
}
fn default_backup_enabled() -> bool {
    true
}

impl Default for RecallConfig {
    fn default() -> Self {
        Self {
            storage_dir: default_storage_dir(),
            scratch_capacity: default_scratch_capacity(),
            auto_save_interval_ms: default_auto_save_interval_ms(),
            search_limit: default_search_limit(),
            association_depth: default_association_depth(),
            backup_enabled: default_backup_enabled(),
        }
    }
}

impl RecallConfig {
    pub fn graph_limits(&self) -> GraphLimits {
        GraphLimits {
            default_depth: self.association_depth.min(MAX_TRAVERSAL_DEPTH),
            search_limit: self.search_limit,
        }
    }

    pub fn persistence_config(&self) -> PersistenceConfig {
        PersistenceConfig {
            storage_dir: self.storage_dir.clone(),
            backup_enabled: self.backup_enabled,
            lock_stale_after: LOCK_STALE_AFTER,
        }
    }

    pub fn auto_save_interval(&self) -> Duration {
        Duration::from_millis(self.auto_save_interval_ms)
    }
}

/// Return the path to `~/.recall/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(&home_dir())
}

pub(crate) fn config_path_for_home(home: &Path) -> PathBuf {
    home.join(".recall").join("config.toml")
}

/// Load the config from disk.  Returns `None` if the file does not exist.
pub fn load() -> Result<Option<RecallConfig>, ConfigError> {
    load_from(&config_path())
}

/// Load the config file when present, otherwise defaults; env overrides are
/// applied either way.
pub fn resolve() -> Result<RecallConfig, ConfigError> {
    Ok(match load()? {
        Some(cfg) => cfg,
        None => {
            let mut cfg = RecallConfig::default();
            apply_env_overrides(&mut cfg);
            cfg
        }
    })
}

/// Load the config from a specific path, applying env overrides.
pub fn load_from(path: &Path) -> Result<Option<RecallConfig>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let mut cfg: RecallConfig = toml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    apply_env_overrides(&mut cfg);
    Ok(Some(cfg))
}

/// Apply `RECALL_*` environment variable overrides to `cfg`.
///
/// | Variable | Config field |
/// |---|---|
/// | `RECALL_STORAGE_DIR` | `storage_dir` |
/// | `RECALL_SCRATCH_CAPACITY` | `scratch_capacity` |
/// | `RECALL_AUTO_SAVE_INTERVAL_MS` | `auto_save_interval_ms` |
/// | `RECALL_SEARCH_LIMIT` | `search_limit` |
/// | `RECALL_ASSOCIATION_DEPTH` | `association_depth` |
/// | `RECALL_BACKUP_ENABLED` | `backup_enabled` |
///
/// Values that do not parse are ignored.
pub fn apply_env_overrides(cfg: &mut RecallConfig) {
    apply_overrides(cfg, |key| std::env::var(key).ok());
}

fn apply_overrides(cfg: &mut RecallConfig, var: impl Fn(&str) -> Option<String>) {
    if let Some(v) = var("RECALL_STORAGE_DIR")
        && !v.trim().is_empty()
    {
        cfg.storage_dir = PathBuf::from(v);
    }
    if let Some(n) = var("RECALL_SCRATCH_CAPACITY").and_then(|v| v.trim().parse::<usize>().ok())
        && n >= 1
    {
        cfg.scratch_capacity = n;
    }
    if let Some(ms) = var("RECALL_AUTO_SAVE_INTERVAL_MS").and_then(|v| v.trim().parse().ok()) {
        cfg.auto_save_interval_ms = ms;
    }
    if let Some(n) = var("RECALL_SEARCH_LIMIT").and_then(|v| v.trim().parse().ok()) {
        cfg.search_limit = n;
    }
    if let Some(n) = var("RECALL_ASSOCIATION_DEPTH").and_then(|v| v.trim().parse().ok()) {
        cfg.association_depth = n;
    }
    if let Some(b) = var("RECALL_BACKUP_ENABLED").and_then(|v| parse_bool(&v)) {
        cfg.backup_enabled = b;
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Save the config to disk, creating `~/.recall/` if necessary.
pub fn save(cfg: &RecallConfig) -> Result<(), ConfigError> {
    save_to(cfg, &config_path())
}

pub fn save_to(cfg: &RecallConfig, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let raw = toml::to_string_pretty(cfg)?;
    std::fs::write(path, raw).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })
}
