use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub const DEFAULT_CLIP_CLEAR_SECS: u64 = 20;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub database_path: String,
    pub max_results: u16,
    pub inactivity_lock_timeout_secs: u64,
    #[serde(skip)]
    pub config_path: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: String::new(),
            max_results: 10,
            inactivity_lock_timeout_secs: 300,
            config_path: stable_app_data_dir().join("config.toml"),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Io(String),
    Parse(String),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(error) => write!(f, "config io error: {error}"),
            Self::Parse(error) => write!(f, "config parse error: {error}"),
            Self::Invalid(error) => write!(f, "invalid config: {error}"),
        }
    }
}

impl std::error::Error for ConfigError {}

pub fn stable_app_data_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("keyfind")
}

/// An unset `database_path` is not rejected here: it surfaces per-request as
/// a file-not-found notice, with guidance to fix the configuration, instead
/// of preventing the transport loop from starting at all.
pub fn validate(cfg: &Config) -> Result<(), ConfigError> {
    if cfg.max_results < 1 || cfg.max_results > 100 {
        return Err(ConfigError::Invalid("max_results out of range".into()));
    }

    Ok(())
}

/// Expand `~` / `~/...` user-relative notation against the home directory.
/// Anything else passes through untouched.
pub fn expand_user(path: &str) -> PathBuf {
    if path == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    }

    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }

    PathBuf::from(path)
}

pub fn load(path: Option<&Path>) -> Result<Config, ConfigError> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| stable_app_data_dir().join("config.toml"));

    if !config_path.exists() {
        let mut cfg = Config::default();
        cfg.config_path = config_path;
        return Ok(cfg);
    }

    let raw = std::fs::read_to_string(&config_path).map_err(|e| ConfigError::Io(e.to_string()))?;
    let mut cfg: Config = toml::from_str(&raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
    cfg.config_path = config_path;
    Ok(cfg)
}

pub fn save(cfg: &Config) -> Result<(), ConfigError> {
    if let Some(parent) = cfg.config_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::Io(e.to_string()))?;
    }

    let encoded = toml::to_string_pretty(cfg).map_err(|e| ConfigError::Parse(e.to_string()))?;
    std::fs::write(&cfg.config_path, encoded).map_err(|e| ConfigError::Io(e.to_string()))
}
