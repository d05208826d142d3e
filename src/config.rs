//! Runtime configuration shared by the binaries.

use crate::error::{ForecastError, Result};
use crate::grid::Hierarchy;
use crate::saving::{FileStore, MemoryStore, Persistence};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "FORECAST_CONFIG";
pub const STORAGE_DIR_ENV: &str = "FORECAST_STORAGE_DIR";
pub const BIND_ENV: &str = "FORECAST_BIND";
pub const LOG_ENV: &str = "FORECAST_LOG";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory for version files and history; `None` keeps everything in memory.
    pub storage_dir: Option<PathBuf>,
    pub bind_address: String,
    /// Default log filter, used when `RUST_LOG` is unset.
    pub log_level: String,
    pub hierarchy: Hierarchy,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            storage_dir: None,
            bind_address: "127.0.0.1:3000".to_string(),
            log_level: "info".to_string(),
            hierarchy: Hierarchy::default(),
        }
    }
}

impl AppConfig {
    /// Reads a JSON config file. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = fs::read(path)?;
        let config: AppConfig = serde_json::from_slice(&bytes)?;
        config.hierarchy.validate()?;
        Ok(config)
    }

    /// Builds the config from the environment.
    ///
    /// `FORECAST_CONFIG` names a JSON file to start from; the other
    /// variables override single fields.
    pub fn from_env() -> Result<Self> {
        let mut config = match env::var(CONFIG_ENV) {
            Ok(path) => Self::load(path)?,
            Err(_) => Self::default(),
        };
        if let Ok(dir) = env::var(STORAGE_DIR_ENV) {
            config.storage_dir = Some(PathBuf::from(dir));
        }
        if let Ok(bind) = env::var(BIND_ENV) {
            config.bind_address = bind;
        }
        if let Ok(level) = env::var(LOG_ENV) {
            config.log_level = level;
        }
        Ok(config)
    }

    /// The store this config points at.
    pub fn open_store(&self) -> Result<Box<dyn Persistence + Send>> {
        match &self.storage_dir {
            Some(dir) => Ok(Box::new(FileStore::open(dir)?)),
            None => Ok(Box::new(MemoryStore::new())),
        }
    }
}

/// Starts `env_logger` at the configured level; `RUST_LOG` wins when set.
pub fn init_logging(config: &AppConfig) -> Result<()> {
    let env = env_logger::Env::default().default_filter_or(config.log_level.as_str());
    env_logger::Builder::from_env(env)
        .format_timestamp_secs()
        .try_init()
        .map_err(|e| ForecastError::Config(e.to_string()))
}
