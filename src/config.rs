//! Key/value configuration file plus the typed settings read from it.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::DEFAULT_WORKOUT_NAME;

pub const KEY_DEFAULT_NAME: &str = "workout.default_name";
pub const KEY_REST_SECONDS: &str = "rest.default_seconds";
pub const KEY_EXTEND_SECONDS: &str = "rest.extend_seconds";
pub const KEY_TICK_MILLIS: &str = "tick.millis";
pub const KEY_DB_PATH: &str = "db.path";

/// Every key `Settings` understands, for `config list` hints.
pub const KNOWN_KEYS: &[&str] = &[
    KEY_DEFAULT_NAME,
    KEY_REST_SECONDS,
    KEY_EXTEND_SECONDS,
    KEY_TICK_MILLIS,
    KEY_DB_PATH,
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not determine config directory")]
    NoConfigDir,

    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid value `{value}` for `{key}`: {reason}")]
    InvalidValue {
        key: String,
        value: String,
        reason: String,
    },
}

/// Raw `key = "value"` pairs as stored on disk.
#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Config {
    pub map: BTreeMap<String, String>,
}

impl Config {
    /// `<config_dir>/lazarus/config`
    pub fn default_path() -> Result<PathBuf, ConfigError> {
        dirs::config_dir()
            .map(|d| d.join("lazarus").join("config"))
            .ok_or(ConfigError::NoConfigDir)
    }

    /// A missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        toml::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let content = toml::to_string(self)?;
        fs::write(path, content).map_err(io_err)
    }

    fn parsed<T>(&self, key: &str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.map.get(key) {
            None => Ok(default),
            Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::InvalidValue {
                key: key.to_string(),
                value: raw.clone(),
                reason: e.to_string(),
            }),
        }
    }
}

/// Engine and front-end defaults resolved from a [`Config`].
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub default_workout_name: String,
    pub default_rest_seconds: u32,
    pub rest_extend_seconds: u32,
    pub tick_interval: Duration,
    pub db_path: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            default_workout_name: DEFAULT_WORKOUT_NAME.to_string(),
            default_rest_seconds: 90,
            rest_extend_seconds: 15,
            tick_interval: Duration::from_secs(1),
            db_path: "./lazarus.db".to_string(),
        }
    }
}

impl Settings {
    pub fn from_config(cfg: &Config) -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let default_workout_name = cfg
            .map
            .get(KEY_DEFAULT_NAME)
            .map(|s| s.trim().to_string())
            .unwrap_or(defaults.default_workout_name);
        if default_workout_name.is_empty() {
            return Err(invalid(KEY_DEFAULT_NAME, "", "must not be empty"));
        }

        let default_rest_seconds = cfg.parsed(KEY_REST_SECONDS, defaults.default_rest_seconds)?;
        if default_rest_seconds == 0 {
            return Err(invalid(KEY_REST_SECONDS, "0", "must be at least 1"));
        }

        let rest_extend_seconds = cfg.parsed(KEY_EXTEND_SECONDS, defaults.rest_extend_seconds)?;

        let tick_millis: u64 = cfg.parsed(KEY_TICK_MILLIS, 1000)?;
        if !(10..=60_000).contains(&tick_millis) {
            return Err(invalid(
                KEY_TICK_MILLIS,
                &tick_millis.to_string(),
                "must be between 10 and 60000",
            ));
        }

        let db_path = cfg.map.get(KEY_DB_PATH).cloned().unwrap_or(defaults.db_path);

        Ok(Self {
            default_workout_name,
            default_rest_seconds,
            rest_extend_seconds,
            tick_interval: Duration::from_millis(tick_millis),
            db_path,
        })
    }
}

fn invalid(key: &str, value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: reason.to_string(),
    }
}
