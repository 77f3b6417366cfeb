//! Configuration management for assetrack.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::net::SocketAddr;
use std::path::PathBuf;

use chrono::Duration;
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "assetrack";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "assets.db";

/// Default upload directory name (inside the data directory).
const UPLOADS_DIR_NAME: &str = "uploads";

/// Default pattern for business asset codes.
pub const DEFAULT_CODE_PATTERN: &str = r"^[A-Za-z0-9][A-Za-z0-9._/-]{0,99}$";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `ASSETRACK_`, `__` between sections)
/// 2. TOML config file at `~/.config/assetrack/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// HTTP server configuration.
    pub server: ServerConfig,
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Document upload configuration.
    pub uploads: UploadConfig,
    /// Status derivation thresholds.
    pub status: StatusConfig,
    /// Asset record rules.
    pub assets: AssetRulesConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to listen on.
    pub bind: String,
    /// Session lifetime in hours.
    pub session_ttl_hours: u32,
    /// Name of the session cookie.
    pub cookie_name: String,
}

/// Storage-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/assetrack/assets.db`
    pub database_path: Option<PathBuf>,
}

/// Document upload configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UploadConfig {
    /// Directory holding uploaded PDFs.
    /// Defaults to `~/.local/share/assetrack/uploads`
    pub directory: Option<PathBuf>,
    /// Largest accepted upload in megabytes.
    pub max_upload_mb: u32,
}

/// Thresholds for AMC and calibration status labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatusConfig {
    /// Days before AMC end at which it is reported as expiring soon.
    pub amc_warning_days: u32,
    /// Days before the next calibration at which it is reported as due soon.
    pub calibration_warning_days: u32,
}

/// Rules applied to asset records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetRulesConfig {
    /// Regex every asset code must match.
    pub code_pattern: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1:5000".to_string(),
            session_ttl_hours: 12,
            cookie_name: "assetrack_session".to_string(),
        }
    }
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            directory: None, // Will be resolved to default at runtime
            max_upload_mb: 20,
        }
    }
}

impl Default for StatusConfig {
    fn default() -> Self {
        Self {
            amc_warning_days: 30,
            calibration_warning_days: 15,
        }
    }
}

impl Default for AssetRulesConfig {
    fn default() -> Self {
        Self {
            code_pattern: DEFAULT_CODE_PATTERN.to_string(),
        }
    }
}

impl Config {
    /// Load defaults, then the TOML file (`config_path` or the default
    /// location), then `ASSETRACK_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed("ASSETRACK_").split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.server.bind.parse::<SocketAddr>().is_err() {
            return Err(Error::ConfigValidation {
                message: format!("invalid bind address: {}", self.server.bind),
            });
        }

        if self.server.session_ttl_hours == 0 {
            return Err(Error::ConfigValidation {
                message: "session_ttl_hours must be greater than 0".to_string(),
            });
        }

        if self.server.cookie_name.is_empty()
            || !self
                .server
                .cookie_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            return Err(Error::ConfigValidation {
                message: format!("invalid cookie_name: {:?}", self.server.cookie_name),
            });
        }

        if self.uploads.max_upload_mb == 0 {
            return Err(Error::ConfigValidation {
                message: "max_upload_mb must be greater than 0".to_string(),
            });
        }

        if regex::Regex::new(&self.assets.code_pattern).is_err() {
            return Err(Error::ConfigValidation {
                message: format!("invalid regex pattern: {}", self.assets.code_pattern),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the upload directory, resolving defaults if not set.
    #[must_use]
    pub fn uploads_dir(&self) -> PathBuf {
        self.uploads
            .directory
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(UPLOADS_DIR_NAME))
    }

    /// Largest accepted upload in bytes.
    #[must_use]
    pub fn max_upload_bytes(&self) -> usize {
        usize::try_from(self.uploads.max_upload_mb)
            .unwrap_or(usize::MAX)
            .saturating_mul(1024 * 1024)
    }

    /// Get the session lifetime as a Duration.
    #[must_use]
    pub fn session_ttl(&self) -> Duration {
        Duration::hours(i64::from(self.server.session_ttl_hours))
    }

    /// Compile the asset code pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is not a valid regex.
    pub fn code_regex(&self) -> Result<regex::Regex> {
        regex::Regex::new(&self.assets.code_pattern).map_err(|e| Error::ConfigValidation {
            message: format!("invalid regex pattern: {e}"),
        })
    }
}
