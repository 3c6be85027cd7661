//! # Shop Configuration
//!
//! Storage and validation settings for the storefront core.
//!
//! ## Configuration Sources
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Configuration Priority                               │
//! │                                                                         │
//! │  1. Environment Variables (highest priority)                           │
//! │     MODKIT_DATABASE_PATH=/var/lib/modkit/shop.db                       │
//! │     MODKIT_MAX_CONNECTIONS=10                                          │
//! │     MODKIT_LOW_STOCK_THRESHOLD_BPS=1500                                │
//! │     MODKIT_RELEASED_DEV_STATUS=5                                       │
//! │                                                                         │
//! │  2. TOML Config File (modkit.toml)                                     │
//! │                                                                         │
//! │  3. Default Values (lowest priority)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Configuration File Format
//! ```toml
//! [database]
//! path = "modkit.db"
//! max_connections = 5
//! min_connections = 1
//! connect_timeout_secs = 30
//!
//! [validation]
//! released_dev_status = 5
//! low_stock_threshold_bps = 1000   # 10%
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

use modkit_core::validation::validate_bps;
use modkit_core::ValidationPolicy;

use crate::error::{DbError, DbResult};
use crate::pool::DbConfig;

/// File looked up when no explicit path is given.
pub const DEFAULT_CONFIG_FILE: &str = "modkit.toml";

// =============================================================================
// Database Settings
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// SQLite file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: PathBuf,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
}

fn default_database_path() -> PathBuf {
    PathBuf::from("modkit.db")
}

fn default_max_connections() -> u32 {
    5
}

fn default_min_connections() -> u32 {
    1
}

fn default_connect_timeout() -> u64 {
    30
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        DatabaseSettings {
            path: default_database_path(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connect_timeout_secs: default_connect_timeout(),
        }
    }
}

// =============================================================================
// Shop Config
// =============================================================================

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShopConfig {
    #[serde(default)]
    pub database: DatabaseSettings,

    #[serde(default)]
    pub validation: ValidationPolicy,
}

impl ShopConfig {
    /// Loads configuration: defaults, then the TOML file, then environment.
    ///
    /// A missing file is not an error. An unreadable or malformed one is.
    pub fn load(config_path: Option<&Path>) -> DbResult<Self> {
        let path = config_path.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));

        let mut config = if path.exists() {
            info!(?path, "Loading shop config from file");
            let contents = std::fs::read_to_string(path)
                .map_err(|e| DbError::Config(format!("{}: {}", path.display(), e)))?;
            Self::from_toml_str(&contents)?
        } else {
            debug!(?path, "Config file not found, using defaults");
            Self::default()
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        config.validate()?;

        Ok(config)
    }

    pub fn from_toml_str(contents: &str) -> DbResult<Self> {
        toml::from_str(contents).map_err(|e| DbError::Config(e.to_string()))
    }

    /// Applies `MODKIT_*` overrides read through `lookup`.
    ///
    /// Unparseable numeric values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("MODKIT_DATABASE_PATH") {
            debug!(path = %path, "Overriding database path from environment");
            self.database.path = PathBuf::from(path);
        }

        if let Some(raw) = lookup("MODKIT_MAX_CONNECTIONS") {
            match raw.parse::<u32>() {
                Ok(max) => self.database.max_connections = max,
                Err(_) => warn!(value = %raw, "Ignoring invalid MODKIT_MAX_CONNECTIONS"),
            }
        }

        if let Some(raw) = lookup("MODKIT_LOW_STOCK_THRESHOLD_BPS") {
            match raw.parse::<u32>() {
                Ok(bps) => self.validation.low_stock_threshold_bps = bps,
                Err(_) => warn!(value = %raw, "Ignoring invalid MODKIT_LOW_STOCK_THRESHOLD_BPS"),
            }
        }

        if let Some(raw) = lookup("MODKIT_RELEASED_DEV_STATUS") {
            match raw.parse::<i64>() {
                Ok(status) => self.validation.released_dev_status = status,
                Err(_) => warn!(value = %raw, "Ignoring invalid MODKIT_RELEASED_DEV_STATUS"),
            }
        }
    }

    pub fn validate(&self) -> DbResult<()> {
        if self.database.max_connections == 0 {
            return Err(DbError::Config(
                "database.max_connections must be at least 1".to_string(),
            ));
        }

        if self.database.min_connections > self.database.max_connections {
            return Err(DbError::Config(format!(
                "database.min_connections ({}) exceeds max_connections ({})",
                self.database.min_connections, self.database.max_connections
            )));
        }

        validate_bps(
            "validation.low_stock_threshold_bps",
            self.validation.low_stock_threshold_bps,
        )
        .map_err(|e| DbError::Config(e.to_string()))?;

        Ok(())
    }

    /// Pool settings for [`crate::Database::new`].
    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
            .min_connections(self.database.min_connections)
            .connect_timeout(Duration::from_secs(self.database.connect_timeout_secs))
    }
}
