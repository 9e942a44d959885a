//! Application configuration.
//!
//! Loaded from environment variables with fallback to defaults.
//!
//! | Variable                     | Default                          |
//! |------------------------------|----------------------------------|
//! | `TALLY_DB_PATH`              | `tally.db`                       |
//! | `TALLY_TENANT_ID`            | required                         |
//! | `TALLY_LOG`                  | `info,tally=debug,sqlx=warn`     |
//! | `TALLY_AUTO_ACCRUE_LOYALTY`  | `true`                           |

use serde::{Deserialize, Serialize};
use std::env;

/// Default tracing filter when `TALLY_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,tally=debug,sqlx=warn";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppConfig {
    /// SQLite database file
    pub db_path: String,

    /// Tenant this register belongs to
    pub tenant_id: String,

    /// `tracing_subscriber::EnvFilter` directive
    pub log_filter: String,

    /// Subscribe the loyalty listener to `PosOrderPlaced`
    pub auto_accrue_loyalty: bool,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`AppConfig::load`] with a custom variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let tenant_id = lookup("TALLY_TENANT_ID")
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequired("TALLY_TENANT_ID".to_string()))?;

        let config = AppConfig {
            db_path: lookup("TALLY_DB_PATH").unwrap_or_else(|| "tally.db".to_string()),

            tenant_id,

            log_filter: lookup("TALLY_LOG").unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string()),

            auto_accrue_loyalty: parse_flag(
                "TALLY_AUTO_ACCRUE_LOYALTY",
                lookup("TALLY_AUTO_ACCRUE_LOYALTY"),
                true,
            )?,
        };

        Ok(config)
    }

    /// Config for tests and local tooling.
    pub fn for_tenant(tenant_id: impl Into<String>) -> Self {
        AppConfig {
            db_path: ":memory:".to_string(),
            tenant_id: tenant_id.into(),
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            auto_accrue_loyalty: true,
        }
    }
}

fn parse_flag(key: &str, value: Option<String>, default: bool) -> Result<bool, ConfigError> {
    match value.as_deref().map(str::trim) {
        None | Some("") => Ok(default),
        Some("1") | Some("true") | Some("yes") | Some("on") => Ok(true),
        Some("0") | Some("false") | Some("no") | Some("off") => Ok(false),
        Some(_) => Err(ConfigError::InvalidValue(key.to_string())),
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
