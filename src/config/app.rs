//! Application configuration loading from tracker.toml
//!
//! The file is optional. When it is absent every field takes its default, so a fresh
//! installation works with nothing but a `DATABASE_URL`. Per-user values such as the
//! monthly budget live in the database; the figures here only seed them.

use crate::errors::{Error, Result};
use serde::Deserialize;
use std::path::Path;
use tracing::debug;

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "tracker.toml";

/// Configuration structure representing the entire tracker.toml file
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    /// User the command line acts on behalf of
    pub user_id: String,
    /// Budget used when the user has no stored settings
    pub default_monthly_budget: f64,
    /// Currency used when the user has no stored settings
    pub default_currency: String,
    /// How many products the cost analytics ranking keeps
    pub top_products: usize,
    /// Fallback `tracing` filter when `RUST_LOG` is unset
    pub log_filter: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            user_id: "local".to_string(),
            default_monthly_budget: 500.0,
            default_currency: "SEK".to_string(),
            top_products: 5,
            log_filter: "info".to_string(),
        }
    }
}

/// Loads the application configuration from a TOML file
///
/// # Errors
/// Returns an error if:
/// - The file cannot be read
/// - The TOML syntax is invalid
/// - The configured budget is negative or not finite
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path_ref = path.as_ref();
    debug!("Loading configuration from {:?}", path_ref);
    let contents = std::fs::read_to_string(path_ref).map_err(|e| Error::Config {
        message: format!("Failed to read config file {}: {e}", path_ref.display()),
    })?;
    parse_config(&contents)
}

/// Loads the configuration from `path` if the file exists, otherwise returns defaults
pub fn load_config_or_default<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    if path.as_ref().exists() {
        load_config(path)
    } else {
        debug!("No config file at {:?}, using defaults", path.as_ref());
        Ok(AppConfig::default())
    }
}

fn parse_config(contents: &str) -> Result<AppConfig> {
    let config: AppConfig = toml::from_str(contents).map_err(|e| Error::Config {
        message: format!("Failed to parse tracker.toml: {e}"),
    })?;

    if !config.default_monthly_budget.is_finite() || config.default_monthly_budget < 0.0 {
        return Err(Error::Config {
            message: format!(
                "default_monthly_budget must be a non-negative number, got {}",
                config.default_monthly_budget
            ),
        });
    }
    if config.user_id.trim().is_empty() {
        return Err(Error::Config {
            message: "user_id cannot be empty".to_string(),
        });
    }

    Ok(config)
}
