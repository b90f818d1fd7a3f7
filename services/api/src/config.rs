//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use coderr_core::filters::{FilterStrictness, PageSettings};
use coderr_core::MarketplaceSettings;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub log_level: Level,
    pub media_root: PathBuf,
    pub media_url: String,
    pub allowed_origin: String,
    pub page_size: u32,
    pub max_page_size: u32,
    pub session_ttl_days: i64,
    pub filter_strictness: FilterStrictness,
}

/// Reads an optional variable and parses it, falling back to `default` when unset.
fn parse_var<T: FromStr>(name: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        // --- Load Server and Database Settings ---
        let bind_address = parse_var("BIND_ADDRESS", SocketAddr::from(([0, 0, 0, 0], 8000)))?;

        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingVar("DATABASE_URL".to_string()))?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Media Settings ---
        let media_root = std::env::var("MEDIA_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./media"));
        let media_url = std::env::var("MEDIA_URL").unwrap_or_else(|_| "/media/".to_string());
        let allowed_origin =
            std::env::var("ALLOWED_ORIGIN").unwrap_or_else(|_| "http://127.0.0.1:5500".to_string());

        // --- Load Listing and Session Settings ---
        let page_size = parse_var("PAGE_SIZE", 6u32)?;
        let max_page_size = parse_var("MAX_PAGE_SIZE", 100u32)?;
        if page_size == 0 || page_size > max_page_size {
            return Err(ConfigError::InvalidValue(
                "PAGE_SIZE".to_string(),
                format!("must be between 1 and MAX_PAGE_SIZE ({})", max_page_size),
            ));
        }
        let session_ttl_days = parse_var("SESSION_TTL_DAYS", 30i64)?;
        let filter_strictness = parse_var("FILTER_STRICTNESS", FilterStrictness::Lenient)?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            media_root,
            media_url,
            allowed_origin,
            page_size,
            max_page_size,
            session_ttl_days,
            filter_strictness,
        })
    }

    /// The slice of configuration the marketplace core cares about.
    pub fn marketplace_settings(&self) -> MarketplaceSettings {
        MarketplaceSettings {
            paging: PageSettings {
                default_size: self.page_size,
                max_size: self.max_page_size,
            },
            strictness: self.filter_strictness,
        }
    }
}

impl Default for Config {
    /// Local development defaults; `database_url` is left empty.
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8000)),
            database_url: String::new(),
            log_level: Level::INFO,
            media_root: PathBuf::from("./media"),
            media_url: "/media/".to_string(),
            allowed_origin: "http://127.0.0.1:5500".to_string(),
            page_size: 6,
            max_page_size: 100,
            session_ttl_days: 30,
            filter_strictness: FilterStrictness::Lenient,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_follow_the_config() {
        let config = Config {
            page_size: 10,
            filter_strictness: FilterStrictness::Strict,
            ..Config::default()
        };
        let settings = config.marketplace_settings();
        assert_eq!(settings.paging.default_size, 10);
        assert_eq!(settings.paging.max_size, 100);
        assert_eq!(settings.strictness, FilterStrictness::Strict);
    }

    #[test]
    fn unset_variables_use_defaults() {
        assert_eq!(parse_var("CODERR_TEST_UNSET_VARIABLE", 42u32).unwrap(), 42);
    }
}
