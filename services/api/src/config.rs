//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use agri_sat_core::{DailySchedule, RetryPolicy};
use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

pub const DEFAULT_CATALOG_URL: &str = "https://catalogue.dataspace.copernicus.eu/odata/v1";

/// A custom error type for configuration loading failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Settings for the scheduled sync jobs.
#[derive(Clone, Debug)]
pub struct SyncConfig {
    pub schedule: DailySchedule,
    pub retry: RetryPolicy,
    pub concurrency: usize,
    pub soil_moisture_enabled: bool,
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub database_url: String,
    pub db_pool_max: u32,
    pub log_level: Level,
    pub catalog_url: String,
    pub catalog_token: Option<String>,
    pub catalog_page_size: u32,
    pub processor_url: String,
    pub http_timeout: Duration,
    pub sync: SyncConfig,
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
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server and Database Settings ---
        let bind_address_str =
            lookup("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;
        let database_url = require(&lookup, "DATABASE_URL")?;
        let db_pool_max = parse_or(&lookup, "DB_POOL_MAX", 5u32)?;

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- External Services ---
        let catalog_url = lookup("CATALOG_URL")
            .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string())
            .trim_end_matches('/')
            .to_string();
        let catalog_token = lookup("CATALOG_TOKEN").filter(|t| !t.is_empty());
        let catalog_page_size = parse_or(&lookup, "CATALOG_PAGE_SIZE", 100u32)?;
        let processor_url = require(&lookup, "PROCESSOR_URL")?
            .trim_end_matches('/')
            .to_string();
        let http_timeout = Duration::from_secs(parse_or(&lookup, "HTTP_TIMEOUT_SECS", 60u64)?);

        // --- Scheduled Sync ---
        let hour = parse_or(&lookup, "SYNC_HOUR", 0u32)?;
        let minute = parse_or(&lookup, "SYNC_MINUTE", 0u32)?;
        let grace = Duration::from_secs(parse_or(&lookup, "SYNC_MISFIRE_GRACE_SECS", 3600u64)?);
        let schedule = DailySchedule::new(hour, minute, grace).ok_or_else(|| {
            ConfigError::InvalidValue(
                "SYNC_HOUR/SYNC_MINUTE".to_string(),
                format!("{hour:02}:{minute:02} is not a time of day"),
            )
        })?;

        let retry = RetryPolicy {
            max_attempts: parse_or(&lookup, "SYNC_MAX_RETRIES", 3u32)?,
            delay: Duration::from_secs(parse_or(&lookup, "SYNC_RETRY_DELAY_SECS", 60u64)?),
            retry_on_no_product: parse_or(&lookup, "SYNC_RETRY_ON_NO_PRODUCT", true)?,
        };
        if retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue(
                "SYNC_MAX_RETRIES".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        let concurrency = parse_or(&lookup, "SYNC_CONCURRENCY", 1usize)?.max(1);
        let soil_moisture_enabled = parse_or(&lookup, "SOIL_MOISTURE_SYNC_ENABLED", false)?;

        Ok(Self {
            bind_address,
            database_url,
            db_pool_max,
            log_level,
            catalog_url,
            catalog_token,
            catalog_page_size,
            processor_url,
            http_timeout,
            sync: SyncConfig {
                schedule,
                retry,
                concurrency,
                soil_moisture_enabled,
            },
        })
    }
}

fn require<F>(lookup: &F, name: &str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(name).ok_or_else(|| ConfigError::MissingVar(name.to_string()))
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), e.to_string())),
    }
}
