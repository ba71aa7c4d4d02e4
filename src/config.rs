//! Host configuration parsed from environment variables.
//!
//! `.env` is loaded by `main` before [`AppConfig::from_env`] runs, so every
//! setting can come from either source. Numeric settings fall back to their
//! default when absent or unparsable; `PORT` is strict because a typo there
//! should stop startup rather than bind somewhere unexpected.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_ASSET_FETCH_TIMEOUT_SECS: u64 = 15;
pub const DEFAULT_MAX_ASSET_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_MAX_BULK_ROWS: usize = 500;
pub const DEFAULT_BULK_TIMEOUT_SECS: u64 = 300;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("{key} must be greater than zero")]
    Zero { key: &'static str },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub port: u16,
    /// Extra font directory loaded on top of system fonts.
    pub font_dir: Option<PathBuf>,
    pub asset_fetch_timeout: Duration,
    pub max_asset_bytes: usize,
    /// Let image sources reach loopback, private, and link-local hosts.
    pub allow_private_asset_hosts: bool,
    pub max_bulk_rows: usize,
    pub bulk_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            font_dir: None,
            asset_fetch_timeout: Duration::from_secs(DEFAULT_ASSET_FETCH_TIMEOUT_SECS),
            max_asset_bytes: DEFAULT_MAX_ASSET_BYTES,
            allow_private_asset_hosts: false,
            max_bulk_rows: DEFAULT_MAX_BULK_ROWS,
            bulk_timeout: Duration::from_secs(DEFAULT_BULK_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    /// Build typed config from environment variables.
    ///
    /// Optional:
    /// - `PORT`: default 3000
    /// - `FONT_DIR`: no extra fonts when absent or empty
    /// - `ASSET_FETCH_TIMEOUT_SECS`: default 15
    /// - `MAX_ASSET_BYTES`: default 10 MiB
    /// - `ALLOW_PRIVATE_ASSET_HOSTS`: `true` to allow non-public hosts; default `false`
    /// - `MAX_BULK_ROWS`: default 500
    /// - `BULK_TIMEOUT_SECS`: default 300
    ///
    /// # Errors
    ///
    /// `Invalid` for an unparsable `PORT`, `Zero` for any zero limit.
    pub fn from_env() -> Result<Self, ConfigError> {
        let port = match std::env::var("PORT") {
            Ok(raw) => raw
                .trim()
                .parse::<u16>()
                .map_err(|_| ConfigError::Invalid { key: "PORT", value: raw.clone() })?,
            Err(_) => DEFAULT_PORT,
        };
        let font_dir = std::env::var("FONT_DIR")
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from);

        let config = Self {
            port,
            font_dir,
            asset_fetch_timeout: Duration::from_secs(nonzero(
                "ASSET_FETCH_TIMEOUT_SECS",
                env_parse("ASSET_FETCH_TIMEOUT_SECS", DEFAULT_ASSET_FETCH_TIMEOUT_SECS),
            )?),
            max_asset_bytes: nonzero("MAX_ASSET_BYTES", env_parse("MAX_ASSET_BYTES", DEFAULT_MAX_ASSET_BYTES))?,
            allow_private_asset_hosts: env_parse("ALLOW_PRIVATE_ASSET_HOSTS", false),
            max_bulk_rows: nonzero("MAX_BULK_ROWS", env_parse("MAX_BULK_ROWS", DEFAULT_MAX_BULK_ROWS))?,
            bulk_timeout: Duration::from_secs(nonzero(
                "BULK_TIMEOUT_SECS",
                env_parse("BULK_TIMEOUT_SECS", DEFAULT_BULK_TIMEOUT_SECS),
            )?),
        };
        Ok(config)
    }
}

/// Parse an environment variable, falling back to `default` when absent or invalid.
pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse::<T>().ok())
        .unwrap_or(default)
}

fn nonzero<T>(key: &'static str, value: T) -> Result<T, ConfigError>
where
    T: PartialEq + Default,
{
    if value == T::default() { Err(ConfigError::Zero { key }) } else { Ok(value) }
}
