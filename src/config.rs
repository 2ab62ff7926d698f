//! Server configuration, read from the environment (after `.env`).

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

pub const DEFAULT_PORT: u16 = 4000;
pub const DEFAULT_UPLOAD_DIR: &str = "uploads";
pub const DEFAULT_BODY_LIMIT: usize = 100 * 1024 * 1024;
pub const DEFAULT_DISK_CAP: u64 = 10 * 1024 * 1024 * 1024; // 10 GB
pub const DEFAULT_SWEEP_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Listen address, `BIND_ADDRESS` or `0.0.0.0:$PORT`.
    pub bind_address: String,
    pub upload_dir: PathBuf,
    /// Prefix for image URLs handed back by `/upload`. When unset the
    /// request's `Host` header is used.
    pub public_base_url: Option<String>,
    pub body_limit: usize,
    pub upload_disk_cap: u64,
    pub upload_sweep_interval: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {name}: {value:?}")]
    InvalidValue { name: &'static str, value: String },
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let port: u16 = parse_or(vars, "PORT", DEFAULT_PORT)?;
        let bind_address = vars
            .get("BIND_ADDRESS")
            .filter(|v| !v.is_empty())
            .cloned()
            .unwrap_or_else(|| format!("0.0.0.0:{port}"));
        let upload_dir = vars
            .get("UPLOAD_DIR")
            .filter(|v| !v.is_empty())
            .map_or_else(|| PathBuf::from(DEFAULT_UPLOAD_DIR), PathBuf::from);
        let public_base_url = vars
            .get("PUBLIC_BASE_URL")
            .map(|v| v.trim_end_matches('/').to_owned())
            .filter(|v| !v.is_empty());

        Ok(Self {
            bind_address,
            upload_dir,
            public_base_url,
            body_limit: parse_or(vars, "BODY_LIMIT_BYTES", DEFAULT_BODY_LIMIT)?,
            upload_disk_cap: parse_or(vars, "UPLOAD_DISK_CAP_BYTES", DEFAULT_DISK_CAP)?,
            upload_sweep_interval: sweep_interval(vars)?,
        })
    }
}

/// The janitor ticks on this period, so it has to be non-zero.
fn sweep_interval(vars: &HashMap<String, String>) -> Result<Duration, ConfigError> {
    match parse_or(vars, "UPLOAD_SWEEP_SECS", DEFAULT_SWEEP_SECS)? {
        0 => Err(ConfigError::InvalidValue {
            name: "UPLOAD_SWEEP_SECS",
            value: "0".to_owned(),
        }),
        secs => Ok(Duration::from_secs(secs)),
    }
}

fn parse_or<T: std::str::FromStr>(
    vars: &HashMap<String, String>,
    name: &'static str,
    default: T,
) -> Result<T, ConfigError> {
    match vars.get(name).map(|v| v.trim()).filter(|v| !v.is_empty()) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            name,
            value: raw.to_owned(),
        }),
    }
}
