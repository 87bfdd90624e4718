//! Runtime configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honored for local development.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Sync runtime configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the hosted data service (without `/rest/v1`)
    pub remote_url: String,
    /// Public API key sent as the `apikey` header
    pub remote_api_key: String,
    /// Directory holding the local JSON collections
    pub data_dir: PathBuf,
    /// Reachability poll interval while the app is foregrounded
    pub poll_interval: Duration,
    /// Timeout for a single reachability probe
    pub probe_timeout: Duration,
    /// Upper bound on one "sync everything" pass
    pub sync_pass_timeout: Duration,
}

impl Config {
    pub const DEFAULT_DATA_DIR: &'static str = "./pawtrack-data";
    pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
    pub const DEFAULT_PROBE_TIMEOUT_MS: u64 = 5_000;
    pub const DEFAULT_SYNC_PASS_TIMEOUT_SECS: u64 = 120;

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        Ok(Self {
            remote_url: env::var("PAWTRACK_REMOTE_URL")
                .map(|v| v.trim().trim_end_matches('/').to_string())
                .map_err(|_| ConfigError::Missing("PAWTRACK_REMOTE_URL"))?,
            remote_api_key: env::var("PAWTRACK_REMOTE_API_KEY")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("PAWTRACK_REMOTE_API_KEY"))?,
            data_dir: env::var("PAWTRACK_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(Self::DEFAULT_DATA_DIR)),
            poll_interval: Duration::from_secs(parse_or(
                "PAWTRACK_POLL_INTERVAL_SECS",
                Self::DEFAULT_POLL_INTERVAL_SECS,
            )?),
            probe_timeout: Duration::from_millis(parse_or(
                "PAWTRACK_PROBE_TIMEOUT_MS",
                Self::DEFAULT_PROBE_TIMEOUT_MS,
            )?),
            sync_pass_timeout: Duration::from_secs(parse_or(
                "PAWTRACK_SYNC_PASS_TIMEOUT_SECS",
                Self::DEFAULT_SYNC_PASS_TIMEOUT_SECS,
            )?),
        })
    }

    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            remote_url: "http://localhost:54321".to_string(),
            remote_api_key: "test-api-key".to_string(),
            data_dir: PathBuf::from(Self::DEFAULT_DATA_DIR),
            poll_interval: Duration::from_secs(Self::DEFAULT_POLL_INTERVAL_SECS),
            probe_timeout: Duration::from_millis(Self::DEFAULT_PROBE_TIMEOUT_MS),
            sync_pass_timeout: Duration::from_secs(Self::DEFAULT_SYNC_PASS_TIMEOUT_SECS),
        }
    }
}

/// Parse an optional numeric variable, falling back to a default when unset.
fn parse_or(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(name, raw)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1:?}")]
    Invalid(&'static str, String),
}
