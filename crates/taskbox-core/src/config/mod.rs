//! Sync engine configuration.
//!
//! The engine never reads process-wide state on its own: callers build a
//! [`SyncConfig`] (usually via [`SyncConfig::from_env`]) and hand it to the
//! engine at construction. Invalid values fail here, not mid-cycle.

use std::collections::HashMap;
use std::env;
use std::fmt;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::util::{is_http_url, normalize_text_option};

pub const DEFAULT_REMOTE_BASE_URL: &str = "http://localhost:3000/api";
pub const DEFAULT_BATCH_SIZE: usize = 50;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_EXCHANGE_TIMEOUT: Duration = Duration::from_secs(30);
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Configuration for the offline sync engine
#[derive(Clone, PartialEq, Eq)]
pub struct SyncConfig {
    /// Where the remote authority lives (e.g., `https://api.example.com/api`)
    pub remote_base_url: Url,
    /// Maximum number of outbox entries per remote exchange
    pub batch_size: usize,
    /// Failed deliveries allowed before an entry is evicted
    pub max_retries: u32,
    /// Upper bound for one batch exchange
    pub exchange_timeout: Duration,
    /// Upper bound for the liveness probe
    pub probe_timeout: Duration,
}

impl fmt::Debug for SyncConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("SyncConfig")
            .field("remote_base_url", &self.remote_base_url.as_str())
            .field("batch_size", &self.batch_size)
            .field("max_retries", &self.max_retries)
            .field("exchange_timeout", &self.exchange_timeout)
            .field("probe_timeout", &self.probe_timeout)
            .finish()
    }
}

impl SyncConfig {
    /// Create a configuration for the given base URL with default limits
    pub fn new(remote_base_url: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            remote_base_url: parse_base_url(remote_base_url)?,
            batch_size: DEFAULT_BATCH_SIZE,
            max_retries: DEFAULT_MAX_RETRIES,
            exchange_timeout: DEFAULT_EXCHANGE_TIMEOUT,
            probe_timeout: DEFAULT_PROBE_TIMEOUT,
        })
    }

    /// Set the batch size ceiling (clamped to at least 1)
    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Set the retry ceiling (clamped to at least 1)
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the exchange timeout
    #[must_use]
    pub const fn with_exchange_timeout(mut self, timeout: Duration) -> Self {
        self.exchange_timeout = timeout;
        self
    }

    /// Set the probe timeout
    #[must_use]
    pub const fn with_probe_timeout(mut self, timeout: Duration) -> Self {
        self.probe_timeout = timeout;
        self
    }

    /// Check limits a caller may have set directly on the public fields
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::Invalid(
                "batch_size must be at least 1".to_string(),
            ));
        }
        if self.max_retries == 0 {
            return Err(ConfigError::Invalid(
                "max_retries must be at least 1".to_string(),
            ));
        }
        if self.exchange_timeout.is_zero() || self.probe_timeout.is_zero() {
            return Err(ConfigError::Invalid(
                "timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Absolute URL for an endpoint below the base URL, e.g. `sync/batch`
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.remote_base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    /// Read configuration through an arbitrary lookup (used by tests)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = optional_trimmed(&lookup, "TASKBOX_REMOTE_BASE_URL")
            .or_else(|| optional_trimmed(&lookup, "API_BASE_URL"))
            .unwrap_or_else(|| DEFAULT_REMOTE_BASE_URL.to_string());

        let batch_size = parse_ranged(&lookup, "SYNC_BATCH_SIZE", DEFAULT_BATCH_SIZE, 1, 1_000)?;
        let max_retries = parse_ranged(&lookup, "MAX_SYNC_RETRIES", DEFAULT_MAX_RETRIES, 1, 100)?;
        let exchange_timeout_secs = parse_ranged(
            &lookup,
            "SYNC_EXCHANGE_TIMEOUT_SECS",
            DEFAULT_EXCHANGE_TIMEOUT.as_secs(),
            1,
            600,
        )?;
        let probe_timeout_secs = parse_ranged(
            &lookup,
            "SYNC_PROBE_TIMEOUT_SECS",
            DEFAULT_PROBE_TIMEOUT.as_secs(),
            1,
            60,
        )?;

        Ok(Self {
            remote_base_url: parse_base_url(&base_url)?,
            batch_size,
            max_retries,
            exchange_timeout: Duration::from_secs(exchange_timeout_secs),
            probe_timeout: Duration::from_secs(probe_timeout_secs),
        })
    }
}

fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let raw = normalize_text_option(Some(raw.to_string())).ok_or_else(|| {
        ConfigError::Invalid("remote base URL must not be empty".to_string())
    })?;
    if !is_http_url(&raw) {
        return Err(ConfigError::Invalid(
            "remote base URL must start with http:// or https://".to_string(),
        ));
    }
    Url::parse(&raw)
        .map_err(|error| ConfigError::Invalid(format!("remote base URL is malformed: {error}")))
}

fn parse_ranged<T>(
    lookup: impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
    min: T,
    max: T,
) -> Result<T, ConfigError>
where
    T: std::str::FromStr + PartialOrd + fmt::Display + Copy,
{
    let Some(raw) = optional_trimmed(lookup, name) else {
        return Ok(default);
    };
    let value = raw.parse::<T>().map_err(|_| {
        ConfigError::Invalid(format!("{name} must be an integer in [{min}, {max}]"))
    })?;
    if value < min || value > max {
        return Err(ConfigError::Invalid(format!(
            "{name} must be in [{min}, {max}]"
        )));
    }
    Ok(value)
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}
