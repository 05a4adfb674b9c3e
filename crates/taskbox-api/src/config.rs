use std::collections::HashMap;
use std::env;
use std::fmt;
use std::path::PathBuf;

use taskbox_core::SyncConfig;
use thiserror::Error;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";
const DEFAULT_DB_PATH: &str = "data/taskbox.db";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error(transparent)]
    Sync(#[from] taskbox_core::ConfigError),
}

#[derive(Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub db_path: PathBuf,
    pub sync: SyncConfig,
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("AppConfig")
            .field("bind_addr", &self.bind_addr)
            .field("db_path", &self.db_path.display())
            .field("sync", &self.sync)
            .finish()
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let bind_addr = value_or_default(&lookup, "TASKBOX_API_BIND_ADDR", DEFAULT_BIND_ADDR);
        if !bind_addr.contains(':') {
            return Err(ConfigError::Invalid(
                "TASKBOX_API_BIND_ADDR must be host:port".to_string(),
            ));
        }

        let db_path = PathBuf::from(value_or_default(&lookup, "TASKBOX_DB_PATH", DEFAULT_DB_PATH));
        let sync = SyncConfig::from_lookup(&lookup)?;

        Ok(Self {
            bind_addr,
            db_path,
            sync,
        })
    }
}

fn value_or_default(lookup: impl Fn(&str) -> Option<String>, name: &str, default: &str) -> String {
    optional_trimmed(lookup, name).unwrap_or_else(|| default.to_string())
}

fn optional_trimmed(lookup: impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    lookup(name).and_then(|value| {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<AppConfig, ConfigError> {
        let map: HashMap<&str, &str> = pairs.iter().copied().collect();
        AppConfig::from_lookup(|key| map.get(key).map(|value| (*value).to_string()))
    }

    #[test]
    fn config_defaults_to_local_loopback() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:3000");
        assert_eq!(config.db_path, PathBuf::from("data/taskbox.db"));
        assert_eq!(config.sync.endpoint("sync/batch"), "http://localhost:3000/api/sync/batch");
    }

    #[test]
    fn config_reads_sync_settings() {
        let config = config_from(&[
            ("TASKBOX_API_BIND_ADDR", "0.0.0.0:8080"),
            ("TASKBOX_DB_PATH", "/var/lib/taskbox/tasks.db"),
            ("TASKBOX_REMOTE_BASE_URL", "https://sync.example.com/api"),
            ("SYNC_BATCH_SIZE", "5"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8080");
        assert_eq!(config.db_path, PathBuf::from("/var/lib/taskbox/tasks.db"));
        assert_eq!(config.sync.batch_size, 5);
    }

    #[test]
    fn config_rejects_invalid_values() {
        let err = config_from(&[("TASKBOX_API_BIND_ADDR", "localhost")]).unwrap_err();
        assert!(err.to_string().contains("TASKBOX_API_BIND_ADDR"));

        let err = config_from(&[("TASKBOX_REMOTE_BASE_URL", "ftp://nope")]).unwrap_err();
        assert!(matches!(err, ConfigError::Sync(_)));
    }
}
