//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, ensure};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use tp_core::{DEFAULT_EVICTION_FRACTION, QueueLimits, RetryPolicy};

use crate::agent::AgentSettings;

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,
    /// Collector URL batches are POSTed to.
    pub endpoint: String,
    /// Events per request; a queue this long triggers a flush.
    pub batch_size: usize,
    /// Period of the flush timer.
    pub batch_interval_secs: u64,
    /// Maximum number of queued events at rest.
    pub queue_capacity: usize,
    /// Share of the capacity dropped on overflow.
    pub eviction_fraction: f64,
    /// Fixed backoff between retries of a failed batch.
    pub retry_delay_secs: u64,
    /// Retries per flush cycle after the first attempt.
    pub max_retries: u32,
    /// Consecutive failed attempts that suspend tracking.
    pub failure_threshold: u32,
    /// How often host-reported reachability is sampled.
    pub connectivity_poll_secs: u64,
    /// Per-request timeout for batch uploads.
    pub request_timeout_secs: u64,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("endpoint", &self.endpoint)
            .field("batch_size", &self.batch_size)
            .field("batch_interval_secs", &self.batch_interval_secs)
            .field("queue_capacity", &self.queue_capacity)
            .field("eviction_fraction", &self.eviction_fraction)
            .field("retry_delay_secs", &self.retry_delay_secs)
            .field("max_retries", &self.max_retries)
            .field("failure_threshold", &self.failure_threshold)
            .field("connectivity_poll_secs", &self.connectivity_poll_secs)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("tabpulse.db"),
            endpoint: "http://127.0.0.1:8080/events".to_string(),
            batch_size: 10,
            batch_interval_secs: 60,
            queue_capacity: 1000,
            eviction_fraction: DEFAULT_EVICTION_FRACTION,
            retry_delay_secs: 30,
            max_retries: 3,
            failure_threshold: 10,
            connectivity_poll_secs: 5,
            request_timeout_secs: tp_client::DEFAULT_TIMEOUT.as_secs(),
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (TABPULSE_*)
        figment = figment.merge(Env::prefixed("TABPULSE_"));

        figment.extract()
    }

    /// Checks the values and converts them into agent settings.
    pub fn agent_settings(&self) -> Result<AgentSettings> {
        ensure!(self.batch_size > 0, "batch_size must be at least 1");
        ensure!(
            self.batch_interval_secs > 0,
            "batch_interval_secs must be at least 1"
        );
        ensure!(
            self.connectivity_poll_secs > 0,
            "connectivity_poll_secs must be at least 1"
        );
        ensure!(
            self.request_timeout_secs > 0,
            "request_timeout_secs must be at least 1"
        );
        let limits = QueueLimits::new(self.queue_capacity, self.eviction_fraction)
            .context("invalid queue limits")?;
        let policy = RetryPolicy::new(self.max_retries, self.failure_threshold)
            .context("invalid retry policy")?;
        Ok(AgentSettings {
            batch_size: self.batch_size,
            batch_interval: Duration::from_secs(self.batch_interval_secs),
            retry_delay: Duration::from_secs(self.retry_delay_secs),
            connectivity_poll: Duration::from_secs(self.connectivity_poll_secs),
            limits,
            policy,
        })
    }

    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Path of the lock file guarding the database.
    pub fn lock_path(&self) -> PathBuf {
        self.database_path.with_extension("lock")
    }
}

/// Returns the platform-specific config directory for tabpulse.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("tabpulse"))
}

/// Returns the platform-specific data directory for tabpulse.
///
/// On Linux: `~/.local/share/tabpulse`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("tabpulse"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dirs_data_path_ends_with_tabpulse() {
        let path = dirs_data_path().unwrap();
        assert_eq!(path.file_name().unwrap(), "tabpulse");
    }

    #[test]
    fn test_default_config_uses_data_dir_for_db() {
        let config = Config::default();
        let data_dir = dirs_data_path().unwrap();
        assert_eq!(config.database_path, data_dir.join("tabpulse.db"));
    }

    #[test]
    fn test_default_config_is_valid() {
        let settings = Config::default().agent_settings().unwrap();
        assert_eq!(settings.batch_size, 10);
        assert_eq!(settings.limits.capacity(), 1000);
        assert_eq!(settings.policy.max_retries(), 3);
        assert_eq!(settings.retry_delay, Duration::from_secs(30));
        assert_eq!(Config::default().request_timeout(), tp_client::DEFAULT_TIMEOUT);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let cases: [fn(&mut Config); 5] = [
            |c| c.batch_size = 0,
            |c| c.queue_capacity = 0,
            |c| c.eviction_fraction = 1.5,
            |c| c.failure_threshold = 0,
            |c| c.batch_interval_secs = 0,
        ];
        for mutate in cases {
            let mut config = Config::default();
            mutate(&mut config);
            assert!(config.agent_settings().is_err(), "{config:?}");
        }
    }

    #[test]
    fn test_config_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "endpoint = \"https://collector.example.com/v1/events\"\nbatch_size = 25\n",
        )
        .unwrap();
        let config = Config::load_from(Some(&path)).unwrap();
        assert_eq!(config.endpoint, "https://collector.example.com/v1/events");
        assert_eq!(config.batch_size, 25);
        assert_eq!(config.queue_capacity, 1000);
    }

    #[test]
    fn test_lock_path_sits_next_to_database() {
        let config = Config {
            database_path: PathBuf::from("/tmp/tabpulse/tabpulse.db"),
            ..Config::default()
        };
        assert_eq!(config.lock_path(), PathBuf::from("/tmp/tabpulse/tabpulse.lock"));
    }
}
