//! Configuration types for task-dl

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Main configuration for [`TaskManager`](crate::TaskManager)
///
/// Every field has a serde default, so an empty JSON object is a valid config.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Config {
    /// Number of worker loops pulling tasks from the queue (default: 4)
    #[serde(default = "default_worker_count")]
    pub worker_count: usize,

    /// Maximum simultaneous file downloads within one task (default: 20)
    #[serde(default = "default_max_concurrent_files")]
    pub max_concurrent_files: usize,

    /// Capacity of the in-memory task queue (default: 1024)
    ///
    /// When the queue is full, `submit` waits for a free slot.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,

    /// Root directory for downloaded files (default: "storage")
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,

    /// SQLite database file (default: "database/tasks.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// Timeout applied to each HTTP request (default: 60 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// How long shutdown lets in-flight downloads finish before cancelling them (default: 30 seconds)
    #[serde(default = "default_shutdown_grace", with = "duration_serde")]
    pub shutdown_grace: Duration,

    /// Retry policy for file downloads
    #[serde(default)]
    pub retry: RetryConfig,

    /// Retry policy for task record writes after a status transition
    #[serde(default = "default_persist_retry")]
    pub persist_retry: RetryConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            worker_count: default_worker_count(),
            max_concurrent_files: default_max_concurrent_files(),
            queue_capacity: default_queue_capacity(),
            storage_dir: default_storage_dir(),
            database_path: default_database_path(),
            request_timeout: default_request_timeout(),
            shutdown_grace: default_shutdown_grace(),
            retry: RetryConfig::default(),
            persist_retry: default_persist_retry(),
        }
    }
}

impl Config {
    /// Check the settings the core depends on
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(config_error("worker_count must be at least 1", "worker_count"));
        }
        if self.max_concurrent_files == 0 {
            return Err(config_error(
                "max_concurrent_files must be at least 1",
                "max_concurrent_files",
            ));
        }
        if self.queue_capacity == 0 {
            return Err(config_error(
                "queue_capacity must be at least 1",
                "queue_capacity",
            ));
        }
        if self.storage_dir.as_os_str().is_empty() {
            return Err(config_error("storage_dir must not be empty", "storage_dir"));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(config_error(
                "database_path must not be empty",
                "database_path",
            ));
        }
        self.retry.validate("retry")?;
        self.persist_retry.validate("persist_retry")?;
        Ok(())
    }
}

fn config_error(message: &str, key: &str) -> Error {
    Error::Config {
        message: message.to_string(),
        key: Some(key.to_string()),
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 5)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,

    /// Total time budget for one operation including retries (default: 300 seconds)
    ///
    /// No retry is scheduled once the next wait would end past this budget.
    /// `None` leaves only `max_attempts` as the bound.
    #[serde(default = "default_max_elapsed", with = "optional_duration_serde")]
    pub max_elapsed: Option<Duration>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
            max_elapsed: default_max_elapsed(),
        }
    }
}

impl RetryConfig {
    fn validate(&self, key: &str) -> Result<()> {
        if self.backoff_multiplier.is_nan() || self.backoff_multiplier < 1.0 {
            return Err(config_error(
                "backoff_multiplier must be at least 1.0",
                &format!("{key}.backoff_multiplier"),
            ));
        }
        if self.initial_delay > self.max_delay {
            return Err(config_error(
                "initial_delay must not exceed max_delay",
                &format!("{key}.initial_delay"),
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_worker_count() -> usize {
    4
}

fn default_max_concurrent_files() -> usize {
    20
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("storage")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("database/tasks.db")
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(60)
}

fn default_shutdown_grace() -> Duration {
    Duration::from_secs(30)
}

fn default_persist_retry() -> RetryConfig {
    RetryConfig {
        max_attempts: 3,
        initial_delay: Duration::from_millis(100),
        max_delay: Duration::from_secs(2),
        backoff_multiplier: 2.0,
        jitter: false,
        max_elapsed: None,
    }
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_max_elapsed() -> Option<Duration> {
    Some(Duration::from_secs(300))
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_json_object_yields_defaults() {
        let config: Config = serde_json::from_str("{}").expect("deserialize failed");

        assert_eq!(config.worker_count, 4);
        assert_eq!(config.max_concurrent_files, 20);
        assert_eq!(config.queue_capacity, 1024);
        assert_eq!(config.storage_dir, PathBuf::from("storage"));
        assert_eq!(config.database_path, PathBuf::from("database/tasks.db"));
        assert_eq!(config.request_timeout, Duration::from_secs(60));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.max_elapsed, Some(Duration::from_secs(300)));
        assert_eq!(config.persist_retry.max_attempts, 3);
        assert_eq!(config.persist_retry.max_elapsed, None);
    }

    #[test]
    fn default_config_is_valid() {
        Config::default().validate().expect("defaults must validate");
    }

    #[test]
    fn zero_workers_is_rejected_with_key() {
        let config = Config {
            worker_count: 0,
            ..Config::default()
        };

        match config.validate() {
            Err(Error::Config { key, .. }) => assert_eq!(key.as_deref(), Some("worker_count")),
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn zero_file_concurrency_is_rejected() {
        let config = Config {
            max_concurrent_files: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn zero_queue_capacity_is_rejected() {
        let config = Config {
            queue_capacity: 0,
            ..Config::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn shrinking_backoff_multiplier_is_rejected() {
        let mut config = Config::default();
        config.retry.backoff_multiplier = 0.5;

        match config.validate() {
            Err(Error::Config { key, .. }) => {
                assert_eq!(key.as_deref(), Some("retry.backoff_multiplier"))
            }
            other => panic!("expected config error, got {other:?}"),
        }
    }

    #[test]
    fn nan_backoff_multiplier_is_rejected() {
        let mut config = Config::default();
        config.persist_retry.backoff_multiplier = f64::NAN;
        assert!(config.validate().is_err());
    }

    #[test]
    fn durations_serialize_as_seconds() {
        let config = Config {
            request_timeout: Duration::from_secs(15),
            ..Config::default()
        };

        let json = serde_json::to_value(&config).expect("serialize failed");

        assert_eq!(json["request_timeout"], 15);
        assert_eq!(json["retry"]["initial_delay"], 1);
        assert_eq!(json["retry"]["max_elapsed"], 300);
        assert!(json["persist_retry"]["max_elapsed"].is_null());
    }

    #[test]
    fn partial_json_overrides_only_given_fields() {
        let json = r#"{"worker_count": 8, "storage_dir": "/srv/files", "retry": {"max_attempts": 2}}"#;

        let config: Config = serde_json::from_str(json).expect("deserialize failed");

        assert_eq!(config.worker_count, 8);
        assert_eq!(config.storage_dir, PathBuf::from("/srv/files"));
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_concurrent_files, 20);
    }

    #[test]
    fn duration_rejects_string_value() {
        let json = r#"{"request_timeout": "forever"}"#;
        assert!(serde_json::from_str::<Config>(json).is_err());
    }
}
