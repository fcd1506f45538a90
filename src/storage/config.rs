//! Storage configuration types and utilities

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use super::error::{StorageError, StorageResult};

/// Where source objects are read from
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlobBackend {
    /// Local files under `base_dir` (default)
    #[default]
    File,
    /// Amazon S3 ranged GetObject
    S3,
}

impl BlobBackend {
    pub fn parse(value: &str) -> StorageResult<Self> {
        match value.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "s3" => Ok(Self::S3),
            other => Err(StorageError::configuration(format!(
                "unknown blob backend '{other}' (expected file or s3)"
            ))),
        }
    }
}

/// Where summary items are written to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SinkBackend {
    /// One JSON document per table under `base_dir` (default)
    #[default]
    File,
    /// Amazon DynamoDB BatchWriteItem
    DynamoDb,
}

impl SinkBackend {
    pub fn parse(value: &str) -> StorageResult<Self> {
        match value.to_lowercase().as_str() {
            "file" => Ok(Self::File),
            "dynamodb" => Ok(Self::DynamoDb),
            other => Err(StorageError::configuration(format!(
                "unknown sink backend '{other}' (expected file or dynamodb)"
            ))),
        }
    }
}

/// Main storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Blob store backend
    #[serde(default)]
    pub blob_backend: BlobBackend,

    /// Sink backend
    #[serde(default)]
    pub sink_backend: SinkBackend,

    /// Root directory of the file backends
    #[serde(default = "default_base_dir")]
    pub base_dir: PathBuf,

    /// Custom endpoint for the AWS backends (e.g. localstack)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Retry policy for throttled sink writes
    #[serde(default)]
    pub retry_policy: RetryPolicy,
}

/// Retry policy configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Maximum retry attempts
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial retry delay
    #[serde(with = "humantime_serde", default = "default_retry_delay")]
    pub initial_delay: Duration,

    /// Maximum retry delay
    #[serde(with = "humantime_serde", default = "default_max_retry_delay")]
    pub max_delay: Duration,

    /// Exponential backoff multiplier
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Enable jitter
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay: default_retry_delay(),
            max_delay: default_max_retry_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Backoff before retry number `attempt` (1-based), without jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let factor = self.backoff_multiplier.max(1.0).powi(exponent);
        self.initial_delay.mul_f64(factor).min(self.max_delay)
    }

    /// Backoff before retry number `attempt`, with up to 50% jitter subtracted
    pub fn jittered_delay(&self, attempt: u32) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        if !self.jitter || delay.is_zero() {
            return delay;
        }
        let factor = rand::rng().random_range(0.5..=1.0);
        delay.mul_f64(factor).min(delay)
    }
}

// Default value functions for serde
fn default_base_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    5
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_max_retry_delay() -> Duration {
    Duration::from_secs(5)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            blob_backend: BlobBackend::default(),
            sink_backend: SinkBackend::default(),
            base_dir: default_base_dir(),
            endpoint: None,
            retry_policy: RetryPolicy::default(),
        }
    }
}

impl StorageConfig {
    /// Apply `STREAMAGG_*` environment overrides on top of `self`
    pub fn apply_env(mut self) -> StorageResult<Self> {
        if let Ok(value) = std::env::var("STREAMAGG_BLOB_BACKEND") {
            self.blob_backend = BlobBackend::parse(&value)?;
        }
        if let Ok(value) = std::env::var("STREAMAGG_SINK_BACKEND") {
            self.sink_backend = SinkBackend::parse(&value)?;
        }
        if let Ok(dir) = std::env::var("STREAMAGG_STORAGE_DIR") {
            self.base_dir = PathBuf::from(dir);
        }
        if let Ok(endpoint) = std::env::var("STREAMAGG_AWS_ENDPOINT") {
            self.endpoint = Some(endpoint);
        }
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    fn test_backend_defaults() {
        let config = StorageConfig::default();
        assert_eq!(config.blob_backend, BlobBackend::File);
        assert_eq!(config.sink_backend, SinkBackend::File);
        assert_eq!(config.base_dir, PathBuf::from("."));
    }

    #[test]
    fn test_backend_serialization() {
        assert_eq!(serde_json::to_string(&BlobBackend::S3).unwrap(), r#""s3""#);
        assert_eq!(
            serde_json::to_string(&SinkBackend::DynamoDb).unwrap(),
            r#""dynamodb""#
        );
        let backend: SinkBackend = serde_json::from_str(r#""file""#).unwrap();
        assert_eq!(backend, SinkBackend::File);
    }

    #[test]
    fn test_backend_parse_rejects_unknown() {
        assert!(BlobBackend::parse("gcs").is_err());
        assert_eq!(BlobBackend::parse("S3").unwrap(), BlobBackend::S3);
        assert!(SinkBackend::parse("postgres").is_err());
    }

    #[test]
    fn test_memory_backends_are_not_selectable() {
        assert!(BlobBackend::parse("memory").is_err());
        assert!(SinkBackend::parse("memory").is_err());
        assert!(serde_json::from_str::<BlobBackend>(r#""memory""#).is_err());
    }

    #[test]
    fn test_retry_delays_grow_and_cap() {
        let policy = RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(350),
            backoff_multiplier: 2.0,
            jitter: false,
        };

        assert_eq!(policy.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(350));
        assert_eq!(policy.jittered_delay(2), Duration::from_millis(200));
    }

    #[test]
    fn test_jittered_delay_stays_in_bounds() {
        let policy = RetryPolicy::default();
        for attempt in 1..=5 {
            let base = policy.delay_for_attempt(attempt);
            let jittered = policy.jittered_delay(attempt);
            assert!(jittered <= base);
            assert!(jittered >= base.mul_f64(0.5));
        }
    }

    #[test]
    fn test_retry_policy_humantime_toml() {
        let policy: RetryPolicy = toml::from_str(
            r#"
            max_retries = 2
            initial_delay = "250ms"
            max_delay = "2s"
            "#,
        )
        .unwrap();

        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.initial_delay, Duration::from_millis(250));
        assert_eq!(policy.max_delay, Duration::from_secs(2));
        assert_eq!(policy.backoff_multiplier, 2.0);
        assert!(policy.jitter);
    }

    #[test]
    #[serial]
    fn test_from_env_overrides() {
        env::set_var("STREAMAGG_BLOB_BACKEND", "s3");
        env::set_var("STREAMAGG_SINK_BACKEND", "dynamodb");
        env::set_var("STREAMAGG_STORAGE_DIR", "/tmp/streamagg-test");

        let config = StorageConfig::default().apply_env().unwrap();

        env::remove_var("STREAMAGG_BLOB_BACKEND");
        env::remove_var("STREAMAGG_SINK_BACKEND");
        env::remove_var("STREAMAGG_STORAGE_DIR");

        assert_eq!(config.blob_backend, BlobBackend::S3);
        assert_eq!(config.sink_backend, SinkBackend::DynamoDb);
        assert_eq!(config.base_dir, PathBuf::from("/tmp/streamagg-test"));
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_unknown_backend() {
        env::set_var("STREAMAGG_SINK_BACKEND", "cassandra");
        let result = StorageConfig::default().apply_env();
        env::remove_var("STREAMAGG_SINK_BACKEND");

        assert!(matches!(result, Err(StorageError::Configuration(_))));
    }
}
