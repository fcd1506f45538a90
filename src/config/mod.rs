//! Configuration for an aggregation run
//!
//! Values are layered: built-in defaults, then an optional TOML file, then
//! environment variables, then command-line flags (applied by the binary).

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ErrorCode, RunError};
use crate::storage::{StorageConfig, DEFAULT_SINK_BATCH_LIMIT};

/// Default number of bytes requested per range read (10 MiB)
pub const DEFAULT_CHUNK_SIZE: u64 = 10 * 1024 * 1024;

/// Tunables of the streaming engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bytes requested per range read
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,

    /// Items per sink call
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// How many skipped rows are kept as samples in the run result
    #[serde(default = "default_max_reported_malformed")]
    pub max_reported_malformed: usize,

    /// Whether the first line of the object is a header
    #[serde(default = "default_true")]
    pub has_header: bool,
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_max_batch_size() -> usize {
    DEFAULT_SINK_BATCH_LIMIT
}

fn default_max_reported_malformed() -> usize {
    10
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            max_batch_size: default_max_batch_size(),
            max_reported_malformed: default_max_reported_malformed(),
            has_header: true,
        }
    }
}

impl EngineConfig {
    /// Reject values the engine cannot run with
    pub fn validate(&self) -> Result<(), RunError> {
        if self.chunk_size == 0 {
            return Err(RunError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                "chunk_size must be greater than zero",
            ));
        }
        if self.max_batch_size == 0 || self.max_batch_size > DEFAULT_SINK_BATCH_LIMIT {
            return Err(RunError::config_with_code(
                ErrorCode::CONFIG_INVALID_VALUE,
                format!(
                    "max_batch_size must be between 1 and {}, got {}",
                    DEFAULT_SINK_BATCH_LIMIT, self.max_batch_size
                ),
            ));
        }
        Ok(())
    }
}

/// What to process and where to put the results
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobConfig {
    /// Bucket (or directory under the file backend's base dir) of the source
    #[serde(default)]
    pub bucket: String,

    /// Object key of the source CSV
    #[serde(default)]
    pub key: Option<String>,

    /// Destination table
    #[serde(default)]
    pub table: Option<String>,
}

/// Complete application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub job: JobConfig,
}

impl AppConfig {
    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self, RunError> {
        toml::from_str(content).map_err(|e| {
            RunError::config_with_code(ErrorCode::CONFIG_INVALID_TOML, e.to_string())
                .with_source(e)
        })
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, RunError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            let code = if e.kind() == std::io::ErrorKind::NotFound {
                ErrorCode::CONFIG_NOT_FOUND
            } else {
                ErrorCode::CONFIG_GENERIC
            };
            RunError::config_with_code(code, format!("cannot read {}", path.display()))
                .with_source(e)
        })?;
        Self::from_toml_str(&content)
    }

    /// Load an optional file, then apply environment overrides
    pub fn resolve(path: Option<&Path>) -> Result<Self, RunError> {
        let config = match path {
            Some(path) => Self::load(path)?,
            None => Self::default(),
        };
        config.apply_env()
    }

    /// Apply environment variable overrides.
    ///
    /// `S3_BUCKET`, `FILE_NAME` and `DB_TABLE` name the job; the
    /// `STREAMAGG_*` variables tune the engine and pick storage backends.
    pub fn apply_env(mut self) -> Result<Self, RunError> {
        if let Ok(bucket) = std::env::var("S3_BUCKET") {
            self.job.bucket = bucket;
        }
        if let Ok(key) = std::env::var("FILE_NAME") {
            self.job.key = Some(key);
        }
        if let Ok(table) = std::env::var("DB_TABLE") {
            self.job.table = Some(table);
        }
        if let Ok(value) = std::env::var("STREAMAGG_CHUNK_SIZE") {
            self.engine.chunk_size = value.trim().parse().map_err(|_| {
                RunError::config_with_code(
                    ErrorCode::CONFIG_INVALID_VALUE,
                    format!("STREAMAGG_CHUNK_SIZE is not a byte count: '{}'", value),
                )
            })?;
        }

        self.storage = self.storage.apply_env().map_err(|e| {
            RunError::config_with_code(ErrorCode::CONFIG_INVALID_VALUE, e.to_string())
                .with_source(e)
        })?;

        Ok(self)
    }

    /// Validate every section
    pub fn validate(&self) -> Result<(), RunError> {
        self.engine.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{BlobBackend, SinkBackend};
    use serial_test::serial;
    use std::env;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_engine_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.chunk_size, 10 * 1024 * 1024);
        assert_eq!(config.max_batch_size, 25);
        assert_eq!(config.max_reported_malformed, 10);
        assert!(config.has_header);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_engine_validation() {
        let zero_chunk = EngineConfig {
            chunk_size: 0,
            ..Default::default()
        };
        assert_eq!(
            zero_chunk.validate().unwrap_err().code(),
            ErrorCode::CONFIG_INVALID_VALUE
        );

        let big_batch = EngineConfig {
            max_batch_size: 26,
            ..Default::default()
        };
        assert!(big_batch.validate().is_err());

        let zero_batch = EngineConfig {
            max_batch_size: 0,
            ..Default::default()
        };
        assert!(zero_batch.validate().is_err());
    }

    #[test]
    fn test_parse_full_toml() {
        let config = AppConfig::from_toml_str(
            r#"
            [engine]
            chunk_size = 4096
            max_batch_size = 10

            [storage]
            blob_backend = "s3"
            sink_backend = "dynamodb"
            base_dir = "/data"

            [storage.retry_policy]
            max_retries = 1
            initial_delay = "50ms"

            [job]
            bucket = "assets"
            key = "rows.csv"
            table = "averages"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.chunk_size, 4096);
        assert_eq!(config.engine.max_batch_size, 10);
        assert!(config.engine.has_header);
        assert_eq!(config.storage.blob_backend, BlobBackend::S3);
        assert_eq!(config.storage.sink_backend, SinkBackend::DynamoDb);
        assert_eq!(config.storage.retry_policy.max_retries, 1);
        assert_eq!(
            config.storage.retry_policy.initial_delay,
            Duration::from_millis(50)
        );
        assert_eq!(config.job.bucket, "assets");
        assert_eq!(config.job.key.as_deref(), Some("rows.csv"));
        assert_eq!(config.job.table.as_deref(), Some("averages"));
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = AppConfig::from_toml_str("").unwrap();
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.job, JobConfig::default());
    }

    #[test]
    fn test_invalid_toml() {
        let err = AppConfig::from_toml_str("[engine\nchunk_size = 1").unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_INVALID_TOML);
    }

    #[test]
    fn test_load_missing_file() {
        let err = AppConfig::load(Path::new("/definitely/not/here.toml")).unwrap_err();
        assert_eq!(err.code(), ErrorCode::CONFIG_NOT_FOUND);
    }

    #[test]
    #[serial]
    fn test_resolve_file_then_env() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[job]\nbucket = \"from-file\"\nkey = \"file.csv\"").unwrap();

        env::set_var("FILE_NAME", "env.csv");
        env::set_var("DB_TABLE", "env-table");
        env::set_var("STREAMAGG_CHUNK_SIZE", "1024");

        let config = AppConfig::resolve(Some(file.path()));

        env::remove_var("FILE_NAME");
        env::remove_var("DB_TABLE");
        env::remove_var("STREAMAGG_CHUNK_SIZE");

        let config = config.unwrap();
        assert_eq!(config.job.bucket, "from-file");
        assert_eq!(config.job.key.as_deref(), Some("env.csv"));
        assert_eq!(config.job.table.as_deref(), Some("env-table"));
        assert_eq!(config.engine.chunk_size, 1024);
    }

    #[test]
    #[serial]
    fn test_env_rejects_bad_chunk_size() {
        env::set_var("STREAMAGG_CHUNK_SIZE", "ten megs");
        let result = AppConfig::default().apply_env();
        env::remove_var("STREAMAGG_CHUNK_SIZE");

        assert_eq!(result.unwrap_err().code(), ErrorCode::CONFIG_INVALID_VALUE);
    }
}
