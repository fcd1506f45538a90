use std::fmt::Display;
use thiserror::Error;

use crate::storage::StorageError;

pub mod codes;

pub use codes::{describe_error_code, ErrorCode};

/// Fatal error of one aggregation run.
///
/// A run either completes or fails as a whole with one of these kinds.
/// Malformed rows are not part of this enum: they are recovered locally
/// and reported through [`crate::pipeline::RunResult`].
#[derive(Error, Debug)]
pub enum RunError {
    #[error("[E{code:04}] Configuration error: {message}")]
    Config {
        code: u16,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Transfer error: {message}")]
    Transfer {
        code: u16,
        message: String,
        object: Option<String>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("[E{code:04}] Persistence error: {message}")]
    Persistence {
        code: u16,
        message: String,
        batch_index: Option<usize>,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl RunError {
    /// Create a configuration error with default code
    pub fn config(message: impl Into<String>) -> Self {
        Self::config_with_code(ErrorCode::CONFIG_GENERIC, message)
    }

    /// Create a configuration error with specific code
    pub fn config_with_code(code: u16, message: impl Into<String>) -> Self {
        Self::Config {
            code,
            message: message.into(),
            source: None,
        }
    }

    /// Create a transfer error with specific code and object
    pub fn transfer_with_code(
        code: u16,
        message: impl Into<String>,
        object: Option<String>,
    ) -> Self {
        Self::Transfer {
            code,
            message: message.into(),
            object,
            source: None,
        }
    }

    /// Create a persistence error with specific code and batch index
    pub fn persistence_with_code(
        code: u16,
        message: impl Into<String>,
        batch_index: Option<usize>,
    ) -> Self {
        Self::Persistence {
            code,
            message: message.into(),
            batch_index,
            source: None,
        }
    }

    /// Wrap a blob store failure raised while reading `object`
    pub fn from_transfer(err: StorageError, object: impl Display) -> Self {
        let code = match &err {
            StorageError::NotFound(_) => ErrorCode::TRANSFER_OBJECT_NOT_FOUND,
            StorageError::InvalidContentRange(_) => ErrorCode::TRANSFER_INVALID_RANGE,
            StorageError::ShortRead { .. } => ErrorCode::TRANSFER_SHORT_READ,
            StorageError::Io(_) => ErrorCode::TRANSFER_IO_ERROR,
            StorageError::Unavailable(_) => ErrorCode::TRANSFER_UNAVAILABLE,
            StorageError::Configuration(_) => ErrorCode::CONFIG_INVALID_VALUE,
            _ => ErrorCode::TRANSFER_GENERIC,
        };

        Self::transfer_with_code(code, err.to_string(), Some(object.to_string())).with_source(err)
    }

    /// Wrap a sink failure raised while writing batch `batch_index`
    pub fn from_persistence(err: StorageError, batch_index: usize) -> Self {
        let code = match &err {
            StorageError::BatchTooLarge { .. } => ErrorCode::PERSIST_BATCH_TOO_LARGE,
            StorageError::Throttled(_) => ErrorCode::PERSIST_THROTTLED,
            StorageError::Io(_) => ErrorCode::PERSIST_IO_ERROR,
            StorageError::Serialization(_) => ErrorCode::PERSIST_SERIALIZATION_ERROR,
            StorageError::Unavailable(_) => ErrorCode::PERSIST_UNAVAILABLE,
            _ => ErrorCode::PERSIST_GENERIC,
        };

        Self::persistence_with_code(code, err.to_string(), Some(batch_index)).with_source(err)
    }

    /// Add a source error to this error
    pub fn with_source(
        mut self,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        match &mut self {
            Self::Config { source: src, .. }
            | Self::Transfer { source: src, .. }
            | Self::Persistence { source: src, .. } => {
                *src = Some(source.into());
            }
        }
        self
    }

    /// Get the error code
    pub fn code(&self) -> u16 {
        match self {
            Self::Config { code, .. }
            | Self::Transfer { code, .. }
            | Self::Persistence { code, .. } => *code,
        }
    }

    /// Get the process exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Config { .. } => 2,
            Self::Transfer { .. } => 3,
            Self::Persistence { .. } => 4,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config { message, .. } => format!("Configuration problem: {}", message),
            Self::Transfer {
                message, object, ..
            } => match object {
                Some(object) => format!("Failed to read {}: {}", object, message),
                None => format!("Failed to read source object: {}", message),
            },
            Self::Persistence {
                message,
                batch_index,
                ..
            } => match batch_index {
                Some(index) => format!("Failed to write batch {}: {}", index, message),
                None => format!("Failed to write results: {}", message),
            },
        }
    }
}

/// Why a row was skipped
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MalformedReason {
    /// The row did not split into exactly four fields
    ColumnCount { found: usize },
    /// The measure field is not a finite number
    InvalidMeasure { value: String },
    /// The measure field is a number below zero
    NegativeMeasure { value: String },
    /// The raw row bytes were not valid UTF-8
    InvalidEncoding,
}

impl MalformedReason {
    /// Registry code for this reason
    pub fn code(&self) -> u16 {
        match self {
            Self::ColumnCount { .. } => ErrorCode::ROW_COLUMN_COUNT,
            Self::InvalidMeasure { .. } => ErrorCode::ROW_INVALID_MEASURE,
            Self::NegativeMeasure { .. } => ErrorCode::ROW_NEGATIVE_MEASURE,
            Self::InvalidEncoding => ErrorCode::ROW_INVALID_ENCODING,
        }
    }
}

impl Display for MalformedReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ColumnCount { found } => write!(f, "expected 4 columns, found {}", found),
            Self::InvalidMeasure { value } => write!(f, "measure '{}' is not a number", value),
            Self::NegativeMeasure { value } => write!(f, "measure '{}' is negative", value),
            Self::InvalidEncoding => write!(f, "row is not valid UTF-8"),
        }
    }
}

/// A row that could not be parsed into a record.
///
/// Never fatal: the row is skipped and counted.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("[E{code:04}] Malformed row at line {line_number}: {reason}", code = .reason.code())]
pub struct MalformedRowError {
    /// 1-based physical line number in the source object (0 when unknown)
    pub line_number: u64,
    pub line: String,
    pub reason: MalformedReason,
}

impl MalformedRowError {
    pub fn new(line: impl Into<String>, reason: MalformedReason) -> Self {
        Self {
            line_number: 0,
            line: line.into(),
            reason,
        }
    }

    pub fn at_line(mut self, line_number: u64) -> Self {
        self.line_number = line_number;
        self
    }
}

/// Type alias for Results using RunError
pub type Result<T> = std::result::Result<T, RunError>;
