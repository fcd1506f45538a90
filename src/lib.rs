//! # streamagg
//!
//! Bounded-memory streaming aggregation of large CSV objects.
//!
//! A run reads `Hospital,Diagnosis,Treatment,Recovery Time` rows from a blob
//! store in fixed-size byte ranges, groups them by `(hospital, diagnosis)` and
//! writes one summary per group (average recovery time and most used
//! treatment) to a record sink in batches of at most 25 items.
//!
//! ## Usage
//!
//! ```bash
//! streamagg run --bucket assets --key rows.csv --table averages
//! streamagg generate --rows 1000000 --output rows.csv
//! ```
//!
//! ## Modules
//!
//! - `config` - Engine tunables and layered file/environment configuration
//! - `dataset` - Synthetic input generator for load testing
//! - `error` - Run errors and malformed-row reporting with error codes
//! - `pipeline` - Chunk reading, line reconstruction, parsing, aggregation and emission
//! - `storage` - Blob store and record sink abstractions with file and AWS backends plus in-memory test doubles
pub mod config;
pub mod dataset;
pub mod error;
pub mod pipeline;
pub mod storage;

pub use config::{AppConfig, EngineConfig};
pub use error::{MalformedRowError, RunError};
pub use pipeline::{Engine, RunResult, SummaryRecord};
pub use storage::ObjectId;
