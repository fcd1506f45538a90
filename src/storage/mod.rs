//! Storage collaborators for the aggregation engine
//!
//! The engine consumes two capabilities: range-addressable reads of a named
//! object ([`BlobStore`]) and batched, idempotent upserts of keyed items
//! ([`RecordSink`]). Backends live in [`backends`]; [`StorageFactory`] picks
//! one of each from a [`StorageConfig`].

pub mod backends;
pub mod config;
pub mod error;
pub mod factory;
pub mod traits;
pub mod types;

pub use config::{BlobBackend, RetryPolicy, SinkBackend, StorageConfig};
pub use error::{StorageError, StorageResult};
pub use factory::StorageFactory;
pub use traits::{BlobStore, RecordSink, DEFAULT_SINK_BATCH_LIMIT};
pub use types::{AttributeValue, ContentRange, ItemKey, ObjectId, RangeResponse, SinkItem};
