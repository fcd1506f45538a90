//! Collaborator traits consumed by the aggregation engine

use async_trait::async_trait;

use super::error::StorageResult;
use super::types::{ObjectId, RangeResponse, SinkItem};

/// Per-call item limit of the key-value sink
pub const DEFAULT_SINK_BATCH_LIMIT: usize = 25;

/// Range-addressable read access to named objects
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Fetch the inclusive byte range `start..=end` of `object`.
    ///
    /// The store may return fewer bytes than requested when `end` lies past
    /// the end of the object; the returned content range is authoritative.
    async fn get_range(&self, object: &ObjectId, start: u64, end: u64)
        -> StorageResult<RangeResponse>;

    /// Short backend name used in logs
    fn backend_name(&self) -> &'static str;
}

/// Batched, idempotent upsert of keyed items
#[async_trait]
pub trait RecordSink: Send + Sync {
    /// Upsert `items` into `table`. Items with an existing key replace it.
    async fn batch_put(&self, table: &str, items: Vec<SinkItem>) -> StorageResult<()>;

    /// Largest batch accepted by one `batch_put` call
    fn max_batch_size(&self) -> usize {
        DEFAULT_SINK_BATCH_LIMIT
    }

    /// Short backend name used in logs
    fn backend_name(&self) -> &'static str;
}
