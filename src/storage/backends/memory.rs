//! In-memory blob store and sink for testing

use async_trait::async_trait;
use indexmap::IndexMap;
use std::collections::HashMap;
use tokio::sync::{Mutex, RwLock};

use crate::storage::{
    error::{StorageError, StorageResult},
    traits::{BlobStore, RecordSink, DEFAULT_SINK_BATCH_LIMIT},
    types::{ContentRange, ItemKey, ObjectId, RangeResponse, SinkItem},
};

/// In-memory blob store with request recording and failure injection
#[derive(Default)]
pub struct MemoryBlobStore {
    objects: RwLock<HashMap<ObjectId, Vec<u8>>>,
    requests: Mutex<Vec<(u64, u64)>>,
    fail_on_request: Option<usize>,
}

impl MemoryBlobStore {
    /// Create an empty memory blob store
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object (builder style, for test setup)
    pub fn with_object(mut self, object: ObjectId, bytes: impl Into<Vec<u8>>) -> Self {
        self.objects.get_mut().insert(object, bytes.into());
        self
    }

    /// Fail the `index`-th range request (0-based) with a transfer error
    pub fn failing_on_request(mut self, index: usize) -> Self {
        self.fail_on_request = Some(index);
        self
    }

    /// Inclusive ranges requested so far, in order
    pub async fn requests(&self) -> Vec<(u64, u64)> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn get_range(
        &self,
        object: &ObjectId,
        start: u64,
        end: u64,
    ) -> StorageResult<RangeResponse> {
        let index = {
            let mut requests = self.requests.lock().await;
            requests.push((start, end));
            requests.len() - 1
        };

        if self.fail_on_request == Some(index) {
            return Err(StorageError::transfer(format!(
                "injected failure on request {index}"
            )));
        }

        let objects = self.objects.read().await;
        let data = objects
            .get(object)
            .ok_or_else(|| StorageError::not_found(object))?;

        let total = data.len() as u64;
        if total == 0 && start == 0 {
            return Ok(RangeResponse {
                bytes: Vec::new(),
                content_range: ContentRange::empty(),
            });
        }
        if start >= total || end < start {
            return Err(StorageError::invalid_content_range(format!(
                "range {start}-{end} not satisfiable for length {total}"
            )));
        }

        let end = end.min(total - 1);
        Ok(RangeResponse {
            bytes: data[start as usize..=end as usize].to_vec(),
            content_range: ContentRange::new(start, end, total),
        })
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// In-memory key-value sink with batch recording and failure injection
pub struct MemorySink {
    tables: RwLock<HashMap<String, IndexMap<ItemKey, SinkItem>>>,
    batch_sizes: Mutex<Vec<usize>>,
    max_batch_size: usize,
    fail_on_batch: Option<usize>,
}

impl Default for MemorySink {
    fn default() -> Self {
        Self {
            tables: RwLock::new(HashMap::new()),
            batch_sizes: Mutex::new(Vec::new()),
            max_batch_size: DEFAULT_SINK_BATCH_LIMIT,
            fail_on_batch: None,
        }
    }
}

impl MemorySink {
    /// Create an empty memory sink with the default batch limit
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the per-call item limit
    pub fn with_max_batch_size(mut self, max_batch_size: usize) -> Self {
        self.max_batch_size = max_batch_size;
        self
    }

    /// Fail the `index`-th batch call (0-based) with an unavailable error
    pub fn failing_on_batch(mut self, index: usize) -> Self {
        self.fail_on_batch = Some(index);
        self
    }

    /// Sizes of every batch call so far, including rejected ones
    pub async fn batch_sizes(&self) -> Vec<usize> {
        self.batch_sizes.lock().await.clone()
    }

    /// Items stored in `table`, in first-write order
    pub async fn items(&self, table: &str) -> Vec<SinkItem> {
        self.tables
            .read()
            .await
            .get(table)
            .map(|items| items.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Look up one item by key
    pub async fn get(&self, table: &str, key: &ItemKey) -> Option<SinkItem> {
        self.tables
            .read()
            .await
            .get(table)
            .and_then(|items| items.get(key).cloned())
    }
}

#[async_trait]
impl RecordSink for MemorySink {
    async fn batch_put(&self, table: &str, items: Vec<SinkItem>) -> StorageResult<()> {
        let index = {
            let mut sizes = self.batch_sizes.lock().await;
            sizes.push(items.len());
            sizes.len() - 1
        };

        if items.len() > self.max_batch_size {
            return Err(StorageError::BatchTooLarge {
                size: items.len(),
                max: self.max_batch_size,
            });
        }

        if self.fail_on_batch == Some(index) {
            return Err(StorageError::unavailable(format!(
                "injected failure on batch {index}"
            )));
        }

        let mut tables = self.tables.write().await;
        let stored = tables.entry(table.to_string()).or_default();
        for item in items {
            stored.insert(item.key.clone(), item);
        }

        Ok(())
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}
