//! File-based blob store and sink

use async_trait::async_trait;
use indexmap::IndexMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, SeekFrom};
use tokio::sync::Mutex;
use tracing::debug;

use crate::storage::{
    error::{StorageError, StorageResult},
    traits::{BlobStore, RecordSink, DEFAULT_SINK_BATCH_LIMIT},
    types::{ContentRange, ItemKey, ObjectId, RangeResponse, SinkItem},
};

/// Reads byte ranges of local files under a base directory
pub struct FileBlobStore {
    base_dir: PathBuf,
}

impl FileBlobStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Path of `object`: `base_dir/bucket/key`, bucket omitted when empty
    pub fn resolve(&self, object: &ObjectId) -> PathBuf {
        let mut path = self.base_dir.clone();
        if !object.bucket.is_empty() {
            path.push(&object.bucket);
        }
        path.push(&object.key);
        path
    }
}

#[async_trait]
impl BlobStore for FileBlobStore {
    async fn get_range(
        &self,
        object: &ObjectId,
        start: u64,
        end: u64,
    ) -> StorageResult<RangeResponse> {
        let path = self.resolve(object);
        let mut file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::not_found(path.display())
            } else {
                StorageError::Io(e)
            }
        })?;

        let total = file.metadata().await?.len();
        if total == 0 && start == 0 {
            return Ok(RangeResponse {
                bytes: Vec::new(),
                content_range: ContentRange::empty(),
            });
        }
        if start >= total || end < start {
            return Err(StorageError::invalid_content_range(format!(
                "range {start}-{end} not satisfiable for {} ({total} bytes)",
                path.display()
            )));
        }

        let end = end.min(total - 1);
        let len = (end - start + 1) as usize;
        let mut bytes = vec![0u8; len];
        file.seek(SeekFrom::Start(start)).await?;
        file.read_exact(&mut bytes).await?;

        debug!("Read {} bytes from {} at offset {}", len, path.display(), start);

        Ok(RangeResponse {
            bytes,
            content_range: ContentRange::new(start, end, total),
        })
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}

/// Stores each table as one JSON document `base_dir/{table}.json`
pub struct FileSink {
    base_dir: PathBuf,
    max_batch_size: usize,
    write_lock: Mutex<()>,
}

impl FileSink {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            max_batch_size: DEFAULT_SINK_BATCH_LIMIT,
            write_lock: Mutex::new(()),
        }
    }

    /// Path of the document holding `table`
    pub fn table_path(&self, table: &str) -> PathBuf {
        self.base_dir.join(format!("{table}.json"))
    }

    /// Read every item of `table`, in first-write order
    pub async fn read_table(&self, table: &str) -> StorageResult<Vec<SinkItem>> {
        read_items(&self.table_path(table)).await
    }
}

/// Read JSON item list, treating a missing file as an empty table
async fn read_items(path: &Path) -> StorageResult<Vec<SinkItem>> {
    match fs::read_to_string(path).await {
        Ok(content) => serde_json::from_str(&content).map_err(StorageError::serialization),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
        Err(e) => Err(StorageError::Io(e)),
    }
}

/// Write JSON item list through a sibling temp file and rename
async fn write_items(path: &Path, items: &[SinkItem]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(items)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl RecordSink for FileSink {
    async fn batch_put(&self, table: &str, items: Vec<SinkItem>) -> StorageResult<()> {
        if items.len() > self.max_batch_size {
            return Err(StorageError::BatchTooLarge {
                size: items.len(),
                max: self.max_batch_size,
            });
        }

        let _guard = self.write_lock.lock().await;
        let path = self.table_path(table);

        let mut stored: IndexMap<ItemKey, SinkItem> = read_items(&path)
            .await?
            .into_iter()
            .map(|item| (item.key.clone(), item))
            .collect();
        for item in items {
            stored.insert(item.key.clone(), item);
        }

        let stored: Vec<SinkItem> = stored.into_values().collect();
        write_items(&path, &stored).await?;

        debug!("Table {} now holds {} items", path.display(), stored.len());
        Ok(())
    }

    fn max_batch_size(&self) -> usize {
        self.max_batch_size
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
