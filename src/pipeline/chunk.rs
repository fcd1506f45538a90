//! Sequential range reads of one source object

use tracing::{debug, trace};

use crate::error::{ErrorCode, RunError};
use crate::storage::{BlobStore, ContentRange, ObjectId, StorageError};

/// Position of the most recently fetched range.
///
/// Advances monotonically; never rewound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkCursor {
    pub start: u64,
    pub end: u64,
    pub total_length: u64,
}

impl ChunkCursor {
    /// True when the last fetched range ended at the last byte of the object
    pub fn is_complete(&self) -> bool {
        self.total_length == 0 || self.end + 1 == self.total_length
    }

    /// First byte of the next range
    pub fn next_start(&self) -> u64 {
        if self.total_length == 0 {
            0
        } else {
            self.end + 1
        }
    }
}

impl From<ContentRange> for ChunkCursor {
    fn from(range: ContentRange) -> Self {
        Self {
            start: range.start,
            end: range.end,
            total_length: range.total,
        }
    }
}

/// One fetched range
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub bytes: Vec<u8>,
    /// True when this chunk ends at the last byte of the object
    pub is_last: bool,
}

/// Fetches successive `chunk_size` ranges of an object from a blob store
pub struct ChunkReader<'a> {
    store: &'a dyn BlobStore,
    object: &'a ObjectId,
    chunk_size: u64,
    cursor: Option<ChunkCursor>,
    chunks_fetched: u64,
    bytes_read: u64,
}

impl<'a> ChunkReader<'a> {
    pub fn new(store: &'a dyn BlobStore, object: &'a ObjectId, chunk_size: u64) -> Self {
        Self {
            store,
            object,
            chunk_size: chunk_size.max(1),
            cursor: None,
            chunks_fetched: 0,
            bytes_read: 0,
        }
    }

    /// Cursor of the most recent range, `None` before the first fetch
    pub fn cursor(&self) -> Option<ChunkCursor> {
        self.cursor
    }

    pub fn is_complete(&self) -> bool {
        self.cursor.is_some_and(|c| c.is_complete())
    }

    pub fn chunks_fetched(&self) -> u64 {
        self.chunks_fetched
    }

    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Fetch the range following the previous one.
    ///
    /// The first call starts at byte 0. Fails with a transfer error when the
    /// store fails, when its answer does not continue where the cursor left
    /// off, or when called after the last range was already consumed.
    pub async fn fetch_next(&mut self) -> Result<Chunk, RunError> {
        if self.is_complete() {
            return Err(RunError::transfer_with_code(
                ErrorCode::TRANSFER_INVALID_RANGE,
                "read past the end of the object",
                Some(self.object.to_string()),
            ));
        }

        let start = self.cursor.map(|c| c.next_start()).unwrap_or(0);
        let end = start + self.chunk_size - 1;

        trace!("Requesting {} bytes={}-{}", self.object, start, end);

        let response = self
            .store
            .get_range(self.object, start, end)
            .await
            .map_err(|e| RunError::from_transfer(e, self.object))?;

        let range = response.content_range;
        self.check_response(start, &range, response.bytes.len() as u64)?;

        let cursor = ChunkCursor::from(range);
        self.cursor = Some(cursor);
        self.chunks_fetched += 1;
        self.bytes_read += response.bytes.len() as u64;

        debug!(
            "Fetched chunk {} of {}: {} ({} bytes)",
            self.chunks_fetched,
            self.object,
            range,
            response.bytes.len()
        );

        Ok(Chunk {
            bytes: response.bytes,
            is_last: cursor.is_complete(),
        })
    }

    fn check_response(
        &self,
        requested_start: u64,
        range: &ContentRange,
        received: u64,
    ) -> Result<(), RunError> {
        let problem = if range.is_empty_object() {
            if requested_start != 0 {
                Some(StorageError::invalid_content_range(format!(
                    "object reported empty after {} bytes",
                    requested_start
                )))
            } else {
                None
            }
        } else if range.start != requested_start {
            Some(StorageError::invalid_content_range(format!(
                "requested start {} but received {}",
                requested_start, range
            )))
        } else if range.end < range.start || range.end >= range.total {
            Some(StorageError::invalid_content_range(format!(
                "range {}-{} does not fit length {}",
                range.start, range.end, range.total
            )))
        } else if let Some(previous) = self.cursor {
            (previous.total_length != range.total).then(|| {
                StorageError::invalid_content_range(format!(
                    "object length changed from {} to {} during the run",
                    previous.total_length, range.total
                ))
            })
        } else {
            None
        };

        if let Some(err) = problem {
            return Err(RunError::from_transfer(err, self.object));
        }

        if received != range.len() {
            return Err(RunError::from_transfer(
                StorageError::ShortRead {
                    expected: range.len(),
                    received,
                },
                self.object,
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::backends::MemoryBlobStore;
    use crate::storage::RangeResponse;
    use async_trait::async_trait;

    fn object() -> ObjectId {
        ObjectId::new("bucket", "data.csv")
    }

    #[test]
    fn test_cursor_completion() {
        let cursor = ChunkCursor {
            start: 0,
            end: 9,
            total_length: 10,
        };
        assert!(cursor.is_complete());
        assert_eq!(cursor.next_start(), 10);

        let partial = ChunkCursor {
            start: 0,
            end: 4,
            total_length: 10,
        };
        assert!(!partial.is_complete());
    }

    #[tokio::test]
    async fn test_reads_successive_ranges() {
        let store = MemoryBlobStore::new().with_object(object(), b"0123456789".to_vec());
        let object = object();
        let mut reader = ChunkReader::new(&store, &object, 4);

        let first = reader.fetch_next().await.unwrap();
        assert_eq!(first.bytes, b"0123");
        assert!(!first.is_last);

        let second = reader.fetch_next().await.unwrap();
        assert_eq!(second.bytes, b"4567");
        assert!(!second.is_last);

        let third = reader.fetch_next().await.unwrap();
        assert_eq!(third.bytes, b"89");
        assert!(third.is_last);
        assert!(reader.is_complete());

        assert_eq!(store.requests().await, vec![(0, 3), (4, 7), (8, 11)]);
        assert_eq!(reader.chunks_fetched(), 3);
        assert_eq!(reader.bytes_read(), 10);
        assert_eq!(
            reader.cursor(),
            Some(ChunkCursor {
                start: 8,
                end: 9,
                total_length: 10
            })
        );
    }

    #[tokio::test]
    async fn test_exact_multiple_of_chunk_size() {
        let store = MemoryBlobStore::new().with_object(object(), b"01234567".to_vec());
        let object = object();
        let mut reader = ChunkReader::new(&store, &object, 4);

        assert!(!reader.fetch_next().await.unwrap().is_last);
        assert!(reader.fetch_next().await.unwrap().is_last);
        assert_eq!(store.requests().await.len(), 2);
    }

    #[tokio::test]
    async fn test_empty_object_completes_immediately() {
        let store = MemoryBlobStore::new().with_object(object(), Vec::new());
        let object = object();
        let mut reader = ChunkReader::new(&store, &object, 4);

        let chunk = reader.fetch_next().await.unwrap();
        assert!(chunk.bytes.is_empty());
        assert!(chunk.is_last);
    }

    #[tokio::test]
    async fn test_read_past_end_fails() {
        let store = MemoryBlobStore::new().with_object(object(), b"ab".to_vec());
        let object = object();
        let mut reader = ChunkReader::new(&store, &object, 4);

        reader.fetch_next().await.unwrap();
        let err = reader.fetch_next().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::TRANSFER_INVALID_RANGE);
    }

    #[tokio::test]
    async fn test_missing_object_is_transfer_error() {
        let store = MemoryBlobStore::new();
        let object = object();
        let mut reader = ChunkReader::new(&store, &object, 4);

        let err = reader.fetch_next().await.unwrap_err();
        assert!(matches!(err, RunError::Transfer { .. }));
        assert_eq!(err.code(), ErrorCode::TRANSFER_OBJECT_NOT_FOUND);
    }

    /// Store whose body is shorter than the range it claims
    struct TruncatingStore;

    #[async_trait]
    impl BlobStore for TruncatingStore {
        async fn get_range(
            &self,
            _object: &ObjectId,
            start: u64,
            end: u64,
        ) -> crate::storage::StorageResult<RangeResponse> {
            Ok(RangeResponse {
                bytes: vec![b'x'; 2],
                content_range: ContentRange::new(start, end, 100),
            })
        }

        fn backend_name(&self) -> &'static str {
            "truncating"
        }
    }

    #[tokio::test]
    async fn test_short_read_is_detected() {
        let object = object();
        let mut reader = ChunkReader::new(&TruncatingStore, &object, 10);

        let err = reader.fetch_next().await.unwrap_err();
        assert_eq!(err.code(), ErrorCode::TRANSFER_SHORT_READ);
    }

    /// Store that answers every range with an end chosen from its start
    struct BadEndStore {
        end_for: fn(u64) -> u64,
    }

    #[async_trait]
    impl BlobStore for BadEndStore {
        async fn get_range(
            &self,
            _object: &ObjectId,
            start: u64,
            _end: u64,
        ) -> crate::storage::StorageResult<RangeResponse> {
            Ok(RangeResponse {
                bytes: Vec::new(),
                content_range: ContentRange::new(start, (self.end_for)(start), 100),
            })
        }

        fn backend_name(&self) -> &'static str {
            "bad-end"
        }
    }

    #[tokio::test]
    async fn test_inverted_or_oversized_range_is_invalid() {
        let object = object();
        let ends: [fn(u64) -> u64; 3] = [|start| start - 2, |_| 100, |_| 500];

        for end_for in ends {
            let store = BadEndStore { end_for };
            let mut reader = ChunkReader::new(&store, &object, 4);
            reader.cursor = Some(ChunkCursor {
                start: 0,
                end: 3,
                total_length: 100,
            });

            let err = reader.fetch_next().await.unwrap_err();
            assert_eq!(err.code(), ErrorCode::TRANSFER_INVALID_RANGE);
        }
    }
}
