//! Storage factory for creating blob stores and sinks

use std::sync::Arc;

use super::backends::{FileBlobStore, FileSink};
#[cfg(feature = "dynamodb")]
use super::backends::DynamoDbSink;
#[cfg(feature = "s3")]
use super::backends::S3BlobStore;
use super::config::{BlobBackend, SinkBackend, StorageConfig};
use super::error::{StorageError, StorageResult};
use super::traits::{BlobStore, RecordSink};

/// Factory for creating storage collaborators
pub struct StorageFactory;

impl StorageFactory {
    /// Create the blob store selected by `config`
    pub async fn blob_store(config: &StorageConfig) -> StorageResult<Arc<dyn BlobStore>> {
        match config.blob_backend {
            BlobBackend::File => Ok(Arc::new(FileBlobStore::new(&config.base_dir))),
            #[cfg(feature = "s3")]
            BlobBackend::S3 => Ok(Arc::new(S3BlobStore::new(config).await?)),
            #[cfg(not(feature = "s3"))]
            BlobBackend::S3 => Err(StorageError::configuration(
                "S3 backend not enabled. Enable with --features s3",
            )),
        }
    }

    /// Create the sink selected by `config`
    pub async fn sink(config: &StorageConfig) -> StorageResult<Arc<dyn RecordSink>> {
        match config.sink_backend {
            SinkBackend::File => Ok(Arc::new(FileSink::new(&config.base_dir))),
            #[cfg(feature = "dynamodb")]
            SinkBackend::DynamoDb => Ok(Arc::new(DynamoDbSink::new(config).await?)),
            #[cfg(not(feature = "dynamodb"))]
            SinkBackend::DynamoDb => Err(StorageError::configuration(
                "DynamoDB backend not enabled. Enable with --features dynamodb",
            )),
        }
    }
}
