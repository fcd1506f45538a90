//! S3 blob store implementation

use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::Client;
use std::sync::Arc;
use tracing::{debug, info};

use crate::storage::{
    config::StorageConfig,
    error::{StorageError, StorageResult},
    traits::BlobStore,
    types::{ContentRange, ObjectId, RangeResponse},
};

/// Ranged GetObject reads from Amazon S3
pub struct S3BlobStore {
    client: Arc<Client>,
}

impl S3BlobStore {
    /// Create new S3 blob store from the ambient AWS configuration
    pub async fn new(config: &StorageConfig) -> StorageResult<Self> {
        info!("Initializing S3 blob store");

        let aws_config = if let Some(ref endpoint) = config.endpoint {
            aws_config::from_env()
                .endpoint_url(endpoint)
                .load()
                .await
        } else {
            aws_config::load_from_env().await
        };

        Ok(Self::from_client(Client::new(&aws_config)))
    }

    /// Wrap an existing client
    pub fn from_client(client: Client) -> Self {
        Self {
            client: Arc::new(client),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn get_range(
        &self,
        object: &ObjectId,
        start: u64,
        end: u64,
    ) -> StorageResult<RangeResponse> {
        debug!("Fetching s3://{} bytes={}-{}", object, start, end);

        let output = match self
            .client
            .get_object()
            .bucket(&object.bucket)
            .key(&object.key)
            .range(format!("bytes={}-{}", start, end))
            .send()
            .await
        {
            Ok(output) => output,
            Err(err) => {
                if let Some(service_err) = err.as_service_error() {
                    if service_err.is_no_such_key() {
                        return Err(StorageError::not_found(object));
                    }
                    // S3 answers 416 for any range of a zero-length object.
                    if service_err.code() == Some("InvalidRange") && start == 0 {
                        return Ok(RangeResponse {
                            bytes: Vec::new(),
                            content_range: ContentRange::empty(),
                        });
                    }
                }
                return Err(StorageError::transfer(format!(
                    "GetObject s3://{} bytes={}-{} failed: {}",
                    object, start, end, err
                )));
            }
        };

        let content_range: ContentRange = output
            .content_range()
            .ok_or_else(|| StorageError::invalid_content_range("response has no Content-Range"))?
            .parse()?;

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StorageError::transfer(format!("Failed to read body: {}", e)))?
            .into_bytes()
            .to_vec();

        Ok(RangeResponse {
            bytes,
            content_range,
        })
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}
