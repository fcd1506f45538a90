//! DynamoDB sink implementation

use async_trait::async_trait;
use aws_sdk_dynamodb::types::{AttributeValue as DynamoValue, PutRequest, WriteRequest};
use aws_sdk_dynamodb::Client;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::storage::{
    config::{RetryPolicy, StorageConfig},
    error::{StorageError, StorageResult},
    traits::{RecordSink, DEFAULT_SINK_BATCH_LIMIT},
    types::{AttributeValue, SinkItem, PARTITION_KEY_ATTR, SORT_KEY_ATTR},
};

/// BatchWriteItem sink that resubmits unprocessed items with backoff
pub struct DynamoDbSink {
    client: Arc<Client>,
    retry_policy: RetryPolicy,
}

impl DynamoDbSink {
    /// Create new DynamoDB sink from the ambient AWS configuration
    pub async fn new(config: &StorageConfig) -> StorageResult<Self> {
        info!("Initializing DynamoDB sink");

        let aws_config = if let Some(ref endpoint) = config.endpoint {
            aws_config::from_env()
                .endpoint_url(endpoint)
                .load()
                .await
        } else {
            aws_config::load_from_env().await
        };

        Ok(Self::from_client(
            Client::new(&aws_config),
            config.retry_policy.clone(),
        ))
    }

    /// Wrap an existing client
    pub fn from_client(client: Client, retry_policy: RetryPolicy) -> Self {
        Self {
            client: Arc::new(client),
            retry_policy,
        }
    }
}

fn to_dynamo_value(value: &AttributeValue) -> DynamoValue {
    match value {
        AttributeValue::S(s) => DynamoValue::S(s.clone()),
        AttributeValue::N(n) => DynamoValue::N(n.to_string()),
    }
}

fn to_write_request(item: &SinkItem) -> StorageResult<WriteRequest> {
    let mut put = PutRequest::builder()
        .item(
            PARTITION_KEY_ATTR,
            DynamoValue::S(item.key.partition_key.clone()),
        )
        .item(SORT_KEY_ATTR, DynamoValue::S(item.key.sort_key.clone()));

    for (name, value) in &item.attributes {
        put = put.item(name, to_dynamo_value(value));
    }

    let put = put.build().map_err(StorageError::serialization)?;
    Ok(WriteRequest::builder().put_request(put).build())
}

#[async_trait]
impl RecordSink for DynamoDbSink {
    async fn batch_put(&self, table: &str, items: Vec<SinkItem>) -> StorageResult<()> {
        if items.len() > DEFAULT_SINK_BATCH_LIMIT {
            return Err(StorageError::BatchTooLarge {
                size: items.len(),
                max: DEFAULT_SINK_BATCH_LIMIT,
            });
        }

        let mut pending = items
            .iter()
            .map(to_write_request)
            .collect::<StorageResult<Vec<_>>>()?;
        let mut attempt = 0u32;

        loop {
            debug!("BatchWriteItem {} requests to {}", pending.len(), table);

            let result = self
                .client
                .batch_write_item()
                .request_items(table, pending.clone())
                .send()
                .await;

            let unprocessed = match result {
                Ok(output) => output
                    .unprocessed_items()
                    .and_then(|tables| tables.get(table))
                    .cloned()
                    .unwrap_or_default(),
                Err(err) => {
                    let throttled = err
                        .as_service_error()
                        .map(|e| e.is_provisioned_throughput_exceeded_exception())
                        .unwrap_or(false);
                    let message = format!("BatchWriteItem to {} failed: {}", table, err);
                    let err = if throttled {
                        StorageError::throttled(message)
                    } else {
                        StorageError::unavailable(message)
                    };
                    if !err.is_retryable() {
                        return Err(err);
                    }
                    debug!("{}", err);
                    pending
                }
            };

            if unprocessed.is_empty() {
                return Ok(());
            }

            attempt += 1;
            if attempt > self.retry_policy.max_retries {
                return Err(StorageError::throttled(format!(
                    "{} items still unprocessed after {} retries",
                    unprocessed.len(),
                    self.retry_policy.max_retries
                )));
            }

            let delay = self.retry_policy.jittered_delay(attempt);
            warn!(
                "{} items unprocessed by {}, retry {} in {:?}",
                unprocessed.len(),
                table,
                attempt,
                delay
            );
            tokio::time::sleep(delay).await;
            pending = unprocessed;
        }
    }

    fn backend_name(&self) -> &'static str {
        "dynamodb"
    }
}
