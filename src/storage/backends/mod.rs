//! Blob store and sink implementations

pub mod file;
pub mod memory;

#[cfg(feature = "dynamodb")]
pub mod dynamodb;
#[cfg(feature = "s3")]
pub mod s3;

pub use file::{FileBlobStore, FileSink};
pub use memory::{MemoryBlobStore, MemorySink};

#[cfg(feature = "dynamodb")]
pub use dynamodb::DynamoDbSink;
#[cfg(feature = "s3")]
pub use s3::S3BlobStore;
