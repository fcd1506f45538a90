//! Core types for the storage abstraction layer

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::StorageError;

/// Name of the partition key attribute on sink items
pub const PARTITION_KEY_ATTR: &str = "PK";
/// Name of the sort key attribute on sink items
pub const SORT_KEY_ATTR: &str = "SK";

/// Address of a source object in a blob store
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectId {
    pub bucket: String,
    pub key: String,
}

impl ObjectId {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.bucket.is_empty() {
            write!(f, "{}", self.key)
        } else {
            write!(f, "{}/{}", self.bucket, self.key)
        }
    }
}

/// Inclusive byte range of a response plus the total object length.
///
/// An empty object is `total == 0`; its `start` and `end` are meaningless.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentRange {
    pub start: u64,
    pub end: u64,
    pub total: u64,
}

impl ContentRange {
    pub fn new(start: u64, end: u64, total: u64) -> Self {
        Self { start, end, total }
    }

    /// Range reported for a zero-length object
    pub fn empty() -> Self {
        Self {
            start: 0,
            end: 0,
            total: 0,
        }
    }

    pub fn is_empty_object(&self) -> bool {
        self.total == 0
    }

    /// Number of bytes covered by the range
    pub fn len(&self) -> u64 {
        if self.is_empty_object() {
            0
        } else {
            self.end - self.start + 1
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Display for ContentRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty_object() {
            write!(f, "bytes */0")
        } else {
            write!(f, "bytes {}-{}/{}", self.start, self.end, self.total)
        }
    }
}

impl FromStr for ContentRange {
    type Err = StorageError;

    /// Parses `bytes start-end/total`, `start-end/total` or `bytes */0`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let raw = raw.strip_prefix("bytes").map(str::trim_start).unwrap_or(raw);

        let (range, total) = raw
            .split_once('/')
            .ok_or_else(|| StorageError::invalid_content_range(format!("missing '/' in '{s}'")))?;

        let total: u64 = total
            .trim()
            .parse()
            .map_err(|_| StorageError::invalid_content_range(format!("bad length in '{s}'")))?;

        if range.trim() == "*" {
            return if total == 0 {
                Ok(Self::empty())
            } else {
                Err(StorageError::invalid_content_range(format!(
                    "unsatisfied range for non-empty object: '{s}'"
                )))
            };
        }

        let (start, end) = range
            .split_once('-')
            .ok_or_else(|| StorageError::invalid_content_range(format!("missing '-' in '{s}'")))?;
        let start: u64 = start
            .trim()
            .parse()
            .map_err(|_| StorageError::invalid_content_range(format!("bad start in '{s}'")))?;
        let end: u64 = end
            .trim()
            .parse()
            .map_err(|_| StorageError::invalid_content_range(format!("bad end in '{s}'")))?;

        if end < start || end >= total {
            return Err(StorageError::invalid_content_range(format!(
                "range {start}-{end} does not fit length {total}"
            )));
        }

        Ok(Self { start, end, total })
    }
}

/// Bytes returned for one range request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeResponse {
    pub bytes: Vec<u8>,
    pub content_range: ContentRange,
}

/// Attribute value on a sink item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttributeValue {
    S(String),
    N(f64),
}

/// Composite destination key of a sink item
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemKey {
    pub partition_key: String,
    pub sort_key: String,
}

/// One keyed record submitted to a sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SinkItem {
    pub key: ItemKey,
    /// Non-key attributes, in the order they were added
    pub attributes: IndexMap<String, AttributeValue>,
}

impl SinkItem {
    pub fn new(partition_key: impl Into<String>, sort_key: impl Into<String>) -> Self {
        Self {
            key: ItemKey {
                partition_key: partition_key.into(),
                sort_key: sort_key.into(),
            },
            attributes: IndexMap::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: AttributeValue) -> Self {
        self.attributes.insert(name.into(), value);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes.get(name)
    }
}
