//! The streaming aggregation engine
//!
//! One run reads a CSV object in fixed-size ranges, rebuilds lines across
//! range boundaries, parses each line into a [`Record`], folds it into
//! per-group state and finally writes one summary per group to a sink:
//!
//! ```text
//! ChunkReader -> LineReconstructor -> parse_record -> Aggregator -> ResultEmitter
//! ```
//!
//! Memory use is bounded by the chunk size plus the per-group state; the
//! object itself is never held in full. Malformed rows are skipped and
//! counted. Transfer and persistence failures end the run.

pub mod aggregate;
pub mod chunk;
pub mod emit;
pub mod lines;
pub mod parser;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::config::{AppConfig, EngineConfig};
use crate::error::{MalformedReason, RunError};
use crate::storage::{BlobStore, ObjectId, RecordSink, StorageFactory};

pub use aggregate::{AggregateState, Aggregator, GroupKey, SummaryRecord};
pub use chunk::{Chunk, ChunkCursor, ChunkReader};
pub use emit::{sort_key, to_item, EmitStats, ResultEmitter};
pub use lines::LineReconstructor;
pub use parser::{parse_record, Record};

/// A row that was skipped, as reported in the run result
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SkippedRow {
    /// 1-based physical line number, header included
    pub line_number: u64,
    pub reason: MalformedReason,
}

/// Counters of one pass over the source object
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ScanStats {
    pub rows_processed: u64,
    pub rows_skipped: u64,
    pub chunks_fetched: u64,
    pub bytes_read: u64,
    /// The first few skipped rows
    pub skipped_samples: Vec<SkippedRow>,
}

/// Outcome of a successful run
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: String,
    pub rows_processed: u64,
    pub rows_skipped: u64,
    pub groups_emitted: usize,
    pub batches_written: usize,
    pub chunks_fetched: u64,
    pub bytes_read: u64,
    pub skipped_samples: Vec<SkippedRow>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Runs aggregations against one blob store and one sink
pub struct Engine {
    blob_store: Arc<dyn BlobStore>,
    sink: Arc<dyn RecordSink>,
    config: EngineConfig,
}

impl Engine {
    pub fn new(
        blob_store: Arc<dyn BlobStore>,
        sink: Arc<dyn RecordSink>,
        config: EngineConfig,
    ) -> Result<Self, RunError> {
        config.validate()?;
        Ok(Self {
            blob_store,
            sink,
            config,
        })
    }

    /// Build an engine with the backends selected by `config.storage`
    pub async fn from_config(config: &AppConfig) -> Result<Self, RunError> {
        let blob_store = StorageFactory::blob_store(&config.storage)
            .await
            .map_err(storage_config_error)?;
        let sink = StorageFactory::sink(&config.storage)
            .await
            .map_err(storage_config_error)?;
        Self::new(blob_store, sink, config.engine.clone())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Aggregate `object` and write the summaries to `table` under `run_id`.
    ///
    /// Nothing is written unless the whole object was read. A persistence
    /// failure can leave the batches before it written; rerunning with the
    /// same `run_id` overwrites them.
    #[instrument(skip(self), fields(blob = self.blob_store.backend_name(), sink = self.sink.backend_name()))]
    pub async fn run(
        &self,
        object: &ObjectId,
        table: &str,
        run_id: &str,
    ) -> Result<RunResult, RunError> {
        let started_at = Utc::now();
        info!("Starting run {} over {}", run_id, object);

        let (summaries, stats) = self.summarize(object).await?;

        let emitter = ResultEmitter::new(self.sink.as_ref(), table, self.config.max_batch_size);
        let emitted = emitter.emit(&summaries, run_id).await?;

        let result = RunResult {
            run_id: run_id.to_string(),
            rows_processed: stats.rows_processed,
            rows_skipped: stats.rows_skipped,
            groups_emitted: summaries.len(),
            batches_written: emitted.batches_written,
            chunks_fetched: stats.chunks_fetched,
            bytes_read: stats.bytes_read,
            skipped_samples: stats.skipped_samples,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            "Run {} complete: {} rows, {} skipped, {} groups in {} batches",
            run_id,
            result.rows_processed,
            result.rows_skipped,
            result.groups_emitted,
            result.batches_written
        );

        Ok(result)
    }

    /// Read and aggregate `object` without writing anything
    pub async fn summarize(
        &self,
        object: &ObjectId,
    ) -> Result<(Vec<SummaryRecord>, ScanStats), RunError> {
        let mut reader = ChunkReader::new(self.blob_store.as_ref(), object, self.config.chunk_size);
        let mut lines = LineReconstructor::new(self.config.has_header);
        let mut aggregator = Aggregator::new();
        let mut stats = ScanStats::default();

        loop {
            let chunk = reader.fetch_next().await?;
            let batch = lines.split(&chunk.bytes);
            self.fold_lines(batch, lines.lines_seen(), &mut aggregator, &mut stats);

            if chunk.is_last {
                break;
            }
        }

        let seen = lines.lines_seen();
        if let Some(tail) = lines.finish() {
            self.fold_lines(vec![tail], seen + 1, &mut aggregator, &mut stats);
        }

        stats.chunks_fetched = reader.chunks_fetched();
        stats.bytes_read = reader.bytes_read();

        debug!(
            "Scanned {} in {} chunks ({} bytes), {} groups",
            object,
            stats.chunks_fetched,
            stats.bytes_read,
            aggregator.group_count()
        );

        Ok((aggregator.finalize(), stats))
    }

    /// Parse and fold `batch`, whose last line is physical line `last_line`
    fn fold_lines(
        &self,
        batch: Vec<String>,
        last_line: u64,
        aggregator: &mut Aggregator,
        stats: &mut ScanStats,
    ) {
        let offset = last_line.saturating_sub(batch.len() as u64);

        for (i, line) in batch.iter().enumerate() {
            let line_number = offset + i as u64 + 1;
            match parse_record(line) {
                Ok(Some(record)) => {
                    aggregator.apply(&record);
                    stats.rows_processed += 1;
                }
                Ok(None) => {}
                Err(err) => {
                    let err = err.at_line(line_number);
                    warn!("Skipping row: {}", err);
                    stats.rows_skipped += 1;
                    if stats.skipped_samples.len() < self.config.max_reported_malformed {
                        stats.skipped_samples.push(SkippedRow {
                            line_number,
                            reason: err.reason,
                        });
                    }
                }
            }
        }
    }
}

fn storage_config_error(err: crate::storage::StorageError) -> RunError {
    RunError::config_with_code(
        crate::error::ErrorCode::CONFIG_BACKEND_DISABLED,
        err.to_string(),
    )
    .with_source(err)
}
