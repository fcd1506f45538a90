//! Batched persistence of summary records

use tracing::{debug, error, info};

use super::aggregate::SummaryRecord;
use crate::error::RunError;
use crate::storage::{AttributeValue, RecordSink, SinkItem};

pub const HOSPITAL_ATTR: &str = "Hospital";
pub const DIAGNOSIS_ATTR: &str = "Diagnosis";
pub const MOST_USED_TREATMENT_ATTR: &str = "MostUsedTreatment";
pub const AVERAGE_RECOVERY_TIME_ATTR: &str = "AverageRecoveryTime";

/// Sort key of a summary: `#diagnosis#{secondary}#hospital#{primary}`.
///
/// Downstream queries prefix-scan on `#diagnosis#{secondary}`, so the
/// secondary component must come first.
pub fn sort_key(summary: &SummaryRecord) -> String {
    format!(
        "#diagnosis#{}#hospital#{}",
        summary.group_secondary, summary.group_primary
    )
}

/// Build the sink item for one summary of run `run_id`
pub fn to_item(summary: &SummaryRecord, run_id: &str) -> SinkItem {
    SinkItem::new(run_id, sort_key(summary))
        .with_attribute(HOSPITAL_ATTR, AttributeValue::S(summary.group_primary.clone()))
        .with_attribute(
            DIAGNOSIS_ATTR,
            AttributeValue::S(summary.group_secondary.clone()),
        )
        .with_attribute(
            MOST_USED_TREATMENT_ATTR,
            AttributeValue::S(summary.most_frequent_category.clone()),
        )
        .with_attribute(
            AVERAGE_RECOVERY_TIME_ATTR,
            AttributeValue::N(summary.average_measure),
        )
}

/// Outcome of a successful emission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EmitStats {
    pub items_written: usize,
    pub batches_written: usize,
}

/// Writes summaries to a sink in bounded, sequential batches
pub struct ResultEmitter<'a> {
    sink: &'a dyn RecordSink,
    table: &'a str,
    batch_size: usize,
}

impl<'a> ResultEmitter<'a> {
    /// Batches never exceed `max_batch_size` nor the sink's own limit
    pub fn new(sink: &'a dyn RecordSink, table: &'a str, max_batch_size: usize) -> Self {
        let batch_size = max_batch_size.min(sink.max_batch_size()).max(1);
        Self {
            sink,
            table,
            batch_size,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Submit every summary, in order, one batch at a time.
    ///
    /// The first failing batch aborts the emission; batches written before
    /// it are not rolled back.
    pub async fn emit(&self, summaries: &[SummaryRecord], run_id: &str) -> Result<EmitStats, RunError> {
        let mut stats = EmitStats::default();

        for (batch_index, batch) in summaries.chunks(self.batch_size).enumerate() {
            let items: Vec<SinkItem> = batch.iter().map(|s| to_item(s, run_id)).collect();
            let len = items.len();

            debug!(
                "Writing batch {} ({} items) to {} via {}",
                batch_index,
                len,
                self.table,
                self.sink.backend_name()
            );

            self.sink.batch_put(self.table, items).await.map_err(|e| {
                error!("Batch {} to {} failed: {}", batch_index, self.table, e);
                RunError::from_persistence(e, batch_index)
            })?;

            stats.items_written += len;
            stats.batches_written += 1;
        }

        info!(
            "Wrote {} items in {} batches to {}",
            stats.items_written, stats.batches_written, self.table
        );

        Ok(stats)
    }
}
