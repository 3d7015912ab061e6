use super::codec::{read_bars, stage_partition, StagedPartition};
use super::layout::DatasetLayout;
use async_trait::async_trait;
use histbars_application::ports::{CommitReport, PartitionWriter, StorageError};
use histbars_domain::{group_by_partition, merge_bars, Bar, Compression};
use shaku::Component;
use std::io;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Merges batches into the Parquet dataset.
///
/// Every touched partition is staged before any of them is renamed into
/// place, so an encoding failure leaves the whole dataset as it was.
#[derive(Component)]
#[shaku(interface = PartitionWriter)]
pub struct ParquetPartitionWriter {
    layout: DatasetLayout,
    compression: Compression,

    #[shaku(default = Mutex::new(()))]
    commit_lock: Mutex<()>,
}

impl ParquetPartitionWriter {
    pub fn new(layout: DatasetLayout, compression: Compression) -> Self {
        Self {
            layout,
            compression,
            commit_lock: Mutex::new(()),
        }
    }
}

fn write_batch(
    layout: &DatasetLayout,
    compression: Compression,
    symbol: &str,
    batch: Vec<Bar>,
) -> Result<CommitReport, StorageError> {
    let bars_received = batch.len();
    let groups = group_by_partition(layout.format, batch);

    let mut staged: Vec<StagedPartition> = Vec::with_capacity(groups.len());
    let mut rows_after = 0;

    for (key, incoming) in groups {
        let path = layout.partition_path(symbol, &key);
        let existing = if path.is_file() {
            read_bars(&path)?
        } else {
            Vec::new()
        };
        let existing_rows = existing.len();

        let merged = merge_bars(existing, incoming);
        debug!(
            "{} partition {}: {} -> {} rows",
            symbol,
            key,
            existing_rows,
            merged.len()
        );
        rows_after += merged.len();

        staged.push(stage_partition(
            &path,
            &merged,
            compression,
            layout.datetime_index,
        )?);
    }

    let partitions_written = staged.len();
    for partition in staged {
        let target = partition.target_path().display().to_string();
        partition.commit().inspect_err(|e| {
            warn!("Failed to commit partition {}: {}", target, e);
        })?;
    }

    Ok(CommitReport {
        partitions_written,
        bars_received,
        rows_after,
    })
}

#[async_trait]
impl PartitionWriter for ParquetPartitionWriter {
    async fn merge_and_write(
        &self,
        symbol: &str,
        batch: Vec<Bar>,
    ) -> Result<CommitReport, StorageError> {
        if batch.is_empty() {
            warn!("Attempted to save empty batch for {}, skipping", symbol);
            return Ok(CommitReport::default());
        }

        let _guard = self.commit_lock.lock().await;

        let layout = self.layout.clone();
        let compression = self.compression;
        let owned_symbol = symbol.to_string();
        let report = tokio::task::spawn_blocking(move || {
            write_batch(&layout, compression, &owned_symbol, batch)
        })
        .await
        .map_err(|e| StorageError::IoError(io::Error::other(e)))??;

        info!(
            "Wrote {} bars for {} ({} partitions, {} rows)",
            report.bars_received, symbol, report.partitions_written, report.rows_after
        );
        Ok(report)
    }
}
