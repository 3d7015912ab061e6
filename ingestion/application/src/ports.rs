use async_trait::async_trait;
use chrono::{DateTime, Utc};
use histbars_domain::Bar;
use shaku::Interface;

/// Read side of the on-disk dataset.
#[async_trait]
pub trait StateStore: Interface {
    /// Latest stored timestamp for `symbol`, or `None` if nothing is stored.
    async fn high_water_mark(&self, symbol: &str) -> Result<Option<DateTime<Utc>>, StorageError>;

    /// Every stored bar for `symbol`, in timestamp order.
    async fn load(&self, symbol: &str) -> Result<Vec<Bar>, StorageError>;
}

/// Sole writer of the on-disk dataset.
#[async_trait]
pub trait PartitionWriter: Interface {
    /// Merges `batch` into the stored partitions it touches. Incoming bars
    /// replace stored bars with the same timestamp.
    async fn merge_and_write(
        &self,
        symbol: &str,
        batch: Vec<Bar>,
    ) -> Result<CommitReport, StorageError>;
}

pub trait Clock: Interface {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    pub partitions_written: usize,
    pub bars_received: usize,
    pub rows_after: usize,
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(String),

    #[error("Corrupt dataset file {path}: {reason}")]
    CorruptFile { path: String, reason: String },
}
