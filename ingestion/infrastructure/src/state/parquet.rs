use crate::repositories::codec::{max_timestamp, read_bars};
use crate::repositories::layout::DatasetLayout;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use histbars_application::ports::{StateStore, StorageError};
use histbars_domain::{merge_bars, Bar};
use shaku::Component;
use std::fs;
use std::io;
use tracing::debug;

/// Reads the Parquet dataset. Never writes.
#[derive(Component)]
#[shaku(interface = StateStore)]
pub struct ParquetStateStore {
    layout: DatasetLayout,
}

/// What is stored for one symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct DatasetSummary {
    pub name: String,
    pub rows: usize,
    pub first: Option<DateTime<Utc>>,
    pub last: Option<DateTime<Utc>>,
    pub partitions: usize,
    pub bytes: u64,
}

impl ParquetStateStore {
    pub fn new(layout: DatasetLayout) -> Self {
        Self { layout }
    }

    fn latest(&self, symbol: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        let partitions = self.layout.partition_files(symbol)?;

        for (key, path) in partitions.iter().rev() {
            match max_timestamp(path)? {
                Some(ts) => return Ok(Some(ts)),
                None => debug!("{} partition {} is empty", symbol, key),
            }
        }
        Ok(None)
    }

    /// Every stored row as found on disk, partitions in key order.
    /// Nothing is sorted or de-duplicated.
    pub fn read_stored(&self, symbol: &str) -> Result<Vec<Bar>, StorageError> {
        let mut bars = Vec::new();
        for (_, path) in self.layout.partition_files(symbol)? {
            bars.extend(read_bars(&path)?);
        }
        Ok(bars)
    }

    fn read_all(&self, symbol: &str) -> Result<Vec<Bar>, StorageError> {
        Ok(merge_bars(Vec::new(), self.read_stored(symbol)?))
    }

    pub fn summary(&self, symbol: &str) -> Result<DatasetSummary, StorageError> {
        let partitions = self.layout.partition_files(symbol)?;
        let bytes = partitions
            .iter()
            .map(|(_, path)| fs::metadata(path).map(|m| m.len()))
            .sum::<io::Result<u64>>()?;

        let bars = self.read_all(symbol)?;

        Ok(DatasetSummary {
            name: self.layout.dataset_name(symbol),
            rows: bars.len(),
            first: bars.first().map(Bar::timestamp),
            last: bars.last().map(Bar::timestamp),
            partitions: partitions.len(),
            bytes,
        })
    }
}

#[async_trait]
impl StateStore for ParquetStateStore {
    async fn high_water_mark(&self, symbol: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        let latest = self.latest(symbol)?;
        match latest {
            Some(ts) => debug!("{} stored through {}", symbol, ts),
            None => debug!("{} has no stored bars", symbol),
        }
        Ok(latest)
    }

    async fn load(&self, symbol: &str) -> Result<Vec<Bar>, StorageError> {
        self.read_all(symbol)
    }
}
