pub mod parquet;

pub use parquet::{DatasetSummary, ParquetStateStore, ParquetStateStoreParameters};
