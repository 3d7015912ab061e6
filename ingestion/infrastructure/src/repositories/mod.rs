pub mod codec;
pub mod layout;
pub mod parquet;

pub use layout::{clean_symbol, detect_storage_format, DatasetLayout};
pub use parquet::{ParquetPartitionWriter, ParquetPartitionWriterParameters};
