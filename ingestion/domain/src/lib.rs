pub mod bar;
pub mod bar_gap;
pub mod download_window;
pub mod interval;
pub mod merge;
pub mod partition;

pub use bar::{Bar, BarValidationError};
pub use bar_gap::{detect_gaps, BarGap};
pub use download_window::DownloadWindow;
pub use interval::{BarInterval, BarUnit};
pub use merge::{group_by_partition, is_strictly_increasing, merge_bars};
pub use partition::{Compression, PartitionKey, StorageFormat};
