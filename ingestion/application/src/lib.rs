pub mod auth;
pub mod bar_fetcher;
pub mod download_service;
pub mod download_stats;
pub mod historical_data;
pub mod payload;
pub mod ports;
pub mod rate_limiter;
pub mod retry;

pub use auth::{AuthError, TokenProvider};
pub use bar_fetcher::{FetchSettings, PagedBarFetcher, MAX_BARS_PER_REQUEST};
pub use download_service::{
    DownloadMode, DownloadOutcome, DownloadRequest, DownloadService, DownloadServiceImpl,
    DownloadSettings,
};
pub use download_stats::{DownloadStats, FailureKind, SymbolFailure, SymbolPhase};
pub use historical_data::{
    BarChartClient, BarFetcher, BarPageStream, FetchError, HttpResponse, PageRequest,
    TransportError,
};
pub use payload::{parse_bar_page, PayloadError};
pub use ports::{Clock, CommitReport, PartitionWriter, StateStore, StorageError};
pub use rate_limiter::{RateLimiter, RateLimiterError};
pub use retry::{Backoff, RetryPolicy};
