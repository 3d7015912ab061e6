pub mod auth;
pub mod clock;
pub mod gateways;
pub mod rate_limiting;
pub mod repositories;
pub mod state;

pub use auth::{OAuthCredentials, RefreshTokenProvider, RefreshTokenProviderParameters};
pub use clock::SystemClock;
pub use gateways::{BarChartEndpoint, ReqwestBarChartClient, ReqwestBarChartClientParameters};
pub use rate_limiting::{IntervalRateLimiter, IntervalRateLimiterParameters};
pub use repositories::{
    detect_storage_format, DatasetLayout, ParquetPartitionWriter, ParquetPartitionWriterParameters,
};
pub use state::{DatasetSummary, ParquetStateStore, ParquetStateStoreParameters};
