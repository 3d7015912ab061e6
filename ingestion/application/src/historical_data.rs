use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use histbars_domain::{Bar, BarInterval, DownloadWindow};
use shaku::Interface;

use crate::auth::AuthError;
use crate::download_stats::FailureKind;
use crate::payload::PayloadError;
use crate::rate_limiter::RateLimiterError;

/// One bar chart request: bars of `symbol` between `first` and `last`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub symbol: String,
    pub interval: BarInterval,
    pub first: DateTime<Utc>,
    pub last: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed `Retry-After` header, if the server sent one.
    pub retry_after: Option<Duration>,
    pub body: String,
}

impl HttpResponse {
    pub fn ok(body: impl Into<String>) -> Self {
        Self {
            status: 200,
            retry_after: None,
            body: body.into(),
        }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            retry_after: None,
            body: String::new(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// HTTP transport to the bar chart endpoint. Issues exactly one GET per call.
#[async_trait]
pub trait BarChartClient: Interface {
    async fn get_bars(
        &self,
        request: &PageRequest,
        bearer_token: &str,
    ) -> Result<HttpResponse, TransportError>;
}

/// Pages of chronologically ordered bars. Pages never overlap.
pub type BarPageStream =
    Box<dyn futures::Stream<Item = Result<Vec<Bar>, FetchError>> + Send + Unpin>;

pub trait BarFetcher: Interface {
    fn fetch(&self, symbol: &str, window: DownloadWindow) -> BarPageStream;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request timed out")]
    Timeout,

    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Invalid request URL: {0}")]
    InvalidUrl(String),
}

#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("Authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("Rate limiter error: {0}")]
    RateLimiter(#[from] RateLimiterError),

    #[error("Giving up on {symbol} after {attempts} attempts: {last_error}")]
    RetriesExhausted {
        symbol: String,
        attempts: u32,
        last_error: String,
    },

    #[error("Request for {symbol} rejected with HTTP {status}: {body}")]
    Rejected {
        symbol: String,
        status: u16,
        body: String,
    },

    #[error("Invalid fetch settings: {0}")]
    InvalidSettings(String),

    #[error("Malformed payload for {symbol}: {source}")]
    Schema {
        symbol: String,
        source: PayloadError,
    },
}

impl FetchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            FetchError::Auth(_) => FailureKind::Auth,
            FetchError::RateLimiter(_) | FetchError::InvalidSettings(_) => FailureKind::Internal,
            FetchError::RetriesExhausted { .. } => FailureKind::Transient,
            FetchError::Rejected { .. } => FailureKind::Rejected,
            FetchError::Schema { .. } => FailureKind::Schema,
        }
    }
}
