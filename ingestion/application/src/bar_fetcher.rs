use std::sync::Arc;

use chrono::Duration;
use futures::stream;
use histbars_domain::{merge_bars, Bar, BarInterval, DownloadWindow};
use shaku::Component;
use tracing::{debug, info, warn};

use crate::auth::{AuthError, TokenProvider};
use crate::historical_data::{
    BarChartClient, BarFetcher, BarPageStream, FetchError, HttpResponse, PageRequest,
    TransportError,
};
use crate::payload::parse_bar_page;
use crate::rate_limiter::RateLimiter;
use crate::retry::{Backoff, RetryPolicy};

const MAX_ERROR_BODY_CHARS: usize = 512;

/// Most bars the bar chart endpoint serves for one request.
pub const MAX_BARS_PER_REQUEST: u32 = 57_600;

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub interval: BarInterval,
    /// Upper bound of bars one page may hold; sets the page span.
    pub max_bars_per_request: u32,
    pub retry: RetryPolicy,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            interval: BarInterval::default(),
            max_bars_per_request: MAX_BARS_PER_REQUEST,
            retry: RetryPolicy::default(),
        }
    }
}

impl FetchSettings {
    /// Longest span one request may cover.
    pub fn page_span(&self) -> Result<Duration, FetchError> {
        if self.max_bars_per_request == 0 || self.max_bars_per_request > MAX_BARS_PER_REQUEST {
            return Err(FetchError::InvalidSettings(format!(
                "max_bars_per_request must be between 1 and {}, got {}",
                MAX_BARS_PER_REQUEST, self.max_bars_per_request
            )));
        }
        self.interval
            .span(self.max_bars_per_request)
            .ok_or_else(|| {
                FetchError::InvalidSettings(format!(
                    "{} bars of {} overflow the page span",
                    self.max_bars_per_request, self.interval
                ))
            })
    }
}

/// Walks a window forward page by page.
///
/// Each request covers at most one page span. The next request starts right
/// after the last bar received, so a page cut short by the server is picked
/// up again instead of skipped.
#[derive(Component)]
#[shaku(interface = BarFetcher)]
pub struct PagedBarFetcher {
    #[shaku(inject)]
    client: Arc<dyn BarChartClient>,

    #[shaku(inject)]
    tokens: Arc<dyn TokenProvider>,

    #[shaku(inject)]
    rate_limiter: Arc<dyn RateLimiter>,

    settings: FetchSettings,
}

impl PagedBarFetcher {
    pub fn new(
        client: Arc<dyn BarChartClient>,
        tokens: Arc<dyn TokenProvider>,
        rate_limiter: Arc<dyn RateLimiter>,
        settings: FetchSettings,
    ) -> Self {
        Self {
            client,
            tokens,
            rate_limiter,
            settings,
        }
    }
}

impl BarFetcher for PagedBarFetcher {
    fn fetch(&self, symbol: &str, window: DownloadWindow) -> BarPageStream {
        if window.is_empty() {
            debug!("Empty window for {}, nothing to request", symbol);
            return Box::new(stream::empty());
        }

        let span = match self.settings.page_span() {
            Ok(span) => span,
            Err(e) => return Box::new(stream::iter(std::iter::once(Err(e)))),
        };
        let walker = PageWalker {
            client: self.client.clone(),
            tokens: self.tokens.clone(),
            rate_limiter: self.rate_limiter.clone(),
            settings: self.settings.clone(),
            symbol: symbol.to_string(),
            span,
            remaining: window,
            pages_fetched: 0,
        };

        let pages = stream::try_unfold(walker, |mut walker| async move {
            let page = walker.next_page().await?;
            Ok(page.map(|bars| (bars, walker)))
        });

        Box::new(Box::pin(pages))
    }
}

struct PageWalker {
    client: Arc<dyn BarChartClient>,
    tokens: Arc<dyn TokenProvider>,
    rate_limiter: Arc<dyn RateLimiter>,
    settings: FetchSettings,
    symbol: String,
    span: Duration,
    remaining: DownloadWindow,
    pages_fetched: usize,
}

impl PageWalker {
    /// Next non-empty page, or `None` once the window is exhausted.
    async fn next_page(&mut self) -> Result<Option<Vec<Bar>>, FetchError> {
        while !self.remaining.is_empty() {
            let page = self.remaining.head(self.span);
            let bars = self.fetch_page(page).await?;
            self.pages_fetched += 1;

            let resume_at = match bars.last() {
                Some(last) => (last.timestamp() + self.settings.interval.duration()).min(page.end()),
                None => page.end(),
            };
            if resume_at < page.end() {
                debug!(
                    "  {} page {} ended at {}, resuming there",
                    self.symbol, self.pages_fetched, resume_at
                );
            }
            self.remaining = self.remaining.resume_from(resume_at);

            match (bars.first(), bars.last()) {
                (Some(first), Some(last)) => {
                    info!(
                        "  {} page {}: {} bars ({} to {})",
                        self.symbol,
                        self.pages_fetched,
                        bars.len(),
                        first.timestamp(),
                        last.timestamp()
                    );
                    return Ok(Some(bars));
                }
                _ => debug!(
                    "  {} page {}: no bars between {} and {}",
                    self.symbol,
                    self.pages_fetched,
                    page.start(),
                    page.end()
                ),
            }
        }
        Ok(None)
    }

    async fn fetch_page(&self, page: DownloadWindow) -> Result<Vec<Bar>, FetchError> {
        let request = PageRequest {
            symbol: self.symbol.clone(),
            interval: self.settings.interval,
            first: page.start(),
            last: page.end(),
        };
        let mut backoff = Backoff::new(self.settings.retry.clone());
        let mut token_refreshed = false;
        let mut fresh_token: Option<String> = None;

        loop {
            self.rate_limiter.acquire().await?;
            let token = match fresh_token.take() {
                Some(token) => token,
                None => self.tokens.get_token().await?,
            };

            let (reason, retry_after) = match self.client.get_bars(&request, &token).await {
                Ok(response) if response.is_success() => return self.decode(&response, page),
                Ok(response) if response.status == 401 => {
                    if token_refreshed {
                        return Err(AuthError::RefreshIneffective.into());
                    }
                    info!("Token expired, refreshing...");
                    token_refreshed = true;
                    fresh_token = Some(self.tokens.refresh().await?);
                    continue;
                }
                Ok(response) if response.status == 429 => {
                    ("rate limited (HTTP 429)".to_string(), response.retry_after)
                }
                Ok(response) if response.status >= 500 => (
                    format!("server error (HTTP {})", response.status),
                    response.retry_after,
                ),
                Ok(response) => {
                    return Err(FetchError::Rejected {
                        symbol: self.symbol.clone(),
                        status: response.status,
                        body: response.body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
                    })
                }
                Err(TransportError::InvalidUrl(reason)) => {
                    return Err(FetchError::InvalidSettings(reason))
                }
                Err(e) => (e.to_string(), None),
            };

            match backoff.next_delay(retry_after) {
                Some(delay) => {
                    warn!(
                        "Request for {} failed: {}. Retrying in {:?} (retry {}/{})",
                        self.symbol,
                        reason,
                        delay,
                        backoff.failures(),
                        self.settings.retry.max_retries
                    );
                    tokio::time::sleep(delay).await;
                }
                None => {
                    return Err(FetchError::RetriesExhausted {
                        symbol: self.symbol.clone(),
                        attempts: backoff.failures(),
                        last_error: reason,
                    })
                }
            }
        }
    }

    /// Keeps bars inside the page, sorted and unique by timestamp.
    fn decode(&self, response: &HttpResponse, page: DownloadWindow) -> Result<Vec<Bar>, FetchError> {
        let bars = parse_bar_page(&response.body).map_err(|source| FetchError::Schema {
            symbol: self.symbol.clone(),
            source,
        })?;

        let in_page: Vec<Bar> = bars
            .into_iter()
            .filter(|bar| page.contains(bar.timestamp()))
            .collect();

        Ok(merge_bars(Vec::new(), in_page))
    }
}
