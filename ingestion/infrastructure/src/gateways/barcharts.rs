use async_trait::async_trait;
use chrono::{DateTime, Utc};
use histbars_application::{BarChartClient, HttpResponse, PageRequest, TransportError};
use reqwest::header::RETRY_AFTER;
use reqwest::Url;
use shaku::Component;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://api.tradestation.com/v3";

const QUERY_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

#[derive(Debug, Clone)]
pub struct BarChartEndpoint {
    pub base_url: String,
}

impl Default for BarChartEndpoint {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }
}

/// `GET {base_url}/marketdata/barcharts/{symbol}` over reqwest.
///
/// Status codes are passed through untouched; only transport failures are
/// errors here.
#[derive(Component)]
#[shaku(interface = BarChartClient)]
pub struct ReqwestBarChartClient {
    endpoint: BarChartEndpoint,
    http: reqwest::Client,
}

impl ReqwestBarChartClient {
    pub fn new(endpoint: BarChartEndpoint, http: reqwest::Client) -> Self {
        Self { endpoint, http }
    }

    /// The symbol is one percent-encoded path segment.
    fn url(&self, symbol: &str) -> Result<Url, TransportError> {
        let base = &self.endpoint.base_url;
        let mut url =
            Url::parse(base).map_err(|e| TransportError::InvalidUrl(format!("{}: {}", base, e)))?;
        url.path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(format!("{}: not a base URL", base)))?
            .pop_if_empty()
            .extend(["marketdata", "barcharts", symbol]);
        Ok(url)
    }
}

#[async_trait]
impl BarChartClient for ReqwestBarChartClient {
    async fn get_bars(
        &self,
        request: &PageRequest,
        bearer_token: &str,
    ) -> Result<HttpResponse, TransportError> {
        let query = [
            ("interval", request.interval.value().to_string()),
            ("unit", request.interval.unit().as_str().to_string()),
            ("firstdate", format_query_time(request.first)),
            ("lastdate", format_query_time(request.last)),
        ];
        let url = self.url(&request.symbol)?;
        debug!("GET {} {:?}", url, query);

        let response = self
            .http
            .get(url)
            .bearer_auth(bearer_token)
            .query(&query)
            .send()
            .await
            .map_err(map_send_error)?;

        let status = response.status().as_u16();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .and_then(parse_retry_after);

        let body = response
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(HttpResponse {
            status,
            retry_after,
            body,
        })
    }
}

fn format_query_time(timestamp: DateTime<Utc>) -> String {
    timestamp.format(QUERY_TIME_FORMAT).to_string()
}

fn map_send_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::ConnectionFailed(error.to_string())
    }
}

/// Only the delay-seconds form is understood; HTTP dates are ignored.
fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}
