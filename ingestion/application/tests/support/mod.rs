#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use histbars_application::{
    AuthError, BarChartClient, Clock, CommitReport, HttpResponse, PageRequest, PartitionWriter,
    RateLimiter, RateLimiterError, StateStore, StorageError, TokenProvider, TransportError,
};
use histbars_domain::{group_by_partition, merge_bars, Bar, PartitionKey, StorageFormat};
use serde_json::json;
use tokio::sync::watch;

pub fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
}

pub fn bar_at(timestamp: DateTime<Utc>, close: f64) -> Bar {
    Bar::new(timestamp, close, close + 0.5, close - 0.5, close, 10).unwrap()
}

/// One bar per minute in `[start, end)`.
pub fn minute_bars(start: DateTime<Utc>, end: DateTime<Utc>, close: f64) -> Vec<Bar> {
    let mut bars = Vec::new();
    let mut ts = start;
    while ts < end {
        bars.push(bar_at(ts, close));
        ts += Duration::minutes(1);
    }
    bars
}

pub fn page_body(bars: &[Bar]) -> String {
    let bars: Vec<_> = bars
        .iter()
        .map(|bar| {
            json!({
                "TimeStamp": bar.timestamp().to_rfc3339_opts(SecondsFormat::Secs, true),
                "Open": bar.open().to_string(),
                "High": bar.high().to_string(),
                "Low": bar.low().to_string(),
                "Close": bar.close().to_string(),
                "TotalVolume": bar.volume().to_string(),
            })
        })
        .collect();
    json!({ "Bars": bars }).to_string()
}

pub enum Scripted {
    Respond(HttpResponse),
    Fail(TransportError),
}

#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub request: PageRequest,
    pub token: String,
}

/// Serves bars from an in-memory series. Scripted replies are consumed first.
/// Like the real endpoint, `lastdate` is inclusive.
#[derive(Default)]
pub struct FakeBarChartClient {
    remote: HashMap<String, Vec<Bar>>,
    statuses: HashMap<String, u16>,
    page_cap: Option<usize>,
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<RecordedRequest>>,
    cancel_on_request: Mutex<Option<watch::Sender<bool>>>,
}

impl FakeBarChartClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.remote.insert(symbol.to_string(), bars);
        self
    }

    /// Every request for `symbol` answers with `status`.
    pub fn with_status(mut self, symbol: &str, status: u16) -> Self {
        self.statuses.insert(symbol.to_string(), status);
        self
    }

    /// Serves at most `cap` bars per request, oldest first.
    pub fn with_page_cap(mut self, cap: usize) -> Self {
        self.page_cap = Some(cap);
        self
    }

    pub fn then(self, reply: Scripted) -> Self {
        self.script.lock().unwrap().push_back(reply);
        self
    }

    /// Raises the shutdown flag while serving the next request.
    pub fn cancel_on_request(&self, sender: watch::Sender<bool>) {
        *self.cancel_on_request.lock().unwrap() = Some(sender);
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requested_symbols(&self) -> HashSet<String> {
        self.requests()
            .into_iter()
            .map(|r| r.request.symbol)
            .collect()
    }
}

#[async_trait]
impl BarChartClient for FakeBarChartClient {
    async fn get_bars(
        &self,
        request: &PageRequest,
        bearer_token: &str,
    ) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            request: request.clone(),
            token: bearer_token.to_string(),
        });

        if let Some(sender) = self.cancel_on_request.lock().unwrap().take() {
            sender.send_replace(true);
        }

        if let Some(reply) = self.script.lock().unwrap().pop_front() {
            return match reply {
                Scripted::Respond(response) => Ok(response),
                Scripted::Fail(error) => Err(error),
            };
        }

        if let Some(status) = self.statuses.get(&request.symbol) {
            return Ok(HttpResponse::status(*status));
        }

        let bars: Vec<Bar> = self
            .remote
            .get(&request.symbol)
            .map(|series| {
                series
                    .iter()
                    .filter(|b| b.timestamp() >= request.first && b.timestamp() <= request.last)
                    .take(self.page_cap.unwrap_or(usize::MAX))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        Ok(HttpResponse::ok(page_body(&bars)))
    }
}

/// Hands out `token-N`, where N counts refreshes.
#[derive(Default)]
pub struct CountingTokenProvider {
    refreshes: AtomicUsize,
}

impl CountingTokenProvider {
    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TokenProvider for CountingTokenProvider {
    async fn get_token(&self) -> Result<String, AuthError> {
        Ok(format!("token-{}", self.refreshes()))
    }

    async fn refresh(&self) -> Result<String, AuthError> {
        let n = self.refreshes.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(format!("token-{}", n))
    }
}

#[derive(Default)]
pub struct CountingRateLimiter {
    acquired: AtomicUsize,
}

impl CountingRateLimiter {
    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RateLimiter for CountingRateLimiter {
    async fn acquire(&self) -> Result<(), RateLimiterError> {
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

pub struct FixedClock {
    now: Mutex<DateTime<Utc>>,
}

impl FixedClock {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock().unwrap() = now;
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

/// Dataset kept in memory, partitioned by day for bookkeeping.
#[derive(Default)]
pub struct InMemoryDataset {
    bars: Mutex<HashMap<String, Vec<Bar>>>,
    touched: Mutex<Vec<PartitionKey>>,
    commits: AtomicUsize,
    fail_on_commit: Mutex<Option<usize>>,
}

impl InMemoryDataset {
    pub fn seeded(symbol: &str, bars: Vec<Bar>) -> Self {
        let dataset = Self::default();
        dataset
            .bars
            .lock()
            .unwrap()
            .insert(symbol.to_string(), merge_bars(Vec::new(), bars));
        dataset
    }

    /// Makes the `n`th commit (1 based) fail with an IO error.
    pub fn fail_on_commit(&self, n: usize) {
        *self.fail_on_commit.lock().unwrap() = Some(n);
    }

    pub fn heal(&self) {
        *self.fail_on_commit.lock().unwrap() = None;
    }

    pub fn bars(&self, symbol: &str) -> Vec<Bar> {
        self.bars
            .lock()
            .unwrap()
            .get(symbol)
            .cloned()
            .unwrap_or_default()
    }

    pub fn touched_partitions(&self) -> Vec<PartitionKey> {
        self.touched.lock().unwrap().clone()
    }

    pub fn commits(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl StateStore for InMemoryDataset {
    async fn high_water_mark(&self, symbol: &str) -> Result<Option<DateTime<Utc>>, StorageError> {
        Ok(self.bars(symbol).last().map(|bar| bar.timestamp()))
    }

    async fn load(&self, symbol: &str) -> Result<Vec<Bar>, StorageError> {
        Ok(self.bars(symbol))
    }
}

#[async_trait]
impl PartitionWriter for InMemoryDataset {
    async fn merge_and_write(
        &self,
        symbol: &str,
        batch: Vec<Bar>,
    ) -> Result<CommitReport, StorageError> {
        let n = self.commits.fetch_add(1, Ordering::SeqCst) + 1;
        if *self.fail_on_commit.lock().unwrap() == Some(n) {
            return Err(StorageError::IoError(std::io::Error::new(
                std::io::ErrorKind::Other,
                "disk full",
            )));
        }

        let bars_received = batch.len();
        let groups = group_by_partition(StorageFormat::Daily, batch.clone());
        self.touched.lock().unwrap().extend(groups.keys().cloned());

        let mut all = self.bars.lock().unwrap();
        let existing = all.remove(symbol).unwrap_or_default();
        let merged = merge_bars(existing, batch);
        let rows_after = merged.len();
        all.insert(symbol.to_string(), merged);

        Ok(CommitReport {
            partitions_written: groups.len(),
            bars_received,
            rows_after,
        })
    }
}
