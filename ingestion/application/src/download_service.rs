use async_trait::async_trait;
use chrono::NaiveDate;
use futures::StreamExt;
use histbars_domain::{Bar, BarInterval, DownloadWindow};
use shaku::{Component, Interface};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::download_stats::{DownloadStats, FailureKind, SymbolFailure, SymbolPhase};
use crate::historical_data::{BarFetcher, FetchError};
use crate::ports::{Clock, PartitionWriter, StateStore, StorageError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DownloadMode {
    /// Fetch only what lies after the stored high-water mark.
    #[default]
    Incremental,
    /// Fetch from the configured start date and merge over stored bars.
    FullRefresh,
}

#[derive(Debug, Clone)]
pub struct DownloadRequest {
    pub symbols: Vec<String>,
    pub mode: DownloadMode,
}

#[derive(Debug, Clone)]
pub struct DownloadOutcome {
    pub stats: DownloadStats,
    /// Bars committed during this run, by symbol. Empty unless retention is on.
    pub bars: BTreeMap<String, Vec<Bar>>,
}

#[derive(Debug, Clone)]
pub struct DownloadSettings {
    pub start_date: NaiveDate,
    pub interval: BarInterval,
    /// Buffered bars that trigger a commit.
    pub flush_threshold: usize,
    pub retain_bars: bool,
}

impl Default for DownloadSettings {
    fn default() -> Self {
        Self {
            start_date: NaiveDate::from_ymd_opt(2007, 1, 1).expect("valid default start date"),
            interval: BarInterval::default(),
            flush_threshold: 100_000,
            retain_bars: true,
        }
    }
}

#[async_trait]
pub trait DownloadService: Interface {
    /// Downloads every symbol in order. Per-symbol failures are recorded in
    /// the returned stats and never stop the run, except authentication
    /// failures and a shutdown signal, which skip the remaining symbols.
    async fn run(
        &self,
        request: DownloadRequest,
        shutdown: watch::Receiver<bool>,
    ) -> DownloadOutcome;
}

#[derive(Component)]
#[shaku(interface = DownloadService)]
pub struct DownloadServiceImpl {
    #[shaku(inject)]
    fetcher: Arc<dyn BarFetcher>,

    #[shaku(inject)]
    state_store: Arc<dyn StateStore>,

    #[shaku(inject)]
    writer: Arc<dyn PartitionWriter>,

    #[shaku(inject)]
    clock: Arc<dyn Clock>,

    settings: DownloadSettings,
}

impl DownloadServiceImpl {
    pub fn new(
        fetcher: Arc<dyn BarFetcher>,
        state_store: Arc<dyn StateStore>,
        writer: Arc<dyn PartitionWriter>,
        clock: Arc<dyn Clock>,
        settings: DownloadSettings,
    ) -> Self {
        Self {
            fetcher,
            state_store,
            writer,
            clock,
            settings,
        }
    }

    async fn download_symbol(
        &self,
        symbol: &str,
        mode: DownloadMode,
        progress: &mut SymbolProgress,
    ) -> Result<(), SymbolError> {
        let now = self.clock.now();
        let high_water_mark = self.state_store.high_water_mark(symbol).await?;

        let window = match (mode, high_water_mark) {
            (DownloadMode::Incremental, Some(last)) => {
                info!("  Existing data up to {}", last);
                DownloadWindow::after(last, self.settings.interval, now)
            }
            _ => DownloadWindow::from_date(self.settings.start_date, now),
        };

        if window.is_empty() {
            info!("  {} is up to date", symbol);
            progress.advance(SymbolPhase::Done);
            return Ok(());
        }

        info!("  Downloading from {} to {}", window.start(), window.end());
        progress.advance(SymbolPhase::Fetching);

        let mut pages = self.fetcher.fetch(symbol, window);
        let mut buffer: Vec<Bar> = Vec::new();

        while let Some(page) = pages.next().await {
            buffer.extend(page?);
            if buffer.len() >= self.settings.flush_threshold {
                self.commit(symbol, &mut buffer, progress).await?;
                progress.advance(SymbolPhase::Fetching);
            }
        }

        if !buffer.is_empty() {
            self.commit(symbol, &mut buffer, progress).await?;
        }

        if progress.committed == 0 && high_water_mark.is_none() {
            return Err(SymbolError::NoData);
        }

        progress.advance(SymbolPhase::Done);
        Ok(())
    }

    async fn commit(
        &self,
        symbol: &str,
        buffer: &mut Vec<Bar>,
        progress: &mut SymbolProgress,
    ) -> Result<(), SymbolError> {
        progress.advance(SymbolPhase::Writing);

        let batch = std::mem::take(buffer);
        let count = batch.len();
        let retained = self.settings.retain_bars.then(|| batch.clone());

        let report = self.writer.merge_and_write(symbol, batch).await?;

        progress.committed += count;
        if let Some(bars) = retained {
            progress.fetched.extend(bars);
        }
        info!(
            "  Saved {} bars to {} partition(s), {} rows after merge",
            count, report.partitions_written, report.rows_after
        );
        Ok(())
    }
}

#[async_trait]
impl DownloadService for DownloadServiceImpl {
    async fn run(
        &self,
        request: DownloadRequest,
        shutdown: watch::Receiver<bool>,
    ) -> DownloadOutcome {
        let run_id = Uuid::new_v4().to_string();
        let mut stats = DownloadStats::new(run_id.clone(), self.clock.now());
        let mut bars = BTreeMap::new();

        let symbols = unique_symbols(request.symbols);
        let total = symbols.len();
        info!(
            "Run {} starting: {} symbols, mode {:?}",
            run_id, total, request.mode
        );

        for (index, symbol) in symbols.iter().enumerate() {
            if *shutdown.borrow() {
                let remaining = total - index;
                warn!("Shutdown requested, skipping {} remaining symbols", remaining);
                stats.symbols_skipped += remaining;
                break;
            }

            info!("[{}/{}] Processing {}...", index + 1, total, symbol);
            let mut progress = SymbolProgress::default();
            let result = self
                .download_symbol(symbol, request.mode, &mut progress)
                .await;

            stats.bars_downloaded += progress.committed;
            if !progress.fetched.is_empty() {
                bars.insert(symbol.clone(), std::mem::take(&mut progress.fetched));
            }

            match result {
                Ok(()) => stats.symbols_processed += 1,
                Err(e) => {
                    error!("Error processing {}: {}", symbol, e);
                    stats.record_failure(SymbolFailure {
                        symbol: symbol.clone(),
                        phase: progress.phase,
                        kind: e.kind(),
                        message: e.to_string(),
                    });

                    if e.aborts_run() {
                        let remaining = total - index - 1;
                        error!(
                            "Authentication failed, skipping {} remaining symbols",
                            remaining
                        );
                        stats.symbols_skipped += remaining;
                        break;
                    }
                }
            }
        }

        stats.finish(self.clock.now());
        log_summary(&stats);

        DownloadOutcome { stats, bars }
    }
}

#[derive(Debug)]
struct SymbolProgress {
    phase: SymbolPhase,
    committed: usize,
    fetched: Vec<Bar>,
}

impl Default for SymbolProgress {
    fn default() -> Self {
        Self {
            phase: SymbolPhase::Pending,
            committed: 0,
            fetched: Vec::new(),
        }
    }
}

impl SymbolProgress {
    fn advance(&mut self, next: SymbolPhase) {
        debug_assert!(
            self.phase.can_transition_to(next),
            "invalid transition {} -> {}",
            self.phase.as_str(),
            next.as_str()
        );
        debug!("  phase {} -> {}", self.phase.as_str(), next.as_str());
        self.phase = next;
    }
}

#[derive(Debug, thiserror::Error)]
enum SymbolError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("No data retrieved")]
    NoData,
}

impl SymbolError {
    fn kind(&self) -> FailureKind {
        match self {
            SymbolError::Fetch(e) => e.kind(),
            SymbolError::Storage(_) => FailureKind::Storage,
            SymbolError::NoData => FailureKind::NoData,
        }
    }

    fn aborts_run(&self) -> bool {
        matches!(self, SymbolError::Fetch(FetchError::Auth(_)))
    }
}

fn unique_symbols(symbols: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    symbols
        .into_iter()
        .filter(|symbol| seen.insert(symbol.clone()))
        .collect()
}

fn log_summary(stats: &DownloadStats) {
    info!("{}", "=".repeat(60));
    info!("DOWNLOAD COMPLETE ({})", stats.run_id);
    info!(
        "Processed: {} | Skipped: {} | Errors: {}",
        stats.symbols_processed,
        stats.symbols_skipped,
        stats.errors()
    );
    info!(
        "Bars downloaded: {} | Time: {}s",
        stats.bars_downloaded,
        stats.elapsed().num_seconds()
    );
    if stats.errors() > 0 {
        info!("Failed: {}", stats.failed_symbols().join(", "));
    }
    info!("{}", "=".repeat(60));
}
