use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle of one symbol within a run.
///
/// `Pending -> Fetching -> Writing -> Done`, with `Writing -> Fetching` while
/// a window spans several commits. Any non-terminal phase may end in `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SymbolPhase {
    Pending,
    Fetching,
    Writing,
    Done,
    Failed,
}

impl SymbolPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolPhase::Pending => "PENDING",
            SymbolPhase::Fetching => "FETCHING",
            SymbolPhase::Writing => "WRITING",
            SymbolPhase::Done => "DONE",
            SymbolPhase::Failed => "FAILED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, SymbolPhase::Done | SymbolPhase::Failed)
    }

    pub fn can_transition_to(&self, next: SymbolPhase) -> bool {
        use SymbolPhase::*;
        matches!(
            (self, next),
            (Pending, Fetching)
                | (Pending, Done)
                | (Fetching, Writing)
                | (Fetching, Done)
                | (Writing, Fetching)
                | (Writing, Done)
                | (Pending, Failed)
                | (Fetching, Failed)
                | (Writing, Failed)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Auth,
    Transient,
    Schema,
    Rejected,
    Storage,
    NoData,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolFailure {
    pub symbol: String,
    /// Phase the symbol was in when it failed.
    pub phase: SymbolPhase,
    pub kind: FailureKind,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadStats {
    pub run_id: String,
    pub symbols_processed: usize,
    pub symbols_skipped: usize,
    pub bars_downloaded: usize,
    pub failures: Vec<SymbolFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl DownloadStats {
    pub fn new(run_id: String, started_at: DateTime<Utc>) -> Self {
        Self {
            run_id,
            symbols_processed: 0,
            symbols_skipped: 0,
            bars_downloaded: 0,
            failures: Vec::new(),
            started_at,
            finished_at: None,
        }
    }

    pub fn errors(&self) -> usize {
        self.failures.len()
    }

    pub fn failed_symbols(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.symbol.as_str()).collect()
    }

    pub fn record_failure(&mut self, failure: SymbolFailure) {
        self.failures.push(failure);
    }

    pub fn finish(&mut self, at: DateTime<Utc>) {
        self.finished_at = Some(at);
    }

    pub fn elapsed(&self) -> Duration {
        self.finished_at
            .map(|end| end - self.started_at)
            .unwrap_or_else(Duration::zero)
    }
}
