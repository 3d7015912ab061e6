use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::BarInterval;

/// Half-open UTC range `[start, end)` that still has to be fetched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl DownloadWindow {
    /// An inverted range collapses to an empty window at `start`.
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Window following a stored high-water mark.
    pub fn after(high_water_mark: DateTime<Utc>, interval: BarInterval, now: DateTime<Utc>) -> Self {
        Self::new(high_water_mark + interval.duration(), now)
    }

    /// Window starting at midnight UTC of `start_date`.
    pub fn from_date(start_date: NaiveDate, now: DateTime<Utc>) -> Self {
        let start = start_date
            .and_hms_opt(0, 0, 0)
            .map(|dt| dt.and_utc())
            .unwrap_or(now);
        Self::new(start, now)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    pub fn contains(&self, timestamp: DateTime<Utc>) -> bool {
        timestamp >= self.start && timestamp < self.end
    }

    /// Leading part of the window, at most `span` long.
    pub fn head(&self, span: Duration) -> DownloadWindow {
        if span <= Duration::zero() {
            return *self;
        }
        let end = self
            .start
            .checked_add_signed(span)
            .map_or(self.end, |candidate| candidate.min(self.end));
        DownloadWindow::new(self.start, end)
    }

    /// What is left of the window from `cursor` on.
    pub fn resume_from(&self, cursor: DateTime<Utc>) -> DownloadWindow {
        DownloadWindow::new(cursor.max(self.start), self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(day: u32, hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap()
    }

    #[test]
    fn test_window_after_high_water_mark() {
        let window = DownloadWindow::after(at(5, 23, 59), BarInterval::minutes(1), at(6, 1, 31));

        assert_eq!(window.start(), at(6, 0, 0));
        assert_eq!(window.end(), at(6, 1, 31));
        assert!(!window.is_empty());
    }

    #[test]
    fn test_inverted_window_is_empty() {
        let window = DownloadWindow::new(at(6, 0, 0), at(5, 0, 0));

        assert!(window.is_empty());
        assert_eq!(window.start(), window.end());
    }

    #[test]
    fn test_up_to_date_window_is_empty() {
        let window = DownloadWindow::after(at(6, 1, 30), BarInterval::minutes(1), at(6, 1, 31));
        assert!(window.is_empty());
    }

    #[test]
    fn test_from_date_starts_at_midnight() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let window = DownloadWindow::from_date(date, at(6, 0, 0));

        assert_eq!(window.start(), at(2, 0, 0));
    }

    #[test]
    fn test_contains_is_half_open() {
        let window = DownloadWindow::new(at(6, 0, 0), at(6, 1, 0));

        assert!(window.contains(at(6, 0, 0)));
        assert!(window.contains(at(6, 0, 59)));
        assert!(!window.contains(at(6, 1, 0)));
    }

    #[test]
    fn test_head_is_capped_by_span_and_window_end() {
        let window = DownloadWindow::new(at(6, 0, 0), at(6, 2, 30));

        assert_eq!(
            window.head(Duration::hours(1)),
            DownloadWindow::new(at(6, 0, 0), at(6, 1, 0))
        );
        assert_eq!(window.head(Duration::hours(5)), window);
    }

    #[test]
    fn test_resume_from_drops_the_covered_prefix() {
        let window = DownloadWindow::new(at(6, 0, 0), at(6, 2, 30));

        let rest = window.resume_from(at(6, 1, 40));
        assert_eq!(rest.start(), at(6, 1, 40));
        assert_eq!(rest.end(), at(6, 2, 30));
        assert!(window.resume_from(at(6, 3, 0)).is_empty());
        assert_eq!(window.resume_from(at(5, 0, 0)), window);
    }
}
