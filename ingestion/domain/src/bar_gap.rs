use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::Bar;

/// Interval between two consecutive stored bars that exceeds a threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarGap {
    after: DateTime<Utc>,
    before: DateTime<Utc>,
}

impl BarGap {
    pub fn new(after: DateTime<Utc>, before: DateTime<Utc>) -> Self {
        Self { after, before }
    }

    /// Timestamp of the last bar before the gap.
    pub fn after(&self) -> DateTime<Utc> {
        self.after
    }

    /// Timestamp of the first bar after the gap.
    pub fn before(&self) -> DateTime<Utc> {
        self.before
    }

    pub fn length(&self) -> Duration {
        self.before - self.after
    }
}

/// Finds consecutive bars further apart than `max_gap`. Bars must be sorted.
pub fn detect_gaps(bars: &[Bar], max_gap: Duration) -> Vec<BarGap> {
    bars.windows(2)
        .filter_map(|pair| {
            let (prev, next) = (pair[0].timestamp(), pair[1].timestamp());
            (next - prev > max_gap).then(|| BarGap::new(prev, next))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn bar(day: u32, hour: u32, minute: u32) -> Bar {
        let ts = Utc.with_ymd_and_hms(2025, 1, day, hour, minute, 0).unwrap();
        Bar::new(ts, 100.0, 101.0, 99.0, 100.5, 1_000).unwrap()
    }

    #[test]
    fn test_no_gaps() {
        let bars: Vec<Bar> = (0..5).map(|m| bar(1, 9, m)).collect();

        let gaps = detect_gaps(&bars, Duration::minutes(1));
        assert_eq!(gaps.len(), 0);
    }

    #[test]
    fn test_single_gap() {
        let bars = vec![bar(1, 9, 0), bar(1, 9, 1), bar(1, 12, 0), bar(1, 12, 1)];

        let gaps = detect_gaps(&bars, Duration::hours(1));
        assert_eq!(gaps.len(), 1);
        assert_eq!(gaps[0].after(), bar(1, 9, 1).timestamp());
        assert_eq!(gaps[0].before(), bar(1, 12, 0).timestamp());
        assert_eq!(gaps[0].length(), Duration::minutes(179));
    }

    #[test]
    fn test_multiple_gaps() {
        let bars = vec![bar(1, 9, 0), bar(3, 9, 0), bar(3, 9, 1), bar(6, 9, 0)];

        let gaps = detect_gaps(&bars, Duration::days(1));
        assert_eq!(gaps.len(), 2);
    }

    #[test]
    fn test_too_few_bars() {
        assert!(detect_gaps(&[bar(1, 9, 0)], Duration::minutes(1)).is_empty());
        assert!(detect_gaps(&[], Duration::minutes(1)).is_empty());
    }
}
