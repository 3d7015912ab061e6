use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

use crate::{Bar, PartitionKey, StorageFormat};

/// Merges `incoming` into `existing`, keyed by timestamp.
///
/// On a timestamp conflict the incoming bar wins. The result is sorted and
/// holds each timestamp once.
pub fn merge_bars(existing: Vec<Bar>, incoming: Vec<Bar>) -> Vec<Bar> {
    let mut by_timestamp: BTreeMap<DateTime<Utc>, Bar> = BTreeMap::new();

    for bar in existing.into_iter().chain(incoming) {
        by_timestamp.insert(bar.timestamp(), bar);
    }

    by_timestamp.into_values().collect()
}

/// Splits a batch into partition buckets, each merged and sorted.
pub fn group_by_partition(format: StorageFormat, bars: Vec<Bar>) -> BTreeMap<PartitionKey, Vec<Bar>> {
    let mut groups: BTreeMap<PartitionKey, Vec<Bar>> = BTreeMap::new();

    for bar in bars {
        groups
            .entry(format.partition_key(bar.timestamp()))
            .or_default()
            .push(bar);
    }

    groups
        .into_iter()
        .map(|(key, group)| (key, merge_bars(Vec::new(), group)))
        .collect()
}

pub fn is_strictly_increasing(bars: &[Bar]) -> bool {
    bars.windows(2)
        .all(|pair| pair[0].timestamp() < pair[1].timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone};

    fn bar(day: u32, hour: u32, minute: u32, close: f64) -> Bar {
        let ts = Utc.with_ymd_and_hms(2024, 1, day, hour, minute, 0).unwrap();
        Bar::new(ts, close, close, close, close, 100).unwrap()
    }

    #[test]
    fn test_merge_appends_and_sorts() {
        let existing = vec![bar(5, 9, 30, 1.0), bar(5, 9, 31, 2.0)];
        let incoming = vec![bar(5, 9, 33, 4.0), bar(5, 9, 32, 3.0)];

        let merged = merge_bars(existing, incoming);

        assert_eq!(merged.len(), 4);
        assert!(is_strictly_increasing(&merged));
        assert_eq!(merged[2].close(), 3.0);
    }

    #[test]
    fn test_incoming_wins_on_conflict() {
        let existing = vec![bar(5, 9, 30, 1.0), bar(5, 9, 31, 2.0)];
        let incoming = vec![bar(5, 9, 31, 20.0)];

        let merged = merge_bars(existing, incoming);

        assert_eq!(merged.len(), 2);
        assert_eq!(merged[1].close(), 20.0);
    }

    #[test]
    fn test_duplicates_inside_batch_collapse() {
        let merged = merge_bars(Vec::new(), vec![bar(5, 9, 30, 1.0), bar(5, 9, 30, 2.0)]);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].close(), 2.0);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let bars = vec![bar(5, 9, 30, 1.0), bar(5, 9, 31, 2.0)];

        let once = merge_bars(Vec::new(), bars.clone());
        let twice = merge_bars(once.clone(), bars);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_group_by_day() {
        let bars = vec![bar(6, 0, 1, 3.0), bar(5, 23, 59, 1.0), bar(6, 0, 0, 2.0)];

        let groups = group_by_partition(StorageFormat::Daily, bars);

        let keys: Vec<PartitionKey> = groups.keys().copied().collect();
        assert_eq!(
            keys,
            vec![
                PartitionKey::Day(NaiveDate::from_ymd_opt(2024, 1, 5).unwrap()),
                PartitionKey::Day(NaiveDate::from_ymd_opt(2024, 1, 6).unwrap()),
            ]
        );
        let jan6 = &groups[&keys[1]];
        assert!(is_strictly_increasing(jan6));
        assert_eq!(jan6.len(), 2);
    }

    #[test]
    fn test_group_single_is_one_bucket() {
        let bars = vec![bar(6, 0, 1, 3.0), bar(5, 23, 59, 1.0)];

        let groups = group_by_partition(StorageFormat::Single, bars);

        assert_eq!(groups.len(), 1);
        assert!(groups.contains_key(&PartitionKey::Whole));
    }
}
