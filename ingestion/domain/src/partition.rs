use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// On-disk layout policy of a symbol dataset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageFormat {
    /// One file per symbol.
    #[default]
    Single,
    /// One file per calendar day.
    Daily,
    /// One file per calendar month.
    Monthly,
}

impl StorageFormat {
    pub const ALL: [StorageFormat; 3] = [
        StorageFormat::Single,
        StorageFormat::Daily,
        StorageFormat::Monthly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StorageFormat::Single => "single",
            StorageFormat::Daily => "daily",
            StorageFormat::Monthly => "monthly",
        }
    }

    pub fn partition_key(&self, timestamp: DateTime<Utc>) -> PartitionKey {
        match self {
            StorageFormat::Single => PartitionKey::Whole,
            StorageFormat::Daily => PartitionKey::Day(timestamp.date_naive()),
            StorageFormat::Monthly => PartitionKey::Month {
                year: timestamp.year(),
                month: timestamp.month(),
            },
        }
    }
}

impl FromStr for StorageFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        StorageFormat::ALL
            .into_iter()
            .find(|format| format.as_str() == value.to_ascii_lowercase())
            .ok_or_else(|| {
                format!(
                    "Invalid storage format: '{}'. Must be one of: 'single', 'daily', 'monthly'",
                    value
                )
            })
    }
}

impl fmt::Display for StorageFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Column compression of stored files. Does not change logical content.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    #[default]
    Zstd,
    Snappy,
    Gzip,
    Lz4,
    None,
}

impl Compression {
    pub const ALL: [Compression; 5] = [
        Compression::Zstd,
        Compression::Snappy,
        Compression::Gzip,
        Compression::Lz4,
        Compression::None,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Compression::Zstd => "zstd",
            Compression::Snappy => "snappy",
            Compression::Gzip => "gzip",
            Compression::Lz4 => "lz4",
            Compression::None => "none",
        }
    }
}

impl FromStr for Compression {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Compression::ALL
            .into_iter()
            .find(|compression| compression.as_str() == value.to_ascii_lowercase())
            .ok_or_else(|| {
                format!(
                    "Invalid compression: '{}'. Must be one of: 'zstd', 'snappy', 'gzip', 'lz4', 'none'",
                    value
                )
            })
    }
}

impl fmt::Display for Compression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Calendar bucket addressing one partition file. Orders chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PartitionKey {
    Whole,
    Day(NaiveDate),
    Month { year: i32, month: u32 },
}

impl fmt::Display for PartitionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PartitionKey::Whole => f.write_str("all"),
            PartitionKey::Day(date) => write!(f, "{}", date.format("%Y-%m-%d")),
            PartitionKey::Month { year, month } => write!(f, "{:04}-{:02}", year, month),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_partition_keys_by_format() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 15, 9, 30, 0).unwrap();

        assert_eq!(StorageFormat::Single.partition_key(ts), PartitionKey::Whole);
        assert_eq!(
            StorageFormat::Daily.partition_key(ts),
            PartitionKey::Day(NaiveDate::from_ymd_opt(2024, 1, 15).unwrap())
        );
        assert_eq!(
            StorageFormat::Monthly.partition_key(ts),
            PartitionKey::Month {
                year: 2024,
                month: 1
            }
        );
    }

    #[test]
    fn test_month_keys_order_chronologically() {
        let dec = PartitionKey::Month {
            year: 2023,
            month: 12,
        };
        let jan = PartitionKey::Month {
            year: 2024,
            month: 1,
        };
        assert!(dec < jan);
    }

    #[test]
    fn test_parse_formats() {
        assert_eq!("DAILY".parse::<StorageFormat>().unwrap(), StorageFormat::Daily);
        assert!("hourly".parse::<StorageFormat>().is_err());
        assert_eq!("lz4".parse::<Compression>().unwrap(), Compression::Lz4);
        assert!("brotli".parse::<Compression>().is_err());
    }
}
