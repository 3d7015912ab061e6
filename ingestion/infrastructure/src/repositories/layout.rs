//! Where a symbol's partitions live on disk.
//!
//! ```text
//! single   <root>/<name>_1min.parquet
//! daily    <root>/<name>/year=YYYY/month=MM/day=DD/<name>.parquet
//! monthly  <root>/<name>/year_month=YYYY-MM/data-0.parquet
//! ```
//!
//! `<name>` is the cleaned symbol, suffixed with `_index_1` in datetime index
//! mode.

use chrono::NaiveDate;
use histbars_domain::{PartitionKey, StorageFormat};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const SINGLE_FILE_SUFFIX: &str = "_1min.parquet";
const INDEX_SUFFIX: &str = "_index_1";
const MONTHLY_FILE_NAME: &str = "data-0.parquet";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetLayout {
    pub root: PathBuf,
    pub format: StorageFormat,
    pub datetime_index: bool,
}

impl DatasetLayout {
    pub fn new(root: impl Into<PathBuf>, format: StorageFormat, datetime_index: bool) -> Self {
        Self {
            root: root.into(),
            format,
            datetime_index,
        }
    }

    pub fn dataset_name(&self, symbol: &str) -> String {
        let clean = clean_symbol(symbol);
        if self.datetime_index {
            format!("{}{}", clean, INDEX_SUFFIX)
        } else {
            clean
        }
    }

    pub fn partition_path(&self, symbol: &str, key: &PartitionKey) -> PathBuf {
        let name = self.dataset_name(symbol);
        match key {
            PartitionKey::Whole => self.root.join(format!("{}{}", name, SINGLE_FILE_SUFFIX)),
            PartitionKey::Day(date) => self
                .root
                .join(&name)
                .join(date.format("year=%Y").to_string())
                .join(date.format("month=%m").to_string())
                .join(date.format("day=%d").to_string())
                .join(format!("{}.parquet", name)),
            PartitionKey::Month { year, month } => self
                .root
                .join(&name)
                .join(format!("year_month={:04}-{:02}", year, month))
                .join(MONTHLY_FILE_NAME),
        }
    }

    /// Existing partition files of `symbol` in key order. Staging files are
    /// never listed.
    pub fn partition_files(&self, symbol: &str) -> io::Result<Vec<(PartitionKey, PathBuf)>> {
        let mut files = BTreeMap::new();

        match self.format {
            StorageFormat::Single => {
                let path = self.partition_path(symbol, &PartitionKey::Whole);
                if path.is_file() {
                    files.insert(PartitionKey::Whole, path);
                }
            }
            StorageFormat::Daily => {
                let symbol_dir = self.root.join(self.dataset_name(symbol));
                for (year, year_dir) in labelled_dirs(&symbol_dir, "year=")? {
                    for (month, month_dir) in labelled_dirs(&year_dir, "month=")? {
                        for (day, _) in labelled_dirs(&month_dir, "day=")? {
                            let date = parse_date(&year, &month, &day);
                            if let Some(key) = date.map(PartitionKey::Day) {
                                let path = self.partition_path(symbol, &key);
                                if path.is_file() {
                                    files.insert(key, path);
                                }
                            }
                        }
                    }
                }
            }
            StorageFormat::Monthly => {
                let symbol_dir = self.root.join(self.dataset_name(symbol));
                for (label, _) in labelled_dirs(&symbol_dir, "year_month=")? {
                    if let Some(key) = parse_year_month(&label) {
                        let path = self.partition_path(symbol, &key);
                        if path.is_file() {
                            files.insert(key, path);
                        }
                    }
                }
            }
        }

        Ok(files.into_iter().collect())
    }

    /// Names of every dataset stored under the root in this layout.
    pub fn list_datasets(&self) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        if !self.root.is_dir() {
            return Ok(names);
        }

        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            let file_name = match path.file_name().and_then(|n| n.to_str()) {
                Some(name) => name.to_string(),
                None => continue,
            };

            let matches = match self.format {
                StorageFormat::Single => {
                    if path.is_file() {
                        file_name
                            .strip_suffix(SINGLE_FILE_SUFFIX)
                            .map(str::to_string)
                    } else {
                        None
                    }
                }
                StorageFormat::Daily => {
                    (path.is_dir() && !labelled_dirs(&path, "year=")?.is_empty()).then_some(file_name)
                }
                StorageFormat::Monthly => (path.is_dir()
                    && !labelled_dirs(&path, "year_month=")?.is_empty())
                .then_some(file_name),
            };

            if let Some(name) = matches {
                names.push(name);
            }
        }

        names.sort();
        Ok(names)
    }
}

/// Filesystem safe symbol: `@ES` -> `ES`, `EUR/USD` -> `EUR_USD`.
pub fn clean_symbol(symbol: &str) -> String {
    symbol.replace('@', "").replace('/', "_")
}

/// Guesses the layout of an existing data directory: daily if any dataset
/// has `year=/month=/day=` directories, monthly if any has `year_month=`
/// (or legacy `year=/month=`) directories, single otherwise.
pub fn detect_storage_format(root: &Path) -> StorageFormat {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(_) => return StorageFormat::Single,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let is_dataset_dir = path.is_dir()
            && !path
                .file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.ends_with(".parquet"));
        if !is_dataset_dir {
            continue;
        }

        let years = labelled_dirs(&path, "year=").unwrap_or_default();
        let has_days = years.iter().any(|(_, year_dir)| {
            labelled_dirs(year_dir, "month=")
                .unwrap_or_default()
                .iter()
                .any(|(_, month_dir)| {
                    !labelled_dirs(month_dir, "day=")
                        .unwrap_or_default()
                        .is_empty()
                })
        });
        if has_days {
            return StorageFormat::Daily;
        }

        if !labelled_dirs(&path, "year_month=")
            .unwrap_or_default()
            .is_empty()
        {
            return StorageFormat::Monthly;
        }

        let has_legacy_months = years.iter().any(|(_, year_dir)| {
            !labelled_dirs(year_dir, "month=")
                .unwrap_or_default()
                .is_empty()
        });
        if has_legacy_months {
            return StorageFormat::Monthly;
        }
    }

    StorageFormat::Single
}

/// Sub directories of `dir` named `<prefix><label>`, as `(label, path)`.
/// A missing `dir` has none.
fn labelled_dirs(dir: &Path, prefix: &str) -> io::Result<Vec<(String, PathBuf)>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut dirs = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let label = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(prefix))
            .map(str::to_string);
        if let Some(label) = label {
            dirs.push((label, path));
        }
    }
    Ok(dirs)
}

fn parse_date(year: &str, month: &str, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month.parse().ok()?, day.parse().ok()?)
}

fn parse_year_month(label: &str) -> Option<PartitionKey> {
    let (year, month) = label.split_once('-')?;
    let year: i32 = year.parse().ok()?;
    let month: u32 = month.parse().ok()?;
    (1..=12)
        .contains(&month)
        .then_some(PartitionKey::Month { year, month })
}
