//! Bars <-> Parquet files.
//!
//! Files hold `datetime` (timestamp, UTC), `open`, `high`, `low`, `close`
//! (float64) and `volume` (uint64). Readers cast whatever unit or numeric type
//! a file was written with.

use arrow::array::{
    Array, ArrayRef, AsArray, Float64Array, RecordBatch, TimestampMicrosecondArray, UInt64Array,
};
use arrow::compute::cast;
use arrow::datatypes::{
    DataType, Field, Float64Type, Schema, SchemaRef, TimeUnit, TimestampMicrosecondType,
    UInt64Type,
};
use chrono::{DateTime, Utc};
use histbars_application::ports::StorageError;
use histbars_domain::{Bar, Compression};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::{ArrowWriter, ProjectionMask};
use parquet::basic::{Compression as ParquetCompression, GzipLevel, ZstdLevel};
use parquet::file::properties::WriterProperties;
use serde_json::json;
use std::collections::HashMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

pub const TIMESTAMP_COLUMN: &str = "datetime";
const VOLUME_COLUMN: &str = "volume";
const PANDAS_METADATA_KEY: &str = "pandas";

fn utc_micros() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into()))
}

/// Schema of written files. In datetime index mode the pandas metadata marks
/// `datetime` as the frame index.
pub fn bar_schema(datetime_index: bool) -> SchemaRef {
    let schema = Schema::new(vec![
        Field::new(TIMESTAMP_COLUMN, utc_micros(), false),
        Field::new("open", DataType::Float64, false),
        Field::new("high", DataType::Float64, false),
        Field::new("low", DataType::Float64, false),
        Field::new("close", DataType::Float64, false),
        Field::new(VOLUME_COLUMN, DataType::UInt64, false),
    ]);

    if datetime_index {
        let metadata = HashMap::from([(PANDAS_METADATA_KEY.to_string(), pandas_metadata())]);
        Arc::new(schema.with_metadata(metadata))
    } else {
        Arc::new(schema)
    }
}

fn pandas_metadata() -> String {
    let value_column = |name: &str, dtype: &str| {
        json!({
            "name": name,
            "field_name": name,
            "pandas_type": dtype,
            "numpy_type": dtype,
            "metadata": null,
        })
    };

    json!({
        "index_columns": [TIMESTAMP_COLUMN],
        "column_indexes": [],
        "columns": [
            value_column("open", "float64"),
            value_column("high", "float64"),
            value_column("low", "float64"),
            value_column("close", "float64"),
            value_column(VOLUME_COLUMN, "uint64"),
            {
                "name": TIMESTAMP_COLUMN,
                "field_name": TIMESTAMP_COLUMN,
                "pandas_type": "datetimetz",
                "numpy_type": "datetime64[ns]",
                "metadata": { "timezone": "UTC" },
            },
        ],
        "creator": { "library": "histbars", "version": env!("CARGO_PKG_VERSION") },
        "pandas_version": "2.2.0",
    })
    .to_string()
}

pub fn bars_to_record_batch(bars: &[Bar], schema: SchemaRef) -> Result<RecordBatch, StorageError> {
    let timestamps: Vec<i64> = bars.iter().map(|b| b.timestamp().timestamp_micros()).collect();
    let prices = |f: fn(&Bar) -> f64| -> ArrayRef {
        Arc::new(Float64Array::from(bars.iter().map(f).collect::<Vec<_>>()))
    };
    let volumes: Vec<u64> = bars.iter().map(|b| b.volume()).collect();

    let arrays: Vec<ArrayRef> = vec![
        Arc::new(TimestampMicrosecondArray::from(timestamps).with_timezone("UTC")),
        prices(Bar::open),
        prices(Bar::high),
        prices(Bar::low),
        prices(Bar::close),
        Arc::new(UInt64Array::from(volumes)),
    ];

    RecordBatch::try_new(schema, arrays)
        .map_err(|e| StorageError::SerializationError(e.to_string()))
}

fn writer_properties(compression: Compression) -> WriterProperties {
    let codec = match compression {
        Compression::Zstd => ParquetCompression::ZSTD(ZstdLevel::default()),
        Compression::Snappy => ParquetCompression::SNAPPY,
        Compression::Gzip => ParquetCompression::GZIP(GzipLevel::default()),
        Compression::Lz4 => ParquetCompression::LZ4_RAW,
        Compression::None => ParquetCompression::UNCOMPRESSED,
    };
    WriterProperties::builder().set_compression(codec).build()
}

/// A fully written and synced partition that is not yet visible under its
/// final name. Dropping it without [`StagedPartition::commit`] removes the
/// staging file.
#[derive(Debug)]
pub struct StagedPartition {
    staging_path: PathBuf,
    target_path: PathBuf,
    committed: bool,
}

impl StagedPartition {
    pub fn target_path(&self) -> &Path {
        &self.target_path
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    /// Atomically replaces the target file.
    pub fn commit(mut self) -> Result<(), StorageError> {
        fs::rename(&self.staging_path, &self.target_path)?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for StagedPartition {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        if let Err(e) = fs::remove_file(&self.staging_path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(
                    "Failed to remove staging file {}: {}",
                    self.staging_path.display(),
                    e
                );
            }
        }
    }
}

pub fn staging_path(target: &Path) -> PathBuf {
    target.with_extension("parquet.tmp")
}

/// Writes `bars` next to `target` and fsyncs the file.
pub fn stage_partition(
    target: &Path,
    bars: &[Bar],
    compression: Compression,
    datetime_index: bool,
) -> Result<StagedPartition, StorageError> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }

    let staged = StagedPartition {
        staging_path: staging_path(target),
        target_path: target.to_path_buf(),
        committed: false,
    };

    let schema = bar_schema(datetime_index);
    let batch = bars_to_record_batch(bars, schema.clone())?;

    let file = File::create(&staged.staging_path)?;
    let mut writer = ArrowWriter::try_new(file, schema, Some(writer_properties(compression)))
        .map_err(|e| StorageError::SerializationError(e.to_string()))?;
    writer
        .write(&batch)
        .map_err(|e| StorageError::SerializationError(e.to_string()))?;
    let file = writer
        .into_inner()
        .map_err(|e| StorageError::SerializationError(e.to_string()))?;
    file.sync_all()?;

    Ok(staged)
}

fn corrupt(path: &Path, reason: impl ToString) -> StorageError {
    StorageError::CorruptFile {
        path: path.display().to_string(),
        reason: reason.to_string(),
    }
}

fn column_as(
    batch: &RecordBatch,
    name: &str,
    data_type: &DataType,
    path: &Path,
) -> Result<ArrayRef, StorageError> {
    let column = batch
        .column_by_name(name)
        .ok_or_else(|| corrupt(path, format!("missing column '{}'", name)))?;
    cast(column, data_type).map_err(|e| corrupt(path, e))
}

fn to_utc(micros: i64, path: &Path) -> Result<DateTime<Utc>, StorageError> {
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| corrupt(path, format!("timestamp out of range: {}", micros)))
}

/// Every bar of one file, in file order.
pub fn read_bars(path: &Path) -> Result<Vec<Bar>, StorageError> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .and_then(|builder| builder.build())
        .map_err(|e| corrupt(path, e))?;

    let mut bars = Vec::new();
    for batch in reader {
        let batch = batch.map_err(|e| corrupt(path, e))?;

        let timestamps = column_as(&batch, TIMESTAMP_COLUMN, &utc_micros(), path)?;
        let timestamps = timestamps.as_primitive::<TimestampMicrosecondType>();
        let open = column_as(&batch, "open", &DataType::Float64, path)?;
        let open = open.as_primitive::<Float64Type>();
        let high = column_as(&batch, "high", &DataType::Float64, path)?;
        let high = high.as_primitive::<Float64Type>();
        let low = column_as(&batch, "low", &DataType::Float64, path)?;
        let low = low.as_primitive::<Float64Type>();
        let close = column_as(&batch, "close", &DataType::Float64, path)?;
        let close = close.as_primitive::<Float64Type>();
        let volume = column_as(&batch, VOLUME_COLUMN, &DataType::UInt64, path)?;
        let volume = volume.as_primitive::<UInt64Type>();

        let has_nulls = [
            timestamps.null_count(),
            open.null_count(),
            high.null_count(),
            low.null_count(),
            close.null_count(),
            volume.null_count(),
        ]
        .iter()
        .any(|&nulls| nulls > 0);
        if has_nulls {
            return Err(corrupt(path, "null values in bar columns"));
        }

        bars.reserve(batch.num_rows());
        for i in 0..batch.num_rows() {
            let bar = Bar::new(
                to_utc(timestamps.value(i), path)?,
                open.value(i),
                high.value(i),
                low.value(i),
                close.value(i),
                volume.value(i),
            )
            .map_err(|e| corrupt(path, e))?;
            bars.push(bar);
        }
    }

    Ok(bars)
}

/// Latest timestamp of one file, reading only the timestamp column.
pub fn max_timestamp(path: &Path) -> Result<Option<DateTime<Utc>>, StorageError> {
    let file = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(file).map_err(|e| corrupt(path, e))?;

    if builder.metadata().file_metadata().num_rows() == 0 {
        return Ok(None);
    }

    let index = builder
        .schema()
        .index_of(TIMESTAMP_COLUMN)
        .map_err(|e| corrupt(path, e))?;
    let mask = ProjectionMask::roots(builder.parquet_schema(), [index]);
    let reader = builder
        .with_projection(mask)
        .build()
        .map_err(|e| corrupt(path, e))?;

    let mut latest: Option<i64> = None;
    for batch in reader {
        let batch = batch.map_err(|e| corrupt(path, e))?;
        let timestamps = column_as(&batch, TIMESTAMP_COLUMN, &utc_micros(), path)?;
        let batch_max = timestamps
            .as_primitive::<TimestampMicrosecondType>()
            .iter()
            .flatten()
            .max();
        latest = latest.max(batch_max);
    }

    latest.map(|micros| to_utc(micros, path)).transpose()
}
