use anyhow::Context;
use chrono::Duration;
use clap::Parser;
use histbars_domain::{detect_gaps, is_strictly_increasing, StorageFormat};
use histbars_infrastructure::{detect_storage_format, DatasetLayout, ParquetStateStore};
use parquet::file::reader::{FileReader, SerializedFileReader};
use std::fs::File;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "verify-dataset")]
#[command(about = "Summarize a stored symbol dataset and report gaps", long_about = None)]
struct Cli {
    symbol: String,

    #[arg(short, long, default_value = "./data")]
    data_dir: PathBuf,

    /// Detected from the data directory when omitted
    #[arg(long)]
    storage_format: Option<StorageFormat>,

    #[arg(long)]
    no_datetime_index: bool,

    /// Report gaps longer than this
    #[arg(long, default_value_t = 1440)]
    max_gap_minutes: i64,

    #[arg(long, default_value_t = 20)]
    show_gaps: usize,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let format = cli
        .storage_format
        .unwrap_or_else(|| detect_storage_format(&cli.data_dir));
    let layout = DatasetLayout::new(&cli.data_dir, format, !cli.no_datetime_index);
    let store = ParquetStateStore::new(layout.clone());

    println!(
        "Verifying {} in {} ({} layout)",
        layout.dataset_name(&cli.symbol),
        cli.data_dir.display(),
        format
    );

    let summary = store
        .summary(&cli.symbol)
        .with_context(|| format!("Failed to read dataset for {}", cli.symbol))?;
    if summary.rows == 0 {
        let available = layout.list_datasets()?;
        if !available.is_empty() {
            println!("\nAvailable datasets: {}", available.join(", "));
        }
        anyhow::bail!("No data stored for {}", cli.symbol);
    }

    println!("\nDataset:");
    println!("  - Rows: {}", summary.rows);
    if let (Some(first), Some(last)) = (summary.first, summary.last) {
        println!("  - First: {}", first);
        println!("  - Last: {}", last);
    }
    println!("  - Partitions: {}", summary.partitions);
    println!("  - Size on disk: {} bytes", summary.bytes);

    println!("\nPartitions:");
    for (key, path) in layout.partition_files(&cli.symbol)? {
        let reader = SerializedFileReader::new(File::open(&path)?)
            .with_context(|| format!("Invalid Parquet file {}", path.display()))?;
        let metadata = reader.metadata();
        let compression = metadata
            .row_groups()
            .first()
            .map(|rg| rg.column(0).compression().to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {}: {} rows, {} row groups, {}",
            key,
            metadata.file_metadata().num_rows(),
            metadata.num_row_groups(),
            compression
        );
    }

    let bars = store
        .read_stored(&cli.symbol)
        .with_context(|| format!("Failed to read dataset for {}", cli.symbol))?;
    if !is_strictly_increasing(&bars) {
        anyhow::bail!("Timestamps are not strictly increasing");
    }

    let gaps = detect_gaps(&bars, Duration::minutes(cli.max_gap_minutes));
    println!(
        "\nGaps longer than {} minutes: {}",
        cli.max_gap_minutes,
        gaps.len()
    );
    for gap in gaps.iter().take(cli.show_gaps) {
        println!(
            "  {} -> {} ({} minutes)",
            gap.after(),
            gap.before(),
            gap.length().num_minutes()
        );
    }
    if gaps.len() > cli.show_gaps {
        println!("  ... {} more", gaps.len() - cli.show_gaps);
    }

    println!("\nDataset is valid");
    Ok(())
}
