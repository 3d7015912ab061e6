use anyhow::Context;
use clap::Parser;
use histbars_application::DownloadMode;
use histbars_bin::config::DownloaderConfig;
use histbars_bin::run_download;
use histbars_bin::symbols::{self, parse_category};
use histbars_domain::{Compression, StorageFormat};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser)]
#[command(name = "histbars")]
#[command(about = "Download historical 1-minute futures bars into a Parquet dataset")]
#[command(after_help = "Examples:
  histbars                          Download all configured symbols (incremental)
  histbars -s @ES @NQ               Download specific symbols
  histbars --category energy        Download one category of the default catalogue
  histbars --full                   Re-download from the configured start date")]
struct Cli {
    /// Path to the configuration file (default: histbars.toml if present)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Specific symbols to download (overrides config)
    #[arg(short, long, num_args = 1..)]
    symbols: Vec<String>,

    /// Download every symbol of one default category
    #[arg(long, value_parser = parse_category, conflicts_with = "symbols")]
    category: Option<String>,

    /// Ignore stored data and download from the start date
    #[arg(long)]
    full: bool,

    /// single, daily or monthly
    #[arg(long)]
    storage_format: Option<StorageFormat>,

    /// zstd, snappy, gzip, lz4 or none
    #[arg(long)]
    compression: Option<Compression>,

    /// Store datetime as a plain column instead of the frame index
    #[arg(long)]
    no_datetime_index: bool,

    #[arg(long)]
    list_symbols: bool,

    #[arg(long)]
    list_categories: bool,

    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply_to(&self, config: &mut DownloaderConfig) {
        if !self.symbols.is_empty() {
            config.symbols = self.symbols.clone();
        } else if let Some(symbols) = self.category.as_deref().and_then(symbols::category) {
            config.symbols = symbols.iter().map(|s| s.to_string()).collect();
        }
        if let Some(format) = self.storage_format {
            config.storage_format = format;
        }
        if let Some(compression) = self.compression {
            config.compression = compression;
        }
        if self.no_datetime_index {
            config.datetime_index = false;
        }
        config.retain_bars = false;
    }

    fn mode(&self) -> DownloadMode {
        if self.full {
            DownloadMode::FullRefresh
        } else {
            DownloadMode::Incremental
        }
    }
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if cli.list_symbols {
        symbols::print_symbols();
        return ExitCode::SUCCESS;
    }
    if cli.list_categories {
        symbols::print_categories();
        return ExitCode::SUCCESS;
    }

    init_tracing(cli.verbose);

    match run(&cli).await {
        Ok(code) => code,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    let mut config =
        DownloaderConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    cli.apply_to(&mut config);

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let interrupted = shutdown_rx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Received shutdown signal, stopping after the current symbol...");
            shutdown_tx.send_replace(true);
        }
    });

    let outcome = run_download(&config, cli.mode(), shutdown_rx).await?;

    if *interrupted.borrow() {
        info!("Download interrupted by user");
        return Ok(ExitCode::from(EXIT_INTERRUPTED));
    }
    if outcome.stats.errors() > 0 {
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}
