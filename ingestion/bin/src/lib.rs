pub mod config;
pub mod di;
pub mod symbols;

use crate::config::DownloaderConfig;
use crate::di::create_app_module;
use histbars_application::{DownloadMode, DownloadOutcome, DownloadRequest, DownloadService};
use shaku::HasComponent;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

/// Downloads the configured symbols, or the whole default catalogue when
/// none are configured.
pub async fn run_download(
    config: &DownloaderConfig,
    mode: DownloadMode,
    shutdown: watch::Receiver<bool>,
) -> anyhow::Result<DownloadOutcome> {
    config.validate()?;

    let symbols = if config.symbols.is_empty() {
        info!("No symbols configured, downloading the default catalogue");
        symbols::all_symbols()
    } else {
        config.symbols.clone()
    };

    let module = create_app_module(config)?;
    let service: Arc<dyn DownloadService> = module.resolve();

    Ok(service.run(DownloadRequest { symbols, mode }, shutdown).await)
}
