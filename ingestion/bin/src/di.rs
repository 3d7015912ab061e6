use crate::config::DownloaderConfig;
use histbars_application::bar_fetcher::PagedBarFetcherParameters;
use histbars_application::download_service::DownloadServiceImplParameters;
use histbars_application::{DownloadServiceImpl, PagedBarFetcher};
use histbars_infrastructure::{
    IntervalRateLimiter, IntervalRateLimiterParameters, ParquetPartitionWriter,
    ParquetPartitionWriterParameters, ParquetStateStore, ParquetStateStoreParameters,
    RefreshTokenProvider, RefreshTokenProviderParameters, ReqwestBarChartClient,
    ReqwestBarChartClientParameters, SystemClock,
};
use shaku::module;

module! {
    pub AppModule {
        components = [
            DownloadServiceImpl,
            PagedBarFetcher,
            ReqwestBarChartClient,
            RefreshTokenProvider,
            IntervalRateLimiter,
            ParquetStateStore,
            ParquetPartitionWriter,
            SystemClock
        ],
        providers = []
    }
}

pub fn create_app_module(config: &DownloaderConfig) -> anyhow::Result<AppModule> {
    std::fs::create_dir_all(&config.data_dir)?;

    let http = reqwest::Client::builder()
        .timeout(config.request_timeout())
        .build()?;

    let module = AppModule::builder()
        .with_component_parameters::<DownloadServiceImpl>(DownloadServiceImplParameters {
            settings: config.download_settings(),
        })
        .with_component_parameters::<PagedBarFetcher>(PagedBarFetcherParameters {
            settings: config.fetch_settings(),
        })
        .with_component_parameters::<ReqwestBarChartClient>(ReqwestBarChartClientParameters {
            endpoint: config.endpoint(),
            http: http.clone(),
        })
        .with_component_parameters::<RefreshTokenProvider>(RefreshTokenProviderParameters {
            credentials: config.oauth_credentials(),
            http,
            cached: tokio::sync::RwLock::new(None),
        })
        .with_component_parameters::<IntervalRateLimiter>(IntervalRateLimiterParameters {
            delay: config.rate_limit_delay(),
            next_allowed: std::sync::Mutex::new(None),
        })
        .with_component_parameters::<ParquetStateStore>(ParquetStateStoreParameters {
            layout: config.layout(),
        })
        .with_component_parameters::<ParquetPartitionWriter>(ParquetPartitionWriterParameters {
            layout: config.layout(),
            compression: config.compression,
            commit_lock: tokio::sync::Mutex::new(()),
        })
        .build();

    Ok(module)
}
