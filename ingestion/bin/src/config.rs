use chrono::NaiveDate;
use histbars_application::{DownloadSettings, FetchSettings, RetryPolicy};
use histbars_domain::{BarInterval, BarUnit, Compression, StorageFormat};
use histbars_infrastructure::gateways::DEFAULT_BASE_URL;
use histbars_infrastructure::{BarChartEndpoint, DatasetLayout, OAuthCredentials};
use histbars_infrastructure::auth::DEFAULT_TOKEN_URL;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_CONFIG_FILE: &str = "histbars.toml";

pub const CLIENT_ID_ENV: &str = "TRADESTATION_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "TRADESTATION_CLIENT_SECRET";
pub const REFRESH_TOKEN_ENV: &str = "TRADESTATION_REFRESH_TOKEN";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Missing credential: set credentials.{field} or {env}")]
    MissingCredential {
        field: &'static str,
        env: &'static str,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub token_url: String,
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }
}

/// Everything a download run needs, read from TOML.
///
/// ```toml
/// symbols = ["@ES", "@NQ"]
/// data_dir = "./data"
/// storage_format = "daily"
///
/// [credentials]
/// client_id = "..."
/// ```
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct DownloaderConfig {
    pub credentials: Credentials,
    pub api_base_url: String,
    /// Empty means every symbol of the default catalogue.
    pub symbols: Vec<String>,
    pub data_dir: PathBuf,
    pub start_date: NaiveDate,
    pub interval: u32,
    pub unit: BarUnit,
    pub max_bars_per_request: u32,
    pub rate_limit_delay_ms: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub backoff_max_ms: u64,
    pub request_timeout_secs: u64,
    pub flush_threshold: usize,
    pub storage_format: StorageFormat,
    pub compression: Compression,
    pub datetime_index: bool,
    /// Keep fetched bars in the run outcome.
    pub retain_bars: bool,
}

impl Default for DownloaderConfig {
    fn default() -> Self {
        let fetch = FetchSettings::default();
        let download = DownloadSettings::default();
        Self {
            credentials: Credentials::default(),
            api_base_url: DEFAULT_BASE_URL.to_string(),
            symbols: Vec::new(),
            data_dir: PathBuf::from("./data"),
            start_date: download.start_date,
            interval: fetch.interval.value(),
            unit: fetch.interval.unit(),
            max_bars_per_request: fetch.max_bars_per_request,
            rate_limit_delay_ms: 500,
            max_retries: fetch.retry.max_retries,
            backoff_base_ms: fetch.retry.base_delay.as_millis() as u64,
            backoff_max_ms: fetch.retry.max_delay.as_millis() as u64,
            request_timeout_secs: 60,
            flush_threshold: download.flush_threshold,
            storage_format: StorageFormat::default(),
            compression: Compression::default(),
            datetime_index: true,
            retain_bars: download.retain_bars,
        }
    }
}

impl DownloaderConfig {
    /// Reads `path`, or `histbars.toml` if present, then applies credential
    /// environment overrides. An explicitly given file must exist.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => {
                debug!("No {} found, using defaults", DEFAULT_CONFIG_FILE);
                Self::default()
            }
        };
        config.apply_env_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let overrides = [
            (CLIENT_ID_ENV, &mut self.credentials.client_id),
            (CLIENT_SECRET_ENV, &mut self.credentials.client_secret),
            (REFRESH_TOKEN_ENV, &mut self.credentials.refresh_token),
        ];
        for (name, field) in overrides {
            if let Some(value) = lookup(name).filter(|v| !v.trim().is_empty()) {
                *field = value;
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let credentials = [
            ("client_id", CLIENT_ID_ENV, &self.credentials.client_id),
            ("client_secret", CLIENT_SECRET_ENV, &self.credentials.client_secret),
            ("refresh_token", REFRESH_TOKEN_ENV, &self.credentials.refresh_token),
        ];
        for (field, env, value) in credentials {
            if value.trim().is_empty() {
                return Err(ConfigError::MissingCredential { field, env });
            }
        }

        if self.interval == 0 {
            return Err(ConfigError::Invalid("interval must be positive".into()));
        }
        self.fetch_settings()
            .page_span()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.flush_threshold == 0 {
            return Err(ConfigError::Invalid("flush_threshold must be positive".into()));
        }
        if self.backoff_base_ms > self.backoff_max_ms {
            return Err(ConfigError::Invalid(
                "backoff_base_ms must not exceed backoff_max_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn interval(&self) -> BarInterval {
        BarInterval::new(self.interval, self.unit)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.backoff_base_ms),
            max_delay: Duration::from_millis(self.backoff_max_ms),
        }
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            interval: self.interval(),
            max_bars_per_request: self.max_bars_per_request,
            retry: self.retry_policy(),
        }
    }

    pub fn download_settings(&self) -> DownloadSettings {
        DownloadSettings {
            start_date: self.start_date,
            interval: self.interval(),
            flush_threshold: self.flush_threshold,
            retain_bars: self.retain_bars,
        }
    }

    pub fn layout(&self) -> DatasetLayout {
        DatasetLayout::new(&self.data_dir, self.storage_format, self.datetime_index)
    }

    pub fn oauth_credentials(&self) -> OAuthCredentials {
        OAuthCredentials {
            client_id: self.credentials.client_id.clone(),
            client_secret: self.credentials.client_secret.clone(),
            refresh_token: self.credentials.refresh_token.clone(),
            token_url: self.credentials.token_url.clone(),
        }
    }

    pub fn endpoint(&self) -> BarChartEndpoint {
        BarChartEndpoint {
            base_url: self.api_base_url.clone(),
        }
    }

    pub fn rate_limit_delay(&self) -> Duration {
        Duration::from_millis(self.rate_limit_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use histbars_application::MAX_BARS_PER_REQUEST;
    use std::collections::HashMap;

    fn with_credentials() -> DownloaderConfig {
        let mut config = DownloaderConfig::default();
        config.credentials.client_id = "id".into();
        config.credentials.client_secret = "secret".into();
        config.credentials.refresh_token = "refresh".into();
        config
    }

    #[test]
    fn test_defaults() {
        let config = DownloaderConfig::default();

        assert_eq!(config.data_dir, PathBuf::from("./data"));
        assert_eq!(config.start_date, NaiveDate::from_ymd_opt(2007, 1, 1).unwrap());
        assert_eq!(config.interval(), BarInterval::minutes(1));
        assert_eq!(config.max_bars_per_request, 57_600);
        assert_eq!(config.rate_limit_delay(), Duration::from_millis(500));
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.backoff_base_ms, 1_000);
        assert_eq!(config.backoff_max_ms, 60_000);
        assert_eq!(config.request_timeout(), Duration::from_secs(60));
        assert_eq!(config.storage_format, StorageFormat::Single);
        assert_eq!(config.compression, Compression::Zstd);
        assert!(config.datetime_index);
        assert_eq!(config.credentials.token_url, DEFAULT_TOKEN_URL);
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = DownloaderConfig::from_toml(
            r#"
            symbols = ["@ES", "@NQ"]
            start_date = "2020-06-01"
            storage_format = "daily"
            compression = "snappy"
            datetime_index = false
            unit = "Minute"

            [credentials]
            client_id = "abc"
            "#,
        )
        .unwrap();

        assert_eq!(config.symbols, vec!["@ES", "@NQ"]);
        assert_eq!(config.start_date, NaiveDate::from_ymd_opt(2020, 6, 1).unwrap());
        assert_eq!(config.storage_format, StorageFormat::Daily);
        assert_eq!(config.compression, Compression::Snappy);
        assert!(!config.datetime_index);
        assert_eq!(config.credentials.client_id, "abc");
        assert_eq!(config.credentials.token_url, DEFAULT_TOKEN_URL);
        assert_eq!(config.max_bars_per_request, 57_600);
    }

    #[test]
    fn test_unknown_values_are_rejected() {
        assert!(DownloaderConfig::from_toml(r#"storage_format = "hourly""#).is_err());
        assert!(DownloaderConfig::from_toml(r#"compresion = "zstd""#).is_err());
    }

    #[test]
    fn test_env_overrides_credentials() {
        let env = HashMap::from([
            (CLIENT_ID_ENV, "env-id"),
            (REFRESH_TOKEN_ENV, "env-refresh"),
            (CLIENT_SECRET_ENV, "  "),
        ]);
        let mut config = with_credentials();

        config.apply_env_overrides(|name| env.get(name).map(|v| v.to_string()));

        assert_eq!(config.credentials.client_id, "env-id");
        assert_eq!(config.credentials.client_secret, "secret");
        assert_eq!(config.credentials.refresh_token, "env-refresh");
    }

    #[test]
    fn test_validate_requires_credentials() {
        assert!(with_credentials().validate().is_ok());

        let mut config = with_credentials();
        config.credentials.refresh_token.clear();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingCredential {
                env: REFRESH_TOKEN_ENV,
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_sizes() {
        let mut config = with_credentials();
        config.max_bars_per_request = 0;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_caps_bars_per_request() {
        let mut config = with_credentials();
        config.max_bars_per_request = MAX_BARS_PER_REQUEST;
        assert!(config.validate().is_ok());

        config.max_bars_per_request = MAX_BARS_PER_REQUEST + 1;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));

        config.max_bars_per_request = 3_000_000_000;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_overflowing_page_span() {
        let mut config = with_credentials();
        config.unit = BarUnit::Daily;
        config.interval = u32::MAX;
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_missing_explicit_file_is_an_error() {
        let result = DownloaderConfig::load(Some(Path::new("/nonexistent/histbars.toml")));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_settings_follow_config() {
        let mut config = with_credentials();
        config.interval = 5;
        config.max_retries = 7;
        config.storage_format = StorageFormat::Monthly;

        assert_eq!(config.fetch_settings().interval, BarInterval::minutes(5));
        assert_eq!(config.fetch_settings().retry.max_retries, 7);
        assert_eq!(config.download_settings().interval, BarInterval::minutes(5));
        assert_eq!(config.layout().format, StorageFormat::Monthly);
        assert_eq!(config.oauth_credentials().client_id, "id");
    }
}
