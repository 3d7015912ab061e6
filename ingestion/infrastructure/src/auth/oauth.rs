use async_trait::async_trait;
use histbars_application::auth::{AuthError, TokenProvider};
use serde::Deserialize;
use shaku::Component;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, error, info};

pub const DEFAULT_TOKEN_URL: &str = "https://signin.tradestation.com/oauth/token";

/// Tokens are renewed this long before the server side expiry.
const REFRESH_MARGIN: Duration = Duration::from_secs(5 * 60);
const DEFAULT_EXPIRES_IN_SECS: u64 = 1200;

#[derive(Debug, Clone)]
pub struct OAuthCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub refresh_token: String,
    pub token_url: String,
}

impl Default for OAuthCredentials {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            refresh_token: String::new(),
            token_url: DEFAULT_TOKEN_URL.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct CachedToken {
    access_token: String,
    refresh_at: Instant,
}

/// Exchanges a long lived refresh token for short lived access tokens.
#[derive(Component)]
#[shaku(interface = TokenProvider)]
pub struct RefreshTokenProvider {
    credentials: OAuthCredentials,
    http: reqwest::Client,

    #[shaku(default = RwLock::new(None))]
    cached: RwLock<Option<CachedToken>>,
}

impl RefreshTokenProvider {
    pub fn new(credentials: OAuthCredentials, http: reqwest::Client) -> Self {
        Self {
            credentials,
            http,
            cached: RwLock::new(None),
        }
    }

    fn check_credentials(&self) -> Result<(), AuthError> {
        let required = [
            ("client_id", &self.credentials.client_id),
            ("client_secret", &self.credentials.client_secret),
            ("refresh_token", &self.credentials.refresh_token),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(AuthError::MissingCredential(name));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TokenProvider for RefreshTokenProvider {
    async fn get_token(&self) -> Result<String, AuthError> {
        {
            let cached = self.cached.read().await;
            if let Some(token) = cached.as_ref() {
                if Instant::now() < token.refresh_at {
                    return Ok(token.access_token.clone());
                }
                debug!("Access token is about to expire");
            }
        }
        self.refresh().await
    }

    async fn refresh(&self) -> Result<String, AuthError> {
        self.check_credentials()?;
        info!("Refreshing access token...");

        let form = [
            ("grant_type", "refresh_token"),
            ("client_id", self.credentials.client_id.as_str()),
            ("client_secret", self.credentials.client_secret.as_str()),
            ("refresh_token", self.credentials.refresh_token.as_str()),
        ];

        let response = self
            .http
            .post(&self.credentials.token_url)
            .form(&form)
            .send()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| AuthError::Unavailable(e.to_string()))?;

        if !status.is_success() {
            error!("Token request failed: {} - {}", status, body);
            return Err(match status.as_u16() {
                400 | 401 | 403 => AuthError::InvalidCredentials(body),
                _ => AuthError::Unavailable(format!("HTTP {}: {}", status, body)),
            });
        }

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| AuthError::Unavailable(format!("invalid token response: {}", e)))?;

        let expires_in = token.expires_in.unwrap_or(DEFAULT_EXPIRES_IN_SECS);
        let lifetime = Duration::from_secs(expires_in).saturating_sub(REFRESH_MARGIN);

        *self.cached.write().await = Some(CachedToken {
            access_token: token.access_token.clone(),
            refresh_at: Instant::now() + lifetime,
        });
        info!("Token refreshed, expires in {}s", expires_in);

        Ok(token.access_token)
    }
}
