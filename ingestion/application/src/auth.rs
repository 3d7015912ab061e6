use async_trait::async_trait;
use shaku::Interface;

/// Source of bearer tokens for the market data API.
#[async_trait]
pub trait TokenProvider: Interface {
    /// Returns a token that is valid now, refreshing it first if it expired.
    async fn get_token(&self) -> Result<String, AuthError>;

    /// Discards the cached token and obtains a new one.
    async fn refresh(&self) -> Result<String, AuthError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("Credentials rejected by token endpoint: {0}")]
    InvalidCredentials(String),

    #[error("Token endpoint unavailable: {0}")]
    Unavailable(String),

    #[error("Still unauthorized after refreshing the access token")]
    RefreshIneffective,
}
