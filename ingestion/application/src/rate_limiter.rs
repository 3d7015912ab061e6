use async_trait::async_trait;
use shaku::Interface;

/// Spaces outgoing API requests. Shared by every fetch of a run.
#[async_trait]
pub trait RateLimiter: Interface {
    async fn acquire(&self) -> Result<(), RateLimiterError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RateLimiterError {
    #[error("Rate limiter state is poisoned")]
    Poisoned,

    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}
