use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One OHLCV record. Prices are finite and non-negative.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    timestamp: DateTime<Utc>,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

impl Bar {
    pub fn new(
        timestamp: DateTime<Utc>,
        open: f64,
        high: f64,
        low: f64,
        close: f64,
        volume: u64,
    ) -> Result<Self, BarValidationError> {
        validate_price("open", open)?;
        validate_price("high", high)?;
        validate_price("low", low)?;
        validate_price("close", close)?;

        Ok(Self {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn open(&self) -> f64 {
        self.open
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn close(&self) -> f64 {
        self.close
    }

    pub fn volume(&self) -> u64 {
        self.volume
    }
}

fn validate_price(field: &'static str, value: f64) -> Result<(), BarValidationError> {
    if !value.is_finite() {
        return Err(BarValidationError::NonFinitePrice(field));
    }
    if value < 0.0 {
        return Err(BarValidationError::NegativePrice(field));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum BarValidationError {
    #[error("{0} price must be finite")]
    NonFinitePrice(&'static str),
    #[error("{0} price must not be negative")]
    NegativePrice(&'static str),
}
