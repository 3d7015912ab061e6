//! Decoding of `marketdata/barcharts` response bodies.
//!
//! The API reports numbers either as JSON numbers or as strings, e.g.
//! `{"Bars":[{"TimeStamp":"2024-01-05T14:31:00Z","Open":"4700.25",...,"TotalVolume":"812"}]}`.

use chrono::{DateTime, Utc};
use histbars_domain::{Bar, BarValidationError};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct BarChartPage {
    #[serde(rename = "Bars", default)]
    bars: Option<Vec<RawBar>>,
}

#[derive(Debug, Deserialize)]
struct RawBar {
    #[serde(rename = "TimeStamp")]
    timestamp: String,
    #[serde(rename = "Open")]
    open: Numeric,
    #[serde(rename = "High")]
    high: Numeric,
    #[serde(rename = "Low")]
    low: Numeric,
    #[serde(rename = "Close")]
    close: Numeric,
    #[serde(rename = "TotalVolume")]
    volume: Numeric,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(serde_json::Number),
    Text(String),
}

impl Numeric {
    fn to_f64(&self, field: &'static str) -> Result<f64, PayloadError> {
        let parsed = match self {
            Numeric::Number(n) => n.as_f64(),
            Numeric::Text(s) => s.trim().parse::<f64>().ok(),
        };
        parsed.ok_or_else(|| self.invalid(field))
    }

    fn to_u64(&self, field: &'static str) -> Result<u64, PayloadError> {
        let parsed = match self {
            Numeric::Number(n) => n.as_u64(),
            Numeric::Text(s) => s.trim().parse::<u64>().ok(),
        };
        parsed.ok_or_else(|| self.invalid(field))
    }

    fn invalid(&self, field: &'static str) -> PayloadError {
        let value = match self {
            Numeric::Number(n) => n.to_string(),
            Numeric::Text(s) => s.clone(),
        };
        PayloadError::InvalidNumber { field, value }
    }
}

/// Decodes one page in the order the server sent it.
pub fn parse_bar_page(body: &str) -> Result<Vec<Bar>, PayloadError> {
    let page: BarChartPage =
        serde_json::from_str(body).map_err(|e| PayloadError::InvalidJson(e.to_string()))?;

    page.bars
        .unwrap_or_default()
        .iter()
        .map(raw_to_bar)
        .collect()
}

fn raw_to_bar(raw: &RawBar) -> Result<Bar, PayloadError> {
    let timestamp = DateTime::parse_from_rfc3339(&raw.timestamp)
        .map_err(|_| PayloadError::InvalidTimestamp(raw.timestamp.clone()))?
        .with_timezone(&Utc);

    let bar = Bar::new(
        timestamp,
        raw.open.to_f64("Open")?,
        raw.high.to_f64("High")?,
        raw.low.to_f64("Low")?,
        raw.close.to_f64("Close")?,
        raw.volume.to_u64("TotalVolume")?,
    )?;
    Ok(bar)
}

#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    #[error("invalid JSON: {0}")]
    InvalidJson(String),

    #[error("invalid timestamp '{0}'")]
    InvalidTimestamp(String),

    #[error("invalid {field} value '{value}'")]
    InvalidNumber { field: &'static str, value: String },

    #[error("invalid bar: {0}")]
    InvalidBar(#[from] BarValidationError),
}
