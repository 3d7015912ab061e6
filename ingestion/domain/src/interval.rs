use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BarUnit {
    #[default]
    Minute,
    Daily,
}

impl BarUnit {
    /// Value of the `unit` query parameter.
    pub fn as_str(&self) -> &'static str {
        match self {
            BarUnit::Minute => "Minute",
            BarUnit::Daily => "Daily",
        }
    }
}

impl FromStr for BarUnit {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "minute" => Ok(BarUnit::Minute),
            "daily" => Ok(BarUnit::Daily),
            other => Err(format!(
                "Invalid bar unit: '{}'. Must be one of: 'Minute', 'Daily'",
                other
            )),
        }
    }
}

/// Bar size as requested from the API, e.g. 1 Minute or 5 Minute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BarInterval {
    value: u32,
    unit: BarUnit,
}

impl BarInterval {
    pub fn new(value: u32, unit: BarUnit) -> Self {
        Self {
            value: value.max(1),
            unit,
        }
    }

    pub fn minutes(value: u32) -> Self {
        Self::new(value, BarUnit::Minute)
    }

    pub fn value(&self) -> u32 {
        self.value
    }

    pub fn unit(&self) -> BarUnit {
        self.unit
    }

    pub fn duration(&self) -> Duration {
        match self.unit {
            BarUnit::Minute => Duration::minutes(i64::from(self.value)),
            BarUnit::Daily => Duration::days(i64::from(self.value)),
        }
    }

    /// Time covered by `bars` consecutive bars, `None` if it does not fit a `Duration`.
    pub fn span(&self, bars: u32) -> Option<Duration> {
        self.duration()
            .num_seconds()
            .checked_mul(i64::from(bars.max(1)))
            .and_then(Duration::try_seconds)
    }
}

impl Default for BarInterval {
    fn default() -> Self {
        Self::minutes(1)
    }
}

impl fmt::Display for BarInterval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.value, self.unit.as_str())
    }
}
