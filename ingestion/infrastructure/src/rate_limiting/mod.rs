pub mod interval;

pub use interval::{IntervalRateLimiter, IntervalRateLimiterParameters};
