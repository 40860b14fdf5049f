//! Candle interval arithmetic

use std::time::Duration;

use crate::error::EngineError;

/// Intervals offered by the market-data venue
pub const SUPPORTED_INTERVALS: [&str; 14] = [
    "1m", "3m", "5m", "15m", "30m", "1h", "2h", "4h", "8h", "12h", "1d", "3d", "1w", "1M",
];

/// Live polling runs this many times per candle interval.
pub const POLLS_PER_INTERVAL: u32 = 5;

/// Duration of one of the [`SUPPORTED_INTERVALS`] (e.g., "5m", "1h", "1M").
///
/// Lower-case `m` is minutes, upper-case `M` is a 30-day month. Anything
/// outside the supported table is `None`, even when it parses.
pub fn interval_duration(interval: &str) -> Option<Duration> {
    if !SUPPORTED_INTERVALS.contains(&interval) {
        return None;
    }
    let unit = interval.chars().last()?;
    let amount: u64 = interval[..interval.len() - unit.len_utf8()].parse().ok()?;
    if amount == 0 {
        return None;
    }

    let unit_secs = match unit {
        'm' => 60,
        'h' => 3_600,
        'd' => 86_400,
        'w' => 604_800,
        'M' => 2_592_000,
        _ => return None,
    };

    Some(Duration::from_secs(amount * unit_secs))
}

/// Same as [`interval_duration`] but reports an unknown interval as a parameter error.
pub fn require_interval(interval: &str) -> Result<Duration, EngineError> {
    interval_duration(interval).ok_or_else(|| {
        EngineError::invalid_parameter("interval", format!("unsupported interval {interval:?}"))
    })
}

/// Live poll cadence for an interval: one fifth of the candle duration.
pub fn poll_period(interval: &str) -> Result<Duration, EngineError> {
    Ok(require_interval(interval)? / POLLS_PER_INTERVAL)
}

/// Interval length in milliseconds, saturating for absurd values
pub fn interval_millis(interval: &str) -> Option<i64> {
    interval_duration(interval).map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
}
