//! Parameter validation helpers
//!
//! Pure, stateless, and advisory: each function logs context and returns
//! a pass/fail flag, never an error. The bridge answers a failed check
//! with the response type's empty value, because the terminal itself
//! treats these inputs as "no data" conditions.

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// A date bound given either as integer epoch seconds or as a
/// timestamp-like value.
#[derive(Debug, Clone, Copy)]
pub enum TimeBound {
    Epoch(i64),
    Timestamp(DateTime<Utc>),
}

impl TimeBound {
    pub fn epoch_seconds(self) -> i64 {
        match self {
            TimeBound::Epoch(s) => s,
            TimeBound::Timestamp(ts) => ts.timestamp(),
        }
    }
}

impl From<i64> for TimeBound {
    fn from(s: i64) -> Self {
        TimeBound::Epoch(s)
    }
}

impl From<DateTime<Utc>> for TimeBound {
    fn from(ts: DateTime<Utc>) -> Self {
        TimeBound::Timestamp(ts)
    }
}

/// A symbol must be non-empty and non-blank.
pub fn validate_symbol(symbol: &str, func: &str) -> bool {
    if symbol.trim().is_empty() {
        debug!("{func}: empty symbol");
        return false;
    }
    true
}

/// A bar/tick count must be positive.
pub fn validate_count(count: i64, func: &str) -> bool {
    if count <= 0 {
        warn!("{func}: invalid count={count}");
        return false;
    }
    true
}

/// Both bounds are normalized to epoch seconds; the range is valid when
/// `from <= to` (equal bounds pass).
pub fn validate_date_range(
    date_from: impl Into<TimeBound>,
    date_to: impl Into<TimeBound>,
    func: &str,
) -> bool {
    let from = date_from.into().epoch_seconds();
    let to = date_to.into().epoch_seconds();
    if from > to {
        warn!("{func}: invalid range from={from} > to={to}");
        return false;
    }
    true
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn symbol_rejects_empty_and_blank() {
        assert!(!validate_symbol("", "test"));
        assert!(!validate_symbol("   ", "test"));
        assert!(validate_symbol("EURUSD", "test"));
    }

    #[test]
    fn count_must_be_positive() {
        assert!(!validate_count(0, "test"));
        assert!(!validate_count(-5, "test"));
        assert!(validate_count(1, "test"));
    }

    #[test]
    fn date_range_ordering() {
        assert!(!validate_date_range(10, 5, "test"));
        assert!(validate_date_range(5, 10, "test"));
        // Equal bounds are a valid (empty) range.
        assert!(validate_date_range(5, 5, "test"));
    }

    #[test]
    fn date_range_accepts_timestamps() {
        let from = Utc.timestamp_opt(1_600_000_000, 0).unwrap();
        let to = Utc.timestamp_opt(1_700_000_000, 0).unwrap();
        assert!(validate_date_range(from, to, "test"));
        assert!(!validate_date_range(to, from, "test"));
        // Mixed epoch/timestamp bounds normalize to the same clock.
        assert!(validate_date_range(1_600_000_000, to, "test"));
    }
}
