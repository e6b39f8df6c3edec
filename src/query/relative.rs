//! Relative-time expression translation
//!
//! The time-partitioned store's query language expresses bounds as offsets
//! from the current instant (`ago(12h)`, `now()`) rather than absolute
//! values. Translating absolute request timestamps into these expressions
//! lets one query shape cover both past bounds and (degenerately) bounds at
//! or beyond the current instant, which the store cannot represent as
//! absolute future dates.

use std::fmt;

use crate::types::EpochMillis;

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

/// A timestamp expressed relative to the current instant
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelativeTime {
    /// The current instant (`now()`)
    Now,
    /// A whole number of hours before the current instant (`ago(Nh)`)
    HoursAgo(i64),
}

impl RelativeTime {
    /// Translate an absolute millisecond timestamp against `now`.
    ///
    /// Strictly-past timestamps become `ago(Nh)` with N rounded to the
    /// nearest hour; anything at or after `now` collapses to `now()`.
    pub fn from_absolute(timestamp_ms: EpochMillis, now_ms: EpochMillis) -> Self {
        if timestamp_ms < now_ms {
            let hours = ((now_ms - timestamp_ms) as f64 / MILLIS_PER_HOUR as f64).round() as i64;
            RelativeTime::HoursAgo(hours)
        } else {
            RelativeTime::Now
        }
    }

    /// Resolve back to an absolute millisecond timestamp against `now`
    pub fn resolve(&self, now_ms: EpochMillis) -> EpochMillis {
        match self {
            RelativeTime::Now => now_ms,
            RelativeTime::HoursAgo(hours) => now_ms - hours * MILLIS_PER_HOUR,
        }
    }
}

impl fmt::Display for RelativeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RelativeTime::Now => write!(f, "now()"),
            RelativeTime::HoursAgo(hours) => write!(f, "ago({hours}h)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: i64 = MILLIS_PER_HOUR;

    #[test]
    fn test_past_timestamp_rounds_to_hours() {
        let now = 1_700_000_000_000;
        assert_eq!(
            RelativeTime::from_absolute(now - 2 * HOUR, now),
            RelativeTime::HoursAgo(2)
        );
        // 90 minutes rounds up to 2 hours
        assert_eq!(
            RelativeTime::from_absolute(now - HOUR - HOUR / 2, now),
            RelativeTime::HoursAgo(2)
        );
        // 20 minutes rounds down to 0 hours
        assert_eq!(
            RelativeTime::from_absolute(now - HOUR / 3, now),
            RelativeTime::HoursAgo(0)
        );
    }

    #[test]
    fn test_now_and_future_collapse_to_now() {
        let now = 1_700_000_000_000;
        assert_eq!(RelativeTime::from_absolute(now, now), RelativeTime::Now);
        assert_eq!(
            RelativeTime::from_absolute(now + 5 * HOUR, now),
            RelativeTime::Now
        );
    }

    #[test]
    fn test_rendering() {
        assert_eq!(RelativeTime::Now.to_string(), "now()");
        assert_eq!(RelativeTime::HoursAgo(12).to_string(), "ago(12h)");
    }

    #[test]
    fn test_resolve_round_trip() {
        let now = 1_700_000_000_000;
        let exact = now - 7 * HOUR;
        let relative = RelativeTime::from_absolute(exact, now);
        assert_eq!(relative.resolve(now), exact);
    }
}
