//! Time unit conversions.
//!
//! The canonical model expresses every position and duration in ticks of
//! 100 nanoseconds. Jellyfin speaks ticks natively; Plex speaks
//! milliseconds. All crossings between the two go through this module.

use std::time::Duration;

pub const TICKS_PER_MILLISECOND: i64 = 10_000;
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Plex milliseconds to canonical ticks.
pub fn from_millis(ms: i64) -> i64 {
    ms.saturating_mul(TICKS_PER_MILLISECOND)
}

/// Canonical ticks to Plex milliseconds, rounded to the nearest millisecond.
pub fn to_millis(ticks: i64) -> i64 {
    let half = TICKS_PER_MILLISECOND / 2;
    if ticks >= 0 {
        (ticks + half) / TICKS_PER_MILLISECOND
    } else {
        (ticks - half) / TICKS_PER_MILLISECOND
    }
}

/// Whole seconds, truncated. Used for offsets that protocols only accept in seconds.
pub fn to_seconds(ticks: i64) -> i64 {
    ticks / TICKS_PER_SECOND
}

pub fn from_duration(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos() / 100).unwrap_or(i64::MAX)
}

pub fn to_duration(ticks: i64) -> Duration {
    Duration::from_nanos(u64::try_from(ticks.max(0)).unwrap_or(0).saturating_mul(100))
}
