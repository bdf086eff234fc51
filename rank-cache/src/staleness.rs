use chrono::{DateTime, TimeDelta, Utc};

/// Cached per-player data older than this is refreshed from upstream.
pub const STALENESS_WINDOW: TimeDelta = TimeDelta::minutes(5);

/// Whether a player last synchronized at `last_synchronized` needs a refresh now.
pub fn is_stale(last_synchronized: Option<DateTime<Utc>>) -> bool {
    is_stale_at(last_synchronized, Utc::now())
}

/// Same as [`is_stale`] with an explicit clock. A player that was never
/// synchronized is always stale, and so is a timestamp further than the window
/// in the future.
pub fn is_stale_at(last_synchronized: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last_synchronized {
        None => true,
        Some(at) => (now - at).abs() > STALENESS_WINDOW,
    }
}
