use chrono::{DateTime, Duration, Utc};

use crate::model::{Observation, location_key};

/// Span during which a location counts as already covered, in minutes.
pub const DEFAULT_DEDUP_WINDOW_MINUTES: i64 = 120;

/// Decides whether a location needs a fresh observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DedupPolicy {
    pub window: Duration,
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self { window: Duration::minutes(DEFAULT_DEDUP_WINDOW_MINUTES) }
    }
}

impl DedupPolicy {
    pub fn new(window: Duration) -> Self {
        Self { window }
    }

    /// True iff `history` holds an observation for `location` (case-insensitive)
    /// taken in `(at_time - window, at_time]`.
    pub fn is_recently_logged(
        &self,
        history: &[Observation],
        location: &str,
        at_time: DateTime<Utc>,
    ) -> bool {
        let key = location_key(location);
        let since = at_time.checked_sub_signed(self.window);

        history.iter().any(|obs| {
            obs.location_key() == key
                && since.is_none_or(|since| obs.observed_at_utc > since)
                && obs.observed_at_utc <= at_time
        })
    }
}
