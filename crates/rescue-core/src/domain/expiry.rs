//! Expiry - pickup deadline evaluation.
//!
//! Time left is always derived from `pickup_end` and the caller's `now`.
//! It is never written back onto the task.

use chrono::{DateTime, Duration, Utc};

/// Tasks with this much time or less left are urgent.
pub const URGENT_WINDOW: Duration = Duration::minutes(30);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeLeft {
    /// Whole seconds until `pickup_end`; zero or negative once expired.
    pub seconds_left: i64,
    pub expired: bool,
    pub urgent: bool,
}

impl TimeLeft {
    pub fn evaluate(pickup_end: DateTime<Utc>, now: DateTime<Utc>, urgent_within: Duration) -> Self {
        let left = pickup_end - now;
        let expired = pickup_end <= now;
        Self {
            seconds_left: left.num_seconds(),
            expired,
            urgent: !expired && left <= urgent_within,
        }
    }

    pub fn within(&self, window: Duration) -> bool {
        !self.expired && self.seconds_left < window.num_seconds()
    }
}

/// Remaining time using the default urgency window.
pub fn remaining(pickup_end: DateTime<Utc>, now: DateTime<Utc>) -> TimeLeft {
    TimeLeft::evaluate(pickup_end, now, URGENT_WINDOW)
}

pub fn is_expired(pickup_end: DateTime<Utc>, now: DateTime<Utc>) -> bool {
    pickup_end <= now
}
