use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};

/// Millisecond wall-clock timestamp.
///
/// Capture events, version entries, and call intervals are all stamped with
/// a `Timestamp`. The representation is milliseconds since the UNIX epoch,
/// which keeps records `Copy` and totally ordered; conversion to a calendar
/// datetime is available for display.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp {
    millis: i64,
}

impl Timestamp {
    /// The current wall-clock time.
    pub fn now() -> Self {
        Self {
            millis: Utc::now().timestamp_millis(),
        }
    }

    /// Create from milliseconds since the UNIX epoch.
    pub const fn from_millis(millis: i64) -> Self {
        Self { millis }
    }

    /// The epoch timestamp (zero).
    pub const fn zero() -> Self {
        Self { millis: 0 }
    }

    /// Milliseconds since the UNIX epoch.
    pub const fn as_millis(&self) -> i64 {
        self.millis
    }

    /// Returns `true` if this timestamp is strictly after `other`.
    pub fn is_after(&self, other: &Self) -> bool {
        self > other
    }

    /// Returns `true` if this timestamp is strictly before `other`.
    pub fn is_before(&self, other: &Self) -> bool {
        self < other
    }

    /// Convert to a UTC datetime. Returns `None` for out-of-range values.
    pub fn to_datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.millis).single()
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Timestamp({}ms)", self.millis)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_datetime() {
            Some(dt) => write!(f, "{}", dt.to_rfc3339()),
            None => write!(f, "{}ms", self.millis),
        }
    }
}
