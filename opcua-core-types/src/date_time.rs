use std::fmt;

use chrono::{TimeZone, Utc};

/// The UTC wall-clock type used throughout the runtime.
pub type DateTimeUtc = chrono::DateTime<Utc>;

/// An OPC UA timestamp: 100 nanosecond intervals since 1601-01-01 (UTC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateTime {
    ticks: i64,
}

/// Offset between the windows epoch (1601) and the unix epoch (1970) in
/// 100ns ticks.
const EPOCH_DIFF_TICKS: i64 = 116_444_736_000_000_000;
const TICKS_PER_SECOND: i64 = 10_000_000;

impl DateTime {
    /// The current time.
    pub fn now() -> DateTime {
        DateTime::from(Utc::now())
    }

    /// The null timestamp (1601-01-01).
    pub fn null() -> DateTime {
        DateTime { ticks: 0 }
    }

    /// Whether this is the null timestamp.
    pub fn is_null(&self) -> bool {
        self.ticks == 0
    }

    /// Raw ticks since 1601-01-01.
    pub fn ticks(&self) -> i64 {
        self.ticks
    }

    /// Build from raw ticks since 1601-01-01.
    pub fn from_ticks(ticks: i64) -> DateTime {
        DateTime { ticks }
    }

    /// Convert to a chrono UTC timestamp. Saturates at the chrono range.
    pub fn as_chrono(&self) -> DateTimeUtc {
        let unix_ticks = self.ticks - EPOCH_DIFF_TICKS;
        let secs = unix_ticks.div_euclid(TICKS_PER_SECOND);
        let nanos = unix_ticks.rem_euclid(TICKS_PER_SECOND) * 100;
        Utc.timestamp_opt(secs, nanos as u32)
            .single()
            .unwrap_or_default()
    }
}

impl Default for DateTime {
    fn default() -> Self {
        DateTime::null()
    }
}

impl From<DateTimeUtc> for DateTime {
    fn from(value: DateTimeUtc) -> Self {
        let secs = value.timestamp();
        let nanos = value.timestamp_subsec_nanos() as i64;
        DateTime {
            ticks: secs * TICKS_PER_SECOND + nanos / 100 + EPOCH_DIFF_TICKS,
        }
    }
}

impl fmt::Display for DateTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_chrono().to_rfc3339())
    }
}
