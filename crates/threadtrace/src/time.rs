//! Absolute-time values for timed waits and lock-hold timing.
//!
//! Timed waits take an absolute deadline rather than a relative duration so
//! a caller retrying around spurious wakeups does not drift.

use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

const NANOS_PER_SEC: i64 = 1_000_000_000;
const NANOS_PER_MS: i64 = 1_000_000;

/// Represents a timespec value (seconds + nanoseconds) since the Unix epoch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timespec {
    /// Seconds.
    pub tv_sec: i64,
    /// Nanoseconds (0 to 999_999_999).
    pub tv_nsec: i64,
}

impl Timespec {
    /// Current wall-clock time.
    pub fn now() -> Self {
        let since_epoch = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO);
        Self {
            tv_sec: since_epoch.as_secs() as i64,
            tv_nsec: i64::from(since_epoch.subsec_nanos()),
        }
    }

    /// Returns this time offset forward by `ms` milliseconds, carrying
    /// nanosecond overflow into the seconds field.
    #[must_use]
    pub fn add_ms(self, ms: u64) -> Self {
        let mut tv_sec = self.tv_sec + (ms / 1000) as i64;
        let mut tv_nsec = self.tv_nsec + (ms % 1000) as i64 * NANOS_PER_MS;
        if tv_nsec >= NANOS_PER_SEC {
            tv_sec += 1;
            tv_nsec -= NANOS_PER_SEC;
        }
        Self { tv_sec, tv_nsec }
    }

    /// Whole milliseconds since the epoch.
    #[must_use]
    pub fn as_millis(&self) -> u64 {
        (self.tv_sec as u64).saturating_mul(1000) + (self.tv_nsec / NANOS_PER_MS) as u64
    }

    /// Convert this absolute time into a monotonic deadline for the
    /// platform condition primitive. A time already in the past converts to
    /// an already-elapsed deadline, so a wait against it times out
    /// immediately.
    pub(crate) fn to_deadline(self) -> Instant {
        let now = Self::now();
        let target = i128::from(self.tv_sec) * i128::from(NANOS_PER_SEC) + i128::from(self.tv_nsec);
        let current = i128::from(now.tv_sec) * i128::from(NANOS_PER_SEC) + i128::from(now.tv_nsec);
        let ahead = target - current;
        if ahead <= 0 {
            Instant::now()
        } else {
            Instant::now() + Duration::from_nanos(ahead.min(i128::from(u64::MAX)) as u64)
        }
    }
}
