//! Time intervals and the infinite-time sentinels.
//!
//! Instants are [`DateTime<Utc>`] throughout Meridian. The earliest and latest
//! representable instants double as "infinite past" and "infinite future":
//! an interval whose start is [`MINIMUM_VALUE`] is unbounded on the left, and
//! one whose stop is [`MAXIMUM_VALUE`] is unbounded on the right.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sentinel for the infinite past.
pub const MINIMUM_VALUE: DateTime<Utc> = DateTime::<Utc>::MIN_UTC;

/// Sentinel for the infinite future.
pub const MAXIMUM_VALUE: DateTime<Utc> = DateTime::<Utc>::MAX_UTC;

const fn included() -> bool {
    true
}

/// A span of time between two instants.
///
/// Both endpoints are included unless stated otherwise. An interval whose
/// stop precedes its start, or whose endpoints coincide without both being
/// included, is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeInterval {
    /// First instant of the interval.
    pub start: DateTime<Utc>,
    /// Last instant of the interval.
    pub stop: DateTime<Utc>,
    /// Whether `start` itself belongs to the interval.
    #[serde(default = "included")]
    pub is_start_included: bool,
    /// Whether `stop` itself belongs to the interval.
    #[serde(default = "included")]
    pub is_stop_included: bool,
}

impl TimeInterval {
    /// The interval covering all of time.
    pub const INFINITE: Self = Self::new(MINIMUM_VALUE, MAXIMUM_VALUE);

    /// Create a closed interval `[start, stop]`.
    pub const fn new(start: DateTime<Utc>, stop: DateTime<Utc>) -> Self {
        Self {
            start,
            stop,
            is_start_included: true,
            is_stop_included: true,
        }
    }

    /// Whether the interval contains no instant at all.
    pub fn is_empty(&self) -> bool {
        self.stop < self.start
            || (self.stop == self.start && !(self.is_start_included && self.is_stop_included))
    }

    /// Whether `time` falls within the interval, honouring endpoint inclusion.
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        if self.is_empty() {
            return false;
        }
        if time == self.start {
            return self.is_start_included;
        }
        if time == self.stop {
            return self.is_stop_included;
        }
        time > self.start && time < self.stop
    }

    /// Whether the start is an actual instant rather than the infinite past.
    pub fn is_start_bounded(&self) -> bool {
        self.start != MINIMUM_VALUE
    }

    /// Whether the stop is an actual instant rather than the infinite future.
    pub fn is_stop_bounded(&self) -> bool {
        self.stop != MAXIMUM_VALUE
    }

    /// Whether the interval is unbounded on both sides.
    pub fn is_infinite(&self) -> bool {
        !self.is_start_bounded() && !self.is_stop_bounded()
    }

    /// Length of the interval in seconds, or `None` if either side is
    /// unbounded.
    #[allow(clippy::cast_precision_loss)]
    pub fn duration_seconds(&self) -> Option<f64> {
        if !self.is_start_bounded() || !self.is_stop_bounded() {
            return None;
        }
        let delta = self.stop.signed_duration_since(self.start);
        let millis = delta.num_milliseconds();
        Some(millis as f64 / 1000.0)
    }
}

impl Default for TimeInterval {
    fn default() -> Self {
        Self::INFINITE
    }
}
