//! Clock settings suggested by a data source.
//!
//! A [`DataSourceClock`] is a partial description: every field is optional
//! and a consumer fills the gaps from its own clock (see
//! [`DataSourceClock::merge`]). [`DataSourceClock::from_availability`]
//! derives a looping clock from a collection's availability, and
//! [`DataSourceClock::tick`] advances a current time by one frame.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use meridian_types::{ClockRange, ClockStep, TimeInterval};

/// Playback span used when deriving a multiplier: a whole availability
/// interval plays back in this many wall-clock seconds.
pub const DEFAULT_PLAYBACK_SECONDS: f64 = 300.0;

/// Lower bound of a derived multiplier.
pub const MIN_MULTIPLIER: f64 = 1.0;

/// Upper bound of a derived multiplier (about one year per second).
pub const MAX_MULTIPLIER: f64 = 31_556_900.0;

/// Partial clock configuration published by a data source.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSourceClock {
    /// First instant of the clock range.
    pub start_time: Option<DateTime<Utc>>,
    /// Last instant of the clock range.
    pub stop_time: Option<DateTime<Utc>>,
    /// Instant the clock should show initially.
    pub current_time: Option<DateTime<Utc>>,
    /// Behaviour at the end of the range.
    pub clock_range: Option<ClockRange>,
    /// How time advances per tick.
    pub clock_step: Option<ClockStep>,
    /// Simulated seconds per tick or per wall-clock second.
    pub multiplier: Option<f64>,
}

impl DataSourceClock {
    /// Derive a clock that loops over `availability`.
    ///
    /// Returns `None` when either side of the interval is unbounded.
    pub fn from_availability(availability: &TimeInterval) -> Option<Self> {
        let span = availability.duration_seconds()?;
        let multiplier = (span / DEFAULT_PLAYBACK_SECONDS)
            .clamp(MIN_MULTIPLIER, MAX_MULTIPLIER)
            .round();
        Some(Self {
            start_time: Some(availability.start),
            stop_time: Some(availability.stop),
            current_time: Some(availability.start),
            clock_range: Some(ClockRange::LoopStop),
            clock_step: Some(ClockStep::SystemClockMultiplier),
            multiplier: Some(multiplier),
        })
    }

    /// Fill every unset field of `self` from `other`.
    pub fn merge(&mut self, other: &Self) {
        self.start_time = self.start_time.or(other.start_time);
        self.stop_time = self.stop_time.or(other.stop_time);
        self.current_time = self.current_time.or(other.current_time);
        self.clock_range = self.clock_range.or(other.clock_range);
        self.clock_step = self.clock_step.or(other.clock_step);
        self.multiplier = self.multiplier.or(other.multiplier);
    }

    /// Whether every field is set.
    pub const fn is_complete(&self) -> bool {
        self.start_time.is_some()
            && self.stop_time.is_some()
            && self.current_time.is_some()
            && self.clock_range.is_some()
            && self.clock_step.is_some()
            && self.multiplier.is_some()
    }

    /// Advance `current` by one tick.
    ///
    /// `elapsed_seconds` is the wall-clock time since the previous tick and
    /// `now` the current wall-clock instant. The result is kept inside
    /// `[start_time, stop_time]` according to `clock_range`.
    pub fn tick(
        &self,
        current: DateTime<Utc>,
        elapsed_seconds: f64,
        now: DateTime<Utc>,
    ) -> DateTime<Utc> {
        let multiplier = self.multiplier.unwrap_or(MIN_MULTIPLIER);
        let next = match self.clock_step.unwrap_or_default() {
            ClockStep::SystemClock => now,
            ClockStep::TickDependent => add_seconds(current, multiplier),
            ClockStep::SystemClockMultiplier => add_seconds(current, multiplier * elapsed_seconds),
        };
        self.constrain(next)
    }

    fn constrain(&self, time: DateTime<Utc>) -> DateTime<Utc> {
        let (Some(start), Some(stop)) = (self.start_time, self.stop_time) else {
            return time;
        };
        match self.clock_range.unwrap_or_default() {
            ClockRange::Unbounded => time,
            ClockRange::Clamped => time.clamp(start, stop.max(start)),
            ClockRange::LoopStop => {
                if time < start || time > stop {
                    start
                } else {
                    time
                }
            }
        }
    }
}

/// Add fractional seconds, saturating at the representable range.
#[allow(clippy::cast_possible_truncation)]
fn add_seconds(time: DateTime<Utc>, seconds: f64) -> DateTime<Utc> {
    let millis = (seconds * 1000.0).round();
    if !millis.is_finite() {
        return time;
    }
    TimeDelta::try_milliseconds(millis as i64)
        .and_then(|delta| time.checked_add_signed(delta))
        .unwrap_or(if millis.is_sign_negative() {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0)
            .single()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    #[test]
    fn availability_clock_loops_over_interval() {
        // One hour plays back in five minutes.
        let interval = TimeInterval::new(at(0), at(3600));
        let Some(clock) = DataSourceClock::from_availability(&interval) else {
            panic!("bounded interval should yield a clock");
        };
        assert_eq!(clock.start_time, Some(at(0)));
        assert_eq!(clock.stop_time, Some(at(3600)));
        assert_eq!(clock.current_time, Some(at(0)));
        assert_eq!(clock.clock_range, Some(ClockRange::LoopStop));
        assert_eq!(clock.clock_step, Some(ClockStep::SystemClockMultiplier));
        assert_eq!(clock.multiplier, Some(12.0));
        assert!(clock.is_complete());
    }

    #[test]
    fn short_interval_clamps_multiplier_to_one() {
        let interval = TimeInterval::new(at(0), at(10));
        let clock = DataSourceClock::from_availability(&interval);
        assert_eq!(clock.and_then(|c| c.multiplier), Some(MIN_MULTIPLIER));
    }

    #[test]
    fn unbounded_interval_has_no_clock() {
        assert!(DataSourceClock::from_availability(&TimeInterval::INFINITE).is_none());
        let half = TimeInterval::new(at(0), meridian_types::MAXIMUM_VALUE);
        assert!(DataSourceClock::from_availability(&half).is_none());
    }

    #[test]
    fn merge_only_fills_gaps() {
        let mut clock = DataSourceClock {
            multiplier: Some(5.0),
            ..DataSourceClock::default()
        };
        let fallback = DataSourceClock {
            multiplier: Some(60.0),
            clock_range: Some(ClockRange::Clamped),
            ..DataSourceClock::default()
        };
        clock.merge(&fallback);
        assert_eq!(clock.multiplier, Some(5.0));
        assert_eq!(clock.clock_range, Some(ClockRange::Clamped));
        assert!(clock.start_time.is_none());
    }

    #[test]
    fn tick_dependent_advances_by_multiplier() {
        let clock = DataSourceClock {
            clock_step: Some(ClockStep::TickDependent),
            multiplier: Some(30.0),
            ..DataSourceClock::default()
        };
        assert_eq!(clock.tick(at(0), 0.5, at(999)), at(30));
    }

    #[test]
    fn loop_stop_wraps_to_start() {
        let clock = DataSourceClock {
            start_time: Some(at(100)),
            stop_time: Some(at(200)),
            clock_range: Some(ClockRange::LoopStop),
            clock_step: Some(ClockStep::SystemClockMultiplier),
            multiplier: Some(60.0),
            ..DataSourceClock::default()
        };
        assert_eq!(clock.tick(at(150), 0.5, at(0)), at(180));
        assert_eq!(clock.tick(at(180), 1.0, at(0)), at(100));
    }

    #[test]
    fn clamped_stops_at_stop_time() {
        let clock = DataSourceClock {
            start_time: Some(at(100)),
            stop_time: Some(at(200)),
            clock_range: Some(ClockRange::Clamped),
            clock_step: Some(ClockStep::TickDependent),
            multiplier: Some(500.0),
            ..DataSourceClock::default()
        };
        assert_eq!(clock.tick(at(150), 1.0, at(0)), at(200));
    }

    #[test]
    fn system_clock_tracks_wall_time() {
        let clock = DataSourceClock {
            clock_step: Some(ClockStep::SystemClock),
            ..DataSourceClock::default()
        };
        assert_eq!(clock.tick(at(0), 1.0, at(42)), at(42));
    }
}
