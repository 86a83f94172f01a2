//! Enumeration types shared by data-source clocks.

use serde::{Deserialize, Serialize};

/// Behaviour of a clock when it reaches the end of its range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockRange {
    /// Time keeps advancing past the start and stop times.
    #[default]
    Unbounded,
    /// Time stops at the stop time (or start time when running backwards).
    Clamped,
    /// Time wraps back to the start time after reaching the stop time.
    LoopStop,
}

/// How a clock advances on each frame tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClockStep {
    /// Advance by a fixed multiplier-sized step per tick, regardless of wall time.
    TickDependent,
    /// Advance by elapsed wall time scaled by the multiplier.
    #[default]
    SystemClockMultiplier,
    /// Track wall-clock time exactly.
    SystemClock,
}
