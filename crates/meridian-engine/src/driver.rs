//! Frame-by-frame driver for a data source.
//!
//! Each frame advances the simulated time according to the source's clock,
//! lets the source update itself, and reports how many entities are visible
//! at that time. The driver is synchronous; `main` paces it with a tokio
//! interval.

use std::rc::Rc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use meridian_source::{DataSource, DataSourceClock};

/// What one frame produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameReport {
    /// Zero-based frame number.
    pub frame: u64,
    /// Simulated time the frame was rendered at.
    pub time: DateTime<Utc>,
    /// Whether the source reported itself ready.
    pub ready: bool,
    /// Entities both showing and available at `time`.
    pub visible: usize,
}

/// Drives one data source through successive frames.
pub struct FrameDriver {
    source: Rc<dyn DataSource>,
    clock: DataSourceClock,
    current: DateTime<Utc>,
    frame: u64,
}

impl FrameDriver {
    /// Start driving `source`.
    ///
    /// The source's own clock is used where it is set; `fallback` fills the
    /// gaps, and the clock's current time (or `now`) is the first frame time.
    pub fn new(source: Rc<dyn DataSource>, fallback: &DataSourceClock, now: DateTime<Utc>) -> Self {
        let mut clock = source.clock().unwrap_or_default();
        clock.merge(fallback);
        if !clock.is_complete() {
            warn!(source = %source.id(), "data source clock is incomplete, unset fields use defaults");
        }
        let current = clock.current_time.or(clock.start_time).unwrap_or(now);
        Self {
            source,
            clock,
            current,
            frame: 0,
        }
    }

    /// The clock in effect.
    pub const fn clock(&self) -> &DataSourceClock {
        &self.clock
    }

    /// Simulated time of the next frame.
    pub const fn current_time(&self) -> DateTime<Utc> {
        self.current
    }

    /// Render one frame at the current time, then advance the clock.
    pub fn step(&mut self, elapsed_seconds: f64, now: DateTime<Utc>) -> FrameReport {
        let time = self.current;
        let ready = self.source.update(time);
        let visible = self
            .source
            .entities()
            .values()
            .iter()
            .filter(|entity| entity.is_showing() && entity.is_available(time))
            .count();

        let report = FrameReport {
            frame: self.frame,
            time,
            ready,
            visible,
        };
        debug!(
            source = %self.source.id(),
            frame = report.frame,
            time = %report.time,
            ready,
            visible,
            "frame rendered"
        );

        self.frame = self.frame.saturating_add(1);
        self.current = self.clock.tick(self.current, elapsed_seconds, now);
        report
    }
}
