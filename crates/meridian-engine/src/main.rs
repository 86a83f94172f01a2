//! Frame driver binary for the Meridian entity registry.
//!
//! This is the main entry point that wires a [`CustomDataSource`] to a
//! change logger and ticks it frame by frame. It loads configuration,
//! seeds the source's entity collection in one batch, derives a clock from
//! the collection's availability, and runs the frame loop.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `meridian-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the data source and attach the change logger
//! 4. Load seed entities as one batch
//! 5. Derive the clock from the collection's availability
//! 6. Run the frame loop
//! 7. Log the totals

mod change_logger;
mod config;
mod driver;
mod error;

use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use chrono::Utc;
use meridian_source::{
    CustomDataSource, DataSource, DataSourceClock, DataSourceFault, LoadingChanged,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::change_logger::ChangeLogger;
use crate::config::EngineConfig;
use crate::driver::FrameDriver;
use crate::error::EngineError;

/// Application entry point for the Meridian engine.
///
/// # Errors
///
/// Returns an error if configuration cannot be loaded or the seed entities
/// are rejected.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration.
    let config = load_config()?;

    // 2. Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    info!(
        source_name = config.source.name,
        frame_count = config.frames.count,
        interval_ms = config.frames.interval_ms,
        seed_entities = config.entities.len(),
        "meridian-engine starting"
    );

    // 3. Create the data source and its observers.
    let source = CustomDataSource::new(Some(config.source.name.clone()));
    source.set_show(config.source.show);
    source.set_clustering(config.source.clustering);

    let logger = ChangeLogger::new();
    logger.attach(source.entities());
    source
        .loading_event()
        .add_listener(|change: &LoadingChanged| {
            info!(source = %change.source, is_loading = change.is_loading, "loading state changed");
        });
    source.error_event().add_listener(|fault: &DataSourceFault| {
        warn!(source = %fault.source, error = %fault.error, "data source reported an error");
    });

    // 4. Load seed entities.
    let loaded = source.load(config.entities.clone()).map_err(EngineError::from)?;
    info!(loaded, "Seed entities loaded");

    // 5. Derive the clock.
    let availability = source.entities().compute_availability();
    match DataSourceClock::from_availability(&availability) {
        Some(clock) => {
            info!(
                start = ?clock.start_time,
                stop = ?clock.stop_time,
                multiplier = ?clock.multiplier,
                "Clock derived from availability"
            );
            source.set_clock(Some(clock));
        }
        None => info!("Availability is unbounded, clock follows wall time"),
    }

    // 6. Run the frame loop.
    let mut driver = FrameDriver::new(
        Rc::clone(&source) as Rc<dyn DataSource>,
        &DataSourceClock::default(),
        Utc::now(),
    );
    let mut interval = tokio::time::interval(Duration::from_millis(config.frames.interval_ms));
    let mut ready_frames = 0u64;
    let mut peak_visible = 0usize;
    for _ in 0..config.frames.count {
        interval.tick().await;
        let report = driver.step(config.frames.step_seconds, Utc::now());
        if report.ready {
            ready_frames = ready_frames.saturating_add(1);
        }
        peak_visible = peak_visible.max(report.visible);
    }

    // 7. Log results.
    let totals = logger.totals();
    info!(
        frames = config.frames.count,
        ready_frames,
        peak_visible,
        final_time = %driver.current_time(),
        multiplier = ?driver.clock().multiplier,
        batches = totals.batches,
        added = totals.added,
        removed = totals.removed,
        changed = totals.changed,
        "meridian-engine shutdown complete"
    );

    Ok(())
}

/// Load the engine configuration from `meridian-config.yaml`.
///
/// Looks for the config file relative to the current working directory.
fn load_config() -> Result<EngineConfig, EngineError> {
    let config_path = Path::new("meridian-config.yaml");
    if config_path.exists() {
        let config = EngineConfig::from_file(config_path)?;
        Ok(config)
    } else {
        let mut config = EngineConfig::default();
        config.logging.apply_env_overrides();
        Ok(config)
    }
}
