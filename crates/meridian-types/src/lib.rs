//! Shared type definitions for the Meridian entity registry.
//!
//! This crate holds the small value types every other Meridian crate agrees
//! on: strongly-typed identifiers, the time interval used for entity
//! availability, and the clock enumerations used by data sources.
//!
//! # Modules
//!
//! - [`ids`] -- Type-safe UUID wrappers for collection and source identifiers
//! - [`time`] -- [`TimeInterval`] and the infinite-past / infinite-future sentinels
//! - [`enums`] -- Clock range and clock step enumerations

pub mod enums;
pub mod ids;
pub mod time;

// Re-export all public types at crate root for convenience.
pub use enums::{ClockRange, ClockStep};
pub use ids::{CollectionId, SourceId};
pub use time::{MAXIMUM_VALUE, MINIMUM_VALUE, TimeInterval};
