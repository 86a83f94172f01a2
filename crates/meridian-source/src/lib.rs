//! Data sources for the Meridian entity registry.
//!
//! A data source owns one [`EntityCollection`](meridian_registry::EntityCollection)
//! and wraps it with a lifecycle: a name, a suggested clock, visibility,
//! clustering settings, and loading/changed/error notifications.
//!
//! # Modules
//!
//! - [`data_source`] -- The [`DataSource`] trait, its notification payloads,
//!   and [`set_loading`], the only sanctioned way to toggle loading.
//! - [`clock`] -- [`DataSourceClock`], partial clock settings and tick logic.
//! - [`clustering`] -- [`ClusteringOptions`] for renderers.
//! - [`custom`] -- [`CustomDataSource`], a source filled by the caller.
//! - [`error`] -- Error types for data source operations.

pub mod clock;
pub mod clustering;
pub mod custom;
pub mod data_source;
pub mod error;

// Re-export primary types at crate root.
pub use clock::DataSourceClock;
pub use clustering::ClusteringOptions;
pub use custom::CustomDataSource;
pub use data_source::{
    DataSource, DataSourceChanged, DataSourceFault, LoadingChanged, LoadingState, set_loading,
};
pub use error::SourceError;
