//! Error types for the Meridian engine binary.
//!
//! [`EngineError`] is the top-level error type that wraps all possible
//! failure modes during engine start-up and the frame loop.

/// Top-level error for the Meridian engine binary.
///
/// Each variant wraps a specific subsystem error, providing a single
/// error type that `main` can propagate with `?`.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Configuration loading failed.
    #[error("config error: {source}")]
    Config {
        /// The underlying config error.
        #[from]
        source: crate::config::ConfigError,
    },

    /// Loading or driving the data source failed.
    #[error("data source error: {source}")]
    Source {
        /// The underlying data source error.
        #[from]
        source: meridian_source::SourceError,
    },
}
