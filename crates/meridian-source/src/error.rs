//! Error types for the `meridian-source` crate.

use meridian_registry::RegistryError;

/// Errors raised while loading or driving a data source.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// The underlying entity collection rejected an operation.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// One record of a batch load could not be added.
    #[error("record {index} was rejected: {source}")]
    Record {
        /// Position of the record within the batch.
        index: usize,
        /// Why the collection refused it.
        source: RegistryError,
    },
}
