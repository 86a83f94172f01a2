//! Error types for the `meridian-registry` crate.
//!
//! Every fallible registry operation returns [`RegistryError`] and fails
//! before mutating anything.

/// Errors raised by entity collection operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A required argument was missing or empty.
    #[error("{name} is required")]
    InvalidArgument {
        /// Name of the missing argument.
        name: &'static str,
    },

    /// An entity with the same id is already a member of the collection.
    #[error("an entity with id {id} already exists in this collection")]
    DuplicateIdentifier {
        /// The conflicting entity id.
        id: String,
    },

    /// The call is not valid in the collection's current state.
    #[error("invalid operation: {reason}")]
    InvalidOperation {
        /// Explanation of what was wrong.
        reason: &'static str,
    },
}
