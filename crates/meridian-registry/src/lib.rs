//! Observable entity registry for Meridian.
//!
//! This crate keeps a set of uniquely identified [`Entity`] objects and tells
//! interested parties what changed. Mutations made while events are
//! suspended are coalesced into a single [`CollectionChanged`] notification
//! carrying the net added, removed, and changed members.
//!
//! # Modules
//!
//! - [`index`] -- [`OrderedUniqueIndex`], the insertion-ordered id map
//!   backing live membership and the pending change sets.
//! - [`coalescer`] -- Pending change bookkeeping ([`PendingChanges`]) and the
//!   suspend/resume/refire flush discipline ([`ChangeCoalescer`]).
//! - [`entity`] -- [`Entity`] handles, their options, and the
//!   `definition_changed` payload.
//! - [`collection`] -- [`EntityCollection`] CRUD, visibility propagation,
//!   and availability aggregation.
//! - [`error`] -- Error types for registry operations.

pub mod coalescer;
pub mod collection;
pub mod entity;
pub mod error;
pub mod index;

// Re-export primary types at crate root.
pub use coalescer::{ChangeCoalescer, ChangeSet, FlushTarget, PendingChanges};
pub use collection::{CollectionChanged, EntityCollection, SuspendGuard, WeakEntityCollection};
pub use entity::{DefinitionChanged, Entity, EntityInput, EntityOptions, IS_SHOWING};
pub use error::RegistryError;
pub use index::OrderedUniqueIndex;
