//! Collection listener that logs every batched change.
//!
//! The engine has no renderer; [`ChangeLogger`] stands in for one. It
//! subscribes to a collection's `collection_changed` event, logs each batch,
//! and keeps running totals for the shutdown summary.

use std::cell::Cell;
use std::rc::Rc;

use meridian_events::ListenerId;
use meridian_registry::{CollectionChanged, EntityCollection};
use tracing::{debug, info};

/// Running totals over every batch seen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeTotals {
    /// Notifications received.
    pub batches: u64,
    /// Entities reported as added.
    pub added: u64,
    /// Entities reported as removed.
    pub removed: u64,
    /// Entities reported as changed.
    pub changed: u64,
}

/// Listener that bridges collection notifications to the log.
#[derive(Debug, Default)]
pub struct ChangeLogger {
    totals: Cell<ChangeTotals>,
}

impl ChangeLogger {
    /// Create a logger with zeroed totals.
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Subscribe to `collection`.
    pub fn attach(self: &Rc<Self>, collection: &EntityCollection) -> ListenerId {
        let logger = Rc::clone(self);
        let listener = collection
            .collection_changed()
            .add_listener(move |event: &CollectionChanged| logger.on_collection_changed(event));
        debug!(collection = %collection.id(), %listener, "change logger attached");
        listener
    }

    /// Totals so far.
    pub fn totals(&self) -> ChangeTotals {
        self.totals.get()
    }

    fn on_collection_changed(&self, event: &CollectionChanged) {
        let mut totals = self.totals.get();
        totals.batches = totals.batches.saturating_add(1);
        totals.added = totals.added.saturating_add(event.added.len() as u64);
        totals.removed = totals.removed.saturating_add(event.removed.len() as u64);
        totals.changed = totals.changed.saturating_add(event.changed.len() as u64);
        self.totals.set(totals);

        info!(
            collection = %event.collection.id(),
            batch = totals.batches,
            added = event.added.len(),
            removed = event.removed.len(),
            changed = event.changed.len(),
            members = event.collection.len(),
            "collection changed"
        );
        for entity in &event.added {
            debug!(entity = entity.id(), name = ?entity.name(), "entity added");
        }
        for entity in &event.removed {
            debug!(entity = entity.id(), "entity removed");
        }
    }
}
