//! Pending change bookkeeping and the flush discipline.
//!
//! Mutations never notify observers directly. They record themselves in a
//! [`PendingChanges`] and then ask the [`ChangeCoalescer`] to flush. The
//! coalescer decides whether a flush may run now:
//!
//! - while events are suspended, pending changes keep accumulating;
//! - while a flush is already delivering, the request is remembered and the
//!   running flush loops once more after the current delivery returns;
//! - otherwise the pending sets are snapshotted, cleared, and delivered as
//!   one batch.
//!
//! # Cancellation rules
//!
//! Within one unflushed batch an add and a remove of the same id cancel out.
//! Observers never hear about an entity that was added and removed again
//! before a flush, and an entity removed then re-added is reported as
//! neither removed nor added. A removed entity is never also reported as
//! changed, and a freshly added entity is never reported as changed.

use std::cell::Cell;

use tracing::debug;

use crate::error::RegistryError;
use crate::index::OrderedUniqueIndex;

// ---------------------------------------------------------------------------
// Change sets
// ---------------------------------------------------------------------------

/// One flushed batch of membership changes, in the order they were recorded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSet<V> {
    /// Members that joined since the previous flush.
    pub added: Vec<V>,
    /// Members that left since the previous flush.
    pub removed: Vec<V>,
    /// Members that reported a definition change since the previous flush.
    pub changed: Vec<V>,
}

impl<V> ChangeSet<V> {
    /// Whether the batch carries nothing at all.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// The three pending sets of an unflushed batch.
#[derive(Debug, Clone)]
pub struct PendingChanges<V> {
    added: OrderedUniqueIndex<String, V>,
    removed: OrderedUniqueIndex<String, V>,
    changed: OrderedUniqueIndex<String, V>,
}

impl<V: Clone> PendingChanges<V> {
    /// Create empty pending sets.
    pub fn new() -> Self {
        Self {
            added: OrderedUniqueIndex::new(),
            removed: OrderedUniqueIndex::new(),
            changed: OrderedUniqueIndex::new(),
        }
    }

    /// Record that `id` joined the live set.
    ///
    /// A pending removal of the same id is cancelled instead.
    pub fn record_added(&mut self, id: &str, value: V) {
        if !self.removed.remove(id) {
            self.added.set(id.to_owned(), value);
        }
    }

    /// Record that `id` left the live set.
    ///
    /// A pending addition of the same id is cancelled instead; otherwise the
    /// id is recorded as removed and dropped from the changed set.
    pub fn record_removed(&mut self, id: &str, value: V) {
        if !self.added.remove(id) {
            self.removed.set(id.to_owned(), value);
            self.changed.remove(id);
        }
    }

    /// Record that the live member `id` changed its definition.
    ///
    /// Ignored while the member is still pending as added.
    pub fn record_changed(&mut self, id: &str, value: V) {
        if !self.added.contains(id) {
            self.changed.set(id.to_owned(), value);
        }
    }

    /// Record that every member in `live` left at once.
    ///
    /// Members still pending as added vanish without trace; the others are
    /// recorded as removed. The added and changed sets end up empty.
    pub fn record_cleared<'a, I>(&mut self, live: I)
    where
        I: IntoIterator<Item = (&'a String, &'a V)>,
        V: 'a,
    {
        for (id, value) in live {
            if !self.added.contains(id) {
                self.removed.set(id.clone(), value.clone());
            }
        }
        self.added.remove_all();
        self.changed.remove_all();
    }

    /// Whether `id` is pending as added.
    pub fn is_added(&self, id: &str) -> bool {
        self.added.contains(id)
    }

    /// Whether `id` is pending as removed.
    pub fn is_removed(&self, id: &str) -> bool {
        self.removed.contains(id)
    }

    /// Whether `id` is pending as changed.
    pub fn is_changed(&self, id: &str) -> bool {
        self.changed.contains(id)
    }

    /// Whether all three sets are empty.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Snapshot the three sets and clear them.
    pub fn take(&mut self) -> ChangeSet<V> {
        let batch = ChangeSet {
            added: self.added.to_vec(),
            removed: self.removed.to_vec(),
            changed: self.changed.to_vec(),
        };
        self.added.remove_all();
        self.removed.remove_all();
        self.changed.remove_all();
        batch
    }
}

impl<V: Clone> Default for PendingChanges<V> {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Flush discipline
// ---------------------------------------------------------------------------

/// The side of a flush that owns the pending sets and the listeners.
pub trait FlushTarget {
    /// The member type carried by delivered batches.
    type Item;

    /// Whether any change is waiting to be delivered.
    fn has_pending(&self) -> bool;

    /// Snapshot and clear the pending sets.
    ///
    /// Implementations must not hold any borrow past this call: delivery
    /// happens afterwards and may re-enter the target.
    fn take_pending(&self) -> ChangeSet<Self::Item>;

    /// Deliver one batch to every listener.
    fn deliver(&self, batch: ChangeSet<Self::Item>);
}

/// Suspension counter and reentrancy flags for one collection.
#[derive(Debug, Default)]
pub struct ChangeCoalescer {
    /// Outstanding [`suspend`](Self::suspend) calls.
    suspend_count: Cell<u32>,
    /// A flush loop is currently delivering.
    firing: Cell<bool>,
    /// New changes arrived while `firing`.
    refire: Cell<bool>,
}

/// Holds `firing` for the duration of a flush loop and clears it on drop,
/// including during unwinding out of a panicking listener.
struct FiringGuard<'a> {
    firing: &'a Cell<bool>,
}

impl<'a> FiringGuard<'a> {
    fn enter(firing: &'a Cell<bool>) -> Self {
        firing.set(true);
        Self { firing }
    }
}

impl Drop for FiringGuard<'_> {
    fn drop(&mut self) {
        self.firing.set(false);
    }
}

impl ChangeCoalescer {
    /// Create a coalescer with events enabled.
    pub const fn new() -> Self {
        Self {
            suspend_count: Cell::new(0),
            firing: Cell::new(false),
            refire: Cell::new(false),
        }
    }

    /// Number of outstanding suspensions.
    pub fn suspend_count(&self) -> u32 {
        self.suspend_count.get()
    }

    /// Whether flushing is currently disabled.
    pub fn is_suspended(&self) -> bool {
        self.suspend_count.get() > 0
    }

    /// Whether a flush loop is delivering right now.
    pub fn is_firing(&self) -> bool {
        self.firing.get()
    }

    /// Disable flushing until a matching [`resume`](Self::resume).
    pub fn suspend(&self) {
        self.suspend_count
            .set(self.suspend_count.get().saturating_add(1));
    }

    /// Undo one [`suspend`](Self::suspend), flushing if it was the last.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidOperation`] if there is no outstanding
    /// suspension.
    pub fn resume<T: FlushTarget + ?Sized>(&self, target: &T) -> Result<usize, RegistryError> {
        let Some(remaining) = self.suspend_count.get().checked_sub(1) else {
            return Err(RegistryError::InvalidOperation {
                reason: "resume_events can not be called before suspend_events",
            });
        };
        self.suspend_count.set(remaining);
        Ok(self.request_flush(target))
    }

    /// Flush pending changes if allowed. Returns the number of batches
    /// delivered by this call.
    pub fn request_flush<T: FlushTarget + ?Sized>(&self, target: &T) -> usize {
        if self.firing.get() {
            self.refire.set(true);
            return 0;
        }
        if self.is_suspended() || !target.has_pending() {
            return 0;
        }

        let _guard = FiringGuard::enter(&self.firing);
        let mut delivered = 0usize;
        loop {
            self.refire.set(false);
            let batch = target.take_pending();
            debug!(
                added = batch.added.len(),
                removed = batch.removed.len(),
                changed = batch.changed.len(),
                "flushing collection changes"
            );
            target.deliver(batch);
            delivered = delivered.saturating_add(1);

            if !self.refire.get() || self.is_suspended() || !target.has_pending() {
                break;
            }
        }
        delivered
    }
}
