//! Synchronous observer registration and fan-out for Meridian.
//!
//! Every notification source in the workspace -- an entity's definition
//! changes, a collection's batched membership changes, a data source's
//! loading transitions -- is an [`Event`]. Listeners are registered with
//! [`Event::add_listener`], removed with [`Event::remove_listener`], and
//! invoked in registration order by [`Event::raise`].
//!
//! # Reentrancy
//!
//! No internal borrow is held while a listener runs. A listener may add or
//! remove listeners on the event that is currently raising, or raise other
//! events, without panicking:
//!
//! - listeners added during a raise are first invoked by the *next* raise;
//! - listeners removed during a raise are skipped if they have not run yet.
//!
//! Events are single-threaded (`!Send`); Meridian's registry runs entirely on
//! one thread.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

/// Handle returned by [`Event::add_listener`], used to unregister.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(u64);

impl ListenerId {
    /// Return the raw sequence number of this listener.
    pub const fn into_inner(self) -> u64 {
        self.0
    }
}

impl core::fmt::Display for ListenerId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "listener#{}", self.0)
    }
}

type Listener<A> = Rc<dyn Fn(&A)>;

/// A notification source carrying payloads of type `A`.
pub struct Event<A> {
    /// Registered listeners in registration order.
    listeners: RefCell<Vec<(ListenerId, Listener<A>)>>,
    /// Sequence number handed to the next registered listener.
    next_id: Cell<u64>,
}

impl<A> Event<A> {
    /// Create an event with no listeners.
    pub const fn new() -> Self {
        Self {
            listeners: RefCell::new(Vec::new()),
            next_id: Cell::new(0),
        }
    }

    /// Register a listener and return the handle needed to remove it.
    pub fn add_listener<F>(&self, listener: F) -> ListenerId
    where
        F: Fn(&A) + 'static,
    {
        let id = ListenerId(self.next_id.get());
        self.next_id.set(self.next_id.get().wrapping_add(1));
        self.listeners.borrow_mut().push((id, Rc::new(listener)));
        id
    }

    /// Unregister a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.borrow_mut();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    /// Whether the listener behind `id` is still registered.
    pub fn has_listener(&self, id: ListenerId) -> bool {
        self.listeners
            .borrow()
            .iter()
            .any(|(existing, _)| *existing == id)
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.borrow().len()
    }

    /// Invoke every registered listener with `args`, in registration order.
    ///
    /// Returns the number of listeners that were invoked.
    pub fn raise(&self, args: &A) -> usize {
        let snapshot: Vec<(ListenerId, Listener<A>)> = self.listeners.borrow().clone();
        let mut invoked = 0usize;
        for (id, listener) in snapshot {
            // Removed by an earlier listener in this same raise.
            if !self.has_listener(id) {
                continue;
            }
            listener(args);
            invoked = invoked.saturating_add(1);
        }
        trace!(invoked, "event raised");
        invoked
    }
}

impl<A> Default for Event<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> core::fmt::Debug for Event<A> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Event")
            .field("listeners", &self.listener_count())
            .finish()
    }
}
