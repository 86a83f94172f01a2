//! The observable entity collection.
//!
//! An [`EntityCollection`] owns the live set of member entities plus the
//! pending added/removed/changed sets of the current unflushed batch. Every
//! mutation updates those sets and then asks the collection's
//! [`ChangeCoalescer`] to flush; observers subscribe to
//! [`EntityCollection::collection_changed`] and receive one
//! [`CollectionChanged`] per flush.
//!
//! # Batching
//!
//! Wrap bulk work in [`suspend_events`](EntityCollection::suspend_events) /
//! [`resume_events`](EntityCollection::resume_events), or hold a
//! [`SuspendGuard`] from [`suspend_scope`](EntityCollection::suspend_scope),
//! and all changes made in between arrive as a single notification.
//!
//! # Reentrancy
//!
//! No borrow of collection state is held while listeners run, so both
//! `collection_changed` listeners and entity `definition_changed` listeners
//! may freely call back into the collection. Changes made from inside a
//! `collection_changed` listener are delivered in one extra notification
//! after the current one returns.
//!
//! # Ownership
//!
//! `EntityCollection` is a cheap, clonable handle. Members point back at the
//! collection through a weak link only; a listener that needs the collection
//! should capture [`downgrade`](EntityCollection::downgrade) rather than a
//! clone to avoid a reference cycle.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, trace, warn};

use meridian_events::{Event, ListenerId};
use meridian_types::{CollectionId, MAXIMUM_VALUE, MINIMUM_VALUE, TimeInterval};

use crate::coalescer::{ChangeCoalescer, ChangeSet, FlushTarget, PendingChanges};
use crate::entity::{Entity, EntityInput, IS_SHOWING};
use crate::error::RegistryError;
use crate::index::OrderedUniqueIndex;

/// Payload of [`EntityCollection::collection_changed`].
#[derive(Debug, Clone)]
pub struct CollectionChanged {
    /// The collection that flushed.
    pub collection: EntityCollection,
    /// Entities added since the previous notification.
    pub added: Vec<Entity>,
    /// Entities removed since the previous notification.
    pub removed: Vec<Entity>,
    /// Entities modified in place since the previous notification.
    pub changed: Vec<Entity>,
}

/// Membership state guarded by one `RefCell`.
#[derive(Default)]
struct Members {
    /// Current members in insertion order.
    live: OrderedUniqueIndex<String, Entity>,
    /// Unflushed added/removed/changed sets.
    pending: PendingChanges<Entity>,
    /// Our `definition_changed` subscription on each live member.
    listeners: HashMap<String, ListenerId>,
}

pub(crate) struct CollectionInner {
    id: CollectionId,
    owner: Option<Weak<dyn Any>>,
    show: Cell<bool>,
    members: RefCell<Members>,
    coalescer: ChangeCoalescer,
    collection_changed: Event<CollectionChanged>,
}

impl CollectionInner {
    pub(crate) fn show(&self) -> bool {
        self.show.get()
    }
}

/// An observable collection of uniquely identified entities.
#[derive(Clone)]
pub struct EntityCollection {
    inner: Rc<CollectionInner>,
}

/// Non-owning handle to an [`EntityCollection`].
#[derive(Clone, Default)]
pub struct WeakEntityCollection(Weak<CollectionInner>);

impl WeakEntityCollection {
    /// Recover the collection if it is still alive.
    pub fn upgrade(&self) -> Option<EntityCollection> {
        self.0.upgrade().map(EntityCollection::from_inner)
    }
}

impl core::fmt::Debug for WeakEntityCollection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_tuple("WeakEntityCollection")
            .field(&self.upgrade().map(|c| c.id()))
            .finish()
    }
}

/// Keeps a collection's events suspended until dropped.
///
/// Returned by [`EntityCollection::suspend_scope`]. Dropping the guard
/// performs the matching resume, which flushes if it was the outermost
/// suspension.
#[must_use = "events resume as soon as the guard is dropped"]
pub struct SuspendGuard<'a> {
    collection: &'a EntityCollection,
}

impl Drop for SuspendGuard<'_> {
    fn drop(&mut self) {
        if let Err(error) = self.collection.resume_events() {
            warn!(collection = %self.collection.id(), %error, "unbalanced resume from suspend guard");
        }
    }
}

impl EntityCollection {
    /// Create an empty collection with no owner.
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Create an empty collection remembering `owner` as its creator.
    ///
    /// The link is weak: the collection never keeps its owner alive.
    pub fn with_owner(owner: Weak<dyn Any>) -> Self {
        Self::build(Some(owner))
    }

    fn build(owner: Option<Weak<dyn Any>>) -> Self {
        let collection = Self {
            inner: Rc::new(CollectionInner {
                id: CollectionId::new(),
                owner,
                show: Cell::new(true),
                members: RefCell::new(Members::default()),
                coalescer: ChangeCoalescer::new(),
                collection_changed: Event::new(),
            }),
        };
        debug!(collection = %collection.id(), "entity collection created");
        collection
    }

    pub(crate) const fn from_inner(inner: Rc<CollectionInner>) -> Self {
        Self { inner }
    }

    /// Globally unique id of this collection.
    pub fn id(&self) -> CollectionId {
        self.inner.id
    }

    /// The creator of this collection, if it is still alive and is a `T`.
    pub fn owner<T: Any>(&self) -> Option<Rc<T>> {
        let owner = self.inner.owner.as_ref()?.upgrade()?;
        owner.downcast::<T>().ok()
    }

    /// Whether both handles refer to the same collection.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// A non-owning handle to this collection.
    pub fn downgrade(&self) -> WeakEntityCollection {
        WeakEntityCollection(Rc::downgrade(&self.inner))
    }

    /// Notification raised once per flush with the batched changes.
    pub fn collection_changed(&self) -> &Event<CollectionChanged> {
        &self.inner.collection_changed
    }

    /// Snapshot of the current members in insertion order.
    pub fn values(&self) -> Vec<Entity> {
        self.inner.members.borrow().live.to_vec()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        self.inner.members.borrow().live.len()
    }

    /// Whether the collection has no members.
    pub fn is_empty(&self) -> bool {
        self.inner.members.borrow().live.is_empty()
    }

    // -------------------------------------------------------------------
    // Suspension
    // -------------------------------------------------------------------

    /// Stop raising `collection_changed` until the matching
    /// [`resume_events`](Self::resume_events). Calls nest.
    pub fn suspend_events(&self) {
        self.inner.coalescer.suspend();
    }

    /// Undo one [`suspend_events`](Self::suspend_events). The outermost
    /// resume delivers everything accumulated meanwhile as one notification.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidOperation`] if events are not
    /// suspended.
    pub fn resume_events(&self) -> Result<(), RegistryError> {
        self.inner.coalescer.resume(self).map(|_| ())
    }

    /// Suspend events until the returned guard is dropped.
    pub fn suspend_scope(&self) -> SuspendGuard<'_> {
        self.suspend_events();
        SuspendGuard { collection: self }
    }

    /// Whether events are currently suspended.
    pub fn is_suspended(&self) -> bool {
        self.inner.coalescer.is_suspended()
    }

    fn request_flush(&self) -> usize {
        self.inner.coalescer.request_flush(self)
    }

    // -------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------

    /// Add an entity, or build one from options and add it.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidArgument`] if the entity id is empty,
    /// or [`RegistryError::DuplicateIdentifier`] if a member already uses the
    /// id. The collection is unchanged on error.
    pub fn add(&self, input: impl Into<EntityInput>) -> Result<Entity, RegistryError> {
        let entity = input.into().into_entity();
        let id = entity.id().to_owned();
        if id.is_empty() {
            return Err(RegistryError::InvalidArgument { name: "entity id" });
        }
        if self.inner.members.borrow().live.contains(&id) {
            return Err(RegistryError::DuplicateIdentifier { id });
        }

        if let Some(previous) = entity.entity_collection().filter(|c| !c.ptr_eq(self)) {
            warn!(
                entity = %id,
                from = %previous.id(),
                to = %self.id(),
                "entity is still owned by another collection"
            );
        }
        entity.attach(&self.inner);

        let weak = Rc::downgrade(&self.inner);
        let listener = entity.definition_changed().add_listener(move |change| {
            if let Some(inner) = weak.upgrade() {
                EntityCollection::from_inner(inner).on_entity_definition_changed(&change.entity);
            }
        });

        {
            let mut members = self.inner.members.borrow_mut();
            members.live.set(id.clone(), entity.clone());
            members.pending.record_added(&id, entity.clone());
            members.listeners.insert(id.clone(), listener);
        }
        trace!(collection = %self.id(), entity = %id, "entity added");

        self.request_flush();
        Ok(entity)
    }

    /// Remove `entity` by its id. Returns `false` if no member has that id.
    pub fn remove(&self, entity: &Entity) -> bool {
        self.remove_by_id(entity.id())
    }

    /// Remove the member with `id`. Returns `false` if the id is empty or
    /// not present.
    pub fn remove_by_id(&self, id: &str) -> bool {
        if id.is_empty() {
            return false;
        }
        let (entity, listener) = {
            let mut members = self.inner.members.borrow_mut();
            let Some(entity) = members.live.take(id) else {
                return false;
            };
            members.pending.record_removed(id, entity.clone());
            let listener = members.listeners.remove(id);
            (entity, listener)
        };

        if let Some(listener) = listener {
            entity.definition_changed().remove_listener(listener);
        }
        entity.detach(&self.inner);
        trace!(collection = %self.id(), entity = %id, "entity removed");

        self.request_flush();
        true
    }

    /// Remove every member.
    ///
    /// Members that were added since the last notification disappear without
    /// being reported at all.
    pub fn remove_all(&self) {
        let detached: Vec<(Entity, Option<ListenerId>)> = {
            let mut guard = self.inner.members.borrow_mut();
            let members = &mut *guard;
            members.pending.record_cleared(members.live.iter());
            let mut detached = Vec::with_capacity(members.live.len());
            for entity in members.live.values() {
                detached.push((entity.clone(), members.listeners.remove(entity.id())));
            }
            members.live.remove_all();
            members.listeners.clear();
            detached
        };

        debug!(collection = %self.id(), count = detached.len(), "removing all entities");
        for (entity, listener) in detached {
            if let Some(listener) = listener {
                entity.definition_changed().remove_listener(listener);
            }
            entity.detach(&self.inner);
        }

        self.request_flush();
    }

    /// Whether this exact entity object is a member.
    ///
    /// A different object that merely shares the id does not count.
    pub fn contains(&self, entity: &Entity) -> bool {
        self.inner
            .members
            .borrow()
            .live
            .get(entity.id())
            .is_some_and(|member| member.ptr_eq(entity))
    }

    /// Look up a member by id.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidArgument`] if `id` is empty.
    pub fn get_by_id(&self, id: &str) -> Result<Option<Entity>, RegistryError> {
        if id.is_empty() {
            return Err(RegistryError::InvalidArgument { name: "id" });
        }
        Ok(self.inner.members.borrow().live.get(id).cloned())
    }

    /// Return the member with `id`, creating and adding a minimal entity if
    /// there is none.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::InvalidArgument`] if `id` is empty.
    pub fn get_or_create_entity(&self, id: &str) -> Result<Entity, RegistryError> {
        if let Some(existing) = self.get_by_id(id)? {
            return Ok(existing);
        }
        self.add(Entity::with_id(id))
    }

    fn on_entity_definition_changed(&self, entity: &Entity) {
        self.inner
            .members
            .borrow_mut()
            .pending
            .record_changed(entity.id(), entity.clone());
        self.request_flush();
    }

    // -------------------------------------------------------------------
    // Derived state
    // -------------------------------------------------------------------

    /// The span covered by the members' availability intervals.
    ///
    /// Members without availability and unbounded endpoints are ignored; a
    /// side that no member bounds stays infinite. With no bounded member at
    /// all the result is [`TimeInterval::INFINITE`].
    pub fn compute_availability(&self) -> TimeInterval {
        let mut start_time = MAXIMUM_VALUE;
        let mut stop_time = MINIMUM_VALUE;

        let members = self.inner.members.borrow();
        for availability in members.live.values().filter_map(Entity::availability) {
            if availability.start < start_time && availability.start != MINIMUM_VALUE {
                start_time = availability.start;
            }
            if availability.stop > stop_time && availability.stop != MAXIMUM_VALUE {
                stop_time = availability.stop;
            }
        }

        if start_time == MAXIMUM_VALUE {
            start_time = MINIMUM_VALUE;
        }
        if stop_time == MINIMUM_VALUE {
            stop_time = MAXIMUM_VALUE;
        }
        TimeInterval::new(start_time, stop_time)
    }

    /// Whether the collection as a whole is shown.
    pub fn show(&self) -> bool {
        self.inner.show.get()
    }

    /// Show or hide the whole collection.
    ///
    /// Every member whose effective visibility flips raises its own
    /// `definition_changed` with `isShowing`; observers of the collection
    /// receive at most one notification covering all of them.
    pub fn set_show(&self, show: bool) {
        if show == self.inner.show.get() {
            return;
        }

        let _suspended = self.suspend_scope();
        let before: Vec<(Entity, bool)> = self
            .values()
            .into_iter()
            .map(|entity| {
                let showing = entity.is_showing();
                (entity, showing)
            })
            .collect();

        self.inner.show.set(show);

        let mut flipped = 0usize;
        for (entity, was_showing) in before {
            let is_showing = entity.is_showing();
            if is_showing != was_showing {
                entity.raise_definition_changed(
                    IS_SHOWING,
                    Value::Bool(is_showing),
                    Value::Bool(was_showing),
                );
                flipped = flipped.saturating_add(1);
            }
        }
        debug!(collection = %self.id(), show, flipped, "collection visibility changed");
    }
}

impl FlushTarget for EntityCollection {
    type Item = Entity;

    fn has_pending(&self) -> bool {
        !self.inner.members.borrow().pending.is_empty()
    }

    fn take_pending(&self) -> ChangeSet<Entity> {
        self.inner.members.borrow_mut().pending.take()
    }

    fn deliver(&self, batch: ChangeSet<Entity>) {
        self.inner.collection_changed.raise(&CollectionChanged {
            collection: self.clone(),
            added: batch.added,
            removed: batch.removed,
            changed: batch.changed,
        });
    }
}

impl Default for EntityCollection {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for EntityCollection {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EntityCollection")
            .field("id", &self.inner.id)
            .field("len", &self.len())
            .field("show", &self.inner.show.get())
            .field("suspend_count", &self.inner.coalescer.suspend_count())
            .finish_non_exhaustive()
    }
}
