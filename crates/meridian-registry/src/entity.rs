//! The identified object tracked by an [`EntityCollection`].
//!
//! An [`Entity`] is a cheap, clonable handle to shared state. Clones refer to
//! the same object: identity is allocation identity ([`Entity::ptr_eq`]), not
//! id equality. Every setter raises [`Entity::definition_changed`] when the
//! stored value actually changes, which is how an owning collection learns
//! that a member was modified in place.
//!
//! The back-reference to the owning collection is a [`Weak`] link. It routes
//! visibility (`is_showing` folds in the collection's `show` flag) and never
//! keeps the collection alive.

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::{Rc, Weak};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use meridian_events::Event;
use meridian_types::TimeInterval;

use crate::collection::{CollectionInner, EntityCollection};

/// Property name raised when the effective visibility of an entity flips.
pub const IS_SHOWING: &str = "isShowing";

/// Payload of [`Entity::definition_changed`].
#[derive(Debug, Clone)]
pub struct DefinitionChanged {
    /// The entity whose definition changed.
    pub entity: Entity,
    /// Name of the property that changed.
    pub property: String,
    /// Value after the change.
    pub new_value: Value,
    /// Value before the change.
    pub old_value: Value,
}

/// Plain structured data from which an [`Entity`] can be built.
///
/// Missing fields take their defaults: a generated id, no name, shown,
/// always available, no extra properties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityOptions {
    /// Unique id; generated when absent.
    pub id: Option<String>,
    /// Human-readable name.
    pub name: Option<String>,
    /// Own visibility flag; `true` when absent.
    pub show: Option<bool>,
    /// When the entity is meaningful; always when absent.
    pub availability: Option<TimeInterval>,
    /// Free-form property bag.
    pub properties: BTreeMap<String, Value>,
}

impl EntityOptions {
    /// Options carrying only an id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }
}

/// Either an already-built entity or the data to build one.
#[derive(Debug, Clone)]
pub enum EntityInput {
    /// An existing entity, added as-is.
    Entity(Entity),
    /// Raw data, wrapped into a new entity on add.
    Options(EntityOptions),
}

impl EntityInput {
    /// Resolve to a concrete entity, building one from options if needed.
    pub fn into_entity(self) -> Entity {
        match self {
            Self::Entity(entity) => entity,
            Self::Options(options) => Entity::new(options),
        }
    }
}

impl From<Entity> for EntityInput {
    fn from(entity: Entity) -> Self {
        Self::Entity(entity)
    }
}

impl From<&Entity> for EntityInput {
    fn from(entity: &Entity) -> Self {
        Self::Entity(entity.clone())
    }
}

impl From<EntityOptions> for EntityInput {
    fn from(options: EntityOptions) -> Self {
        Self::Options(options)
    }
}

struct EntityInner {
    id: String,
    name: RefCell<Option<String>>,
    show: Cell<bool>,
    availability: Cell<Option<TimeInterval>>,
    properties: RefCell<BTreeMap<String, Value>>,
    collection: RefCell<Weak<CollectionInner>>,
    definition_changed: Event<DefinitionChanged>,
}

/// Shared handle to a uniquely identified object.
#[derive(Clone)]
pub struct Entity(Rc<EntityInner>);

impl Entity {
    /// Build an entity from options.
    pub fn new(options: EntityOptions) -> Self {
        let id = options
            .id
            .unwrap_or_else(|| uuid::Uuid::now_v7().to_string());
        Self(Rc::new(EntityInner {
            id,
            name: RefCell::new(options.name),
            show: Cell::new(options.show.unwrap_or(true)),
            availability: Cell::new(options.availability),
            properties: RefCell::new(options.properties),
            collection: RefCell::new(Weak::new()),
            definition_changed: Event::new(),
        }))
    }

    /// Build a minimal entity with the given id.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self::new(EntityOptions::with_id(id))
    }

    /// The entity's unique id.
    pub fn id(&self) -> &str {
        &self.0.id
    }

    /// Whether both handles refer to the same object.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Notification raised whenever one of the entity's properties changes.
    pub fn definition_changed(&self) -> &Event<DefinitionChanged> {
        &self.0.definition_changed
    }

    /// Raise [`definition_changed`](Self::definition_changed) for `property`.
    ///
    /// Setters call this themselves; owners call it directly when a derived
    /// value such as `isShowing` changed without the entity mutating.
    pub fn raise_definition_changed(&self, property: &str, new_value: Value, old_value: Value) {
        self.0.definition_changed.raise(&DefinitionChanged {
            entity: self.clone(),
            property: property.to_owned(),
            new_value,
            old_value,
        });
    }

    /// The collection currently owning this entity, if any.
    pub fn entity_collection(&self) -> Option<EntityCollection> {
        self.0
            .collection
            .borrow()
            .upgrade()
            .map(EntityCollection::from_inner)
    }

    pub(crate) fn owned_by(&self, inner: &Rc<CollectionInner>) -> bool {
        self.0
            .collection
            .borrow()
            .upgrade()
            .is_some_and(|owner| Rc::ptr_eq(&owner, inner))
    }

    pub(crate) fn attach(&self, inner: &Rc<CollectionInner>) {
        *self.0.collection.borrow_mut() = Rc::downgrade(inner);
    }

    /// Drop the back-reference, but only if it still points at `inner`.
    pub(crate) fn detach(&self, inner: &Rc<CollectionInner>) {
        if self.owned_by(inner) {
            *self.0.collection.borrow_mut() = Weak::new();
        }
    }

    // -------------------------------------------------------------------
    // Visibility
    // -------------------------------------------------------------------

    /// The entity's own visibility flag.
    pub fn show(&self) -> bool {
        self.0.show.get()
    }

    /// Set the entity's own visibility flag.
    ///
    /// Raises `show`, then `isShowing` if the effective visibility flipped.
    pub fn set_show(&self, show: bool) {
        if show == self.0.show.get() {
            return;
        }
        let was_showing = self.is_showing();
        self.0.show.set(show);
        self.raise_definition_changed("show", Value::Bool(show), Value::Bool(!show));

        let is_showing = self.is_showing();
        if is_showing != was_showing {
            self.raise_definition_changed(
                IS_SHOWING,
                Value::Bool(is_showing),
                Value::Bool(was_showing),
            );
        }
    }

    /// Effective visibility: the entity's own flag and its collection's.
    pub fn is_showing(&self) -> bool {
        let collection_shows = self
            .0
            .collection
            .borrow()
            .upgrade()
            .is_none_or(|owner| owner.show());
        self.0.show.get() && collection_shows
    }

    // -------------------------------------------------------------------
    // Stored properties
    // -------------------------------------------------------------------

    /// Human-readable name.
    pub fn name(&self) -> Option<String> {
        self.0.name.borrow().clone()
    }

    /// Replace the name.
    pub fn set_name(&self, name: Option<String>) {
        let old = self.0.name.replace(name.clone());
        if old != name {
            self.raise_definition_changed("name", json_or_null(name), json_or_null(old));
        }
    }

    /// When the entity is meaningful; `None` means always.
    pub fn availability(&self) -> Option<TimeInterval> {
        self.0.availability.get()
    }

    /// Replace the availability interval.
    pub fn set_availability(&self, availability: Option<TimeInterval>) {
        let old = self.0.availability.replace(availability);
        if old != availability {
            self.raise_definition_changed(
                "availability",
                json_or_null(availability),
                json_or_null(old),
            );
        }
    }

    /// Whether the entity is available at `time`.
    pub fn is_available(&self, time: DateTime<Utc>) -> bool {
        self.0
            .availability
            .get()
            .is_none_or(|interval| interval.contains(time))
    }

    /// Value of a free-form property.
    pub fn property(&self, key: &str) -> Option<Value> {
        self.0.properties.borrow().get(key).cloned()
    }

    /// Names of all free-form properties, sorted.
    pub fn property_names(&self) -> Vec<String> {
        self.0.properties.borrow().keys().cloned().collect()
    }

    /// Set a free-form property.
    pub fn set_property(&self, key: &str, value: Value) {
        let old = self
            .0
            .properties
            .borrow_mut()
            .insert(key.to_owned(), value.clone());
        if old.as_ref() != Some(&value) {
            self.raise_definition_changed(key, value, old.unwrap_or(Value::Null));
        }
    }

    /// Remove a free-form property, returning its old value.
    pub fn remove_property(&self, key: &str) -> Option<Value> {
        let old = self.0.properties.borrow_mut().remove(key);
        if let Some(previous) = &old {
            self.raise_definition_changed(key, Value::Null, previous.clone());
        }
        old
    }

    /// Export the entity's current state as plain data.
    pub fn to_options(&self) -> EntityOptions {
        EntityOptions {
            id: Some(self.0.id.clone()),
            name: self.name(),
            show: Some(self.show()),
            availability: self.availability(),
            properties: self.0.properties.borrow().clone(),
        }
    }
}

fn json_or_null<T: Serialize>(value: T) -> Value {
    serde_json::to_value(value).unwrap_or_default()
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for Entity {}

impl core::fmt::Debug for Entity {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Entity")
            .field("id", &self.0.id)
            .field("name", &*self.0.name.borrow())
            .field("show", &self.0.show.get())
            .field("availability", &self.0.availability.get())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn record(entity: &Entity) -> Rc<RefCell<Vec<(String, Value, Value)>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&log);
        entity.definition_changed().add_listener(move |change: &DefinitionChanged| {
            sink.borrow_mut().push((
                change.property.clone(),
                change.new_value.clone(),
                change.old_value.clone(),
            ));
        });
        log
    }

    #[test]
    fn options_default_to_shown_with_generated_id() {
        let entity = Entity::new(EntityOptions::default());
        assert!(!entity.id().is_empty());
        assert!(entity.show());
        assert!(entity.is_showing());
        assert!(entity.availability().is_none());
        assert!(entity.entity_collection().is_none());
    }

    #[test]
    fn clones_share_identity() {
        let a = Entity::with_id("a");
        let alias = a.clone();
        let twin = Entity::with_id("a");
        assert_eq!(a, alias);
        assert_ne!(a, twin);
    }

    #[test]
    fn setters_raise_only_on_change() {
        let entity = Entity::with_id("a");
        let log = record(&entity);

        entity.set_name(Some("Alpha".to_owned()));
        entity.set_name(Some("Alpha".to_owned()));
        entity.set_property("speed", json!(3));
        entity.set_property("speed", json!(3));

        assert_eq!(
            *log.borrow(),
            vec![
                ("name".to_owned(), json!("Alpha"), Value::Null),
                ("speed".to_owned(), json!(3), Value::Null),
            ]
        );
    }

    #[test]
    fn hiding_raises_is_showing() {
        let entity = Entity::with_id("a");
        let log = record(&entity);
        entity.set_show(false);
        assert!(!entity.is_showing());
        assert_eq!(
            *log.borrow(),
            vec![
                ("show".to_owned(), json!(false), json!(true)),
                (IS_SHOWING.to_owned(), json!(false), json!(true)),
            ]
        );
    }

    #[test]
    fn show_inside_hidden_collection_does_not_flip_is_showing() {
        let collection = EntityCollection::new();
        collection.set_show(false);
        let Ok(entity) = collection.add(Entity::with_id("a")) else {
            panic!("add should succeed");
        };
        let log = record(&entity);

        entity.set_show(false);
        assert_eq!(
            *log.borrow(),
            vec![("show".to_owned(), json!(false), json!(true))]
        );
    }

    #[test]
    fn availability_controls_is_available() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).single();
        let stop = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).single();
        let (Some(start), Some(stop)) = (start, stop) else {
            panic!("valid dates");
        };
        let entity = Entity::with_id("a");
        assert!(entity.is_available(start));

        entity.set_availability(Some(TimeInterval::new(start, stop)));
        assert!(entity.is_available(start));
        assert!(!entity.is_available(stop + chrono::Duration::seconds(1)));
    }

    #[test]
    fn remove_property_reports_old_value() {
        let entity = Entity::with_id("a");
        entity.set_property("color", json!("red"));
        let log = record(&entity);
        assert_eq!(entity.remove_property("color"), Some(json!("red")));
        assert_eq!(entity.remove_property("color"), None);
        assert_eq!(log.borrow().len(), 1);
    }

    #[test]
    fn options_round_trip_through_to_options() {
        let options = EntityOptions {
            id: Some("sat-1".to_owned()),
            name: Some("Satellite".to_owned()),
            show: Some(false),
            availability: None,
            properties: BTreeMap::from([("orbit".to_owned(), json!("LEO"))]),
        };
        let entity = Entity::new(options.clone());
        assert_eq!(entity.to_options(), options);
    }

    #[test]
    fn property_names_are_sorted() {
        let entity = Entity::with_id("a");
        entity.set_property("velocity", json!(7.5));
        entity.set_property("altitude", json!(400));
        assert_eq!(entity.property_names(), vec!["altitude", "velocity"]);

        assert_eq!(entity.remove_property("velocity"), Some(json!(7.5)));
        assert_eq!(entity.property_names(), vec!["altitude"]);
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let parsed: Result<EntityOptions, _> = serde_json::from_value(json!({ "id": "x" }));
        let Ok(options) = parsed else {
            panic!("options should deserialize");
        };
        assert_eq!(options, EntityOptions::with_id("x"));
        assert!(Entity::new(options).show());
    }
}
