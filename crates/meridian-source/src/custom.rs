//! A data source populated programmatically.
//!
//! [`CustomDataSource`] is the simplest [`DataSource`]: it owns an
//! [`EntityCollection`] that callers fill directly, or in bulk through
//! [`load`](CustomDataSource::load) and
//! [`process`](CustomDataSource::process). Bulk operations run inside
//! [`set_loading`], so observers of the collection see one notification per
//! batch.

use std::any::Any;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use tracing::{info, warn};

use meridian_events::Event;
use meridian_registry::{EntityCollection, EntityOptions};
use meridian_types::SourceId;

use crate::clock::DataSourceClock;
use crate::clustering::ClusteringOptions;
use crate::data_source::{
    DataSource, DataSourceChanged, DataSourceFault, LoadingChanged, LoadingState, set_loading,
};
use crate::error::SourceError;

/// A data source whose entities are supplied by the caller.
#[derive(Debug)]
pub struct CustomDataSource {
    id: SourceId,
    name: RefCell<Option<String>>,
    clock: Cell<Option<DataSourceClock>>,
    clustering: Cell<ClusteringOptions>,
    entities: EntityCollection,
    loading: LoadingState,
    changed_event: Event<DataSourceChanged>,
    error_event: Event<DataSourceFault>,
    loading_event: Event<LoadingChanged>,
}

impl CustomDataSource {
    /// Create an empty source.
    ///
    /// The source is its collection's owner, so it is handed out behind an
    /// `Rc`; `entities().owner::<CustomDataSource>()` leads back to it.
    pub fn new(name: Option<String>) -> Rc<Self> {
        Rc::new_cyclic(|this: &Weak<Self>| {
            let owner: Weak<dyn Any> = this.clone();
            Self {
                id: SourceId::new(),
                name: RefCell::new(name),
                clock: Cell::new(None),
                clustering: Cell::new(ClusteringOptions::default()),
                entities: EntityCollection::with_owner(owner),
                loading: LoadingState::new(),
                changed_event: Event::new(),
                error_event: Event::new(),
                loading_event: Event::new(),
            }
        })
    }

    /// Rename the source, raising `changed_event` on change.
    pub fn set_name(&self, name: Option<String>) {
        let old = self.name.replace(name.clone());
        if old != name {
            self.raise_changed();
        }
    }

    /// Replace the suggested clock, raising `changed_event` on change.
    pub fn set_clock(&self, clock: Option<DataSourceClock>) {
        let old = self.clock.replace(clock);
        if old != clock {
            self.raise_changed();
        }
    }

    /// Show or hide every entity, raising `changed_event` on change.
    pub fn set_show(&self, show: bool) {
        if self.entities.show() == show {
            return;
        }
        self.entities.set_show(show);
        self.raise_changed();
    }

    /// Replace the clustering settings.
    pub fn set_clustering(&self, clustering: ClusteringOptions) {
        self.clustering.set(clustering);
    }

    fn raise_changed(&self) {
        self.changed_event.raise(&DataSourceChanged { source: self.id });
    }

    /// Replace the current entities with `records`.
    ///
    /// Observers of the collection receive one notification for the whole
    /// replacement. Returns the number of records added.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Record`] for the first record the collection
    /// rejects; records before it stay loaded. The failure is also raised on
    /// `error_event`.
    pub fn load<I>(&self, records: I) -> Result<usize, SourceError>
    where
        I: IntoIterator<Item = EntityOptions>,
    {
        self.batch(records, true)
    }

    /// Add `records` to the current entities.
    ///
    /// Same batching and error behaviour as [`load`](Self::load), without
    /// clearing first.
    pub fn process<I>(&self, records: I) -> Result<usize, SourceError>
    where
        I: IntoIterator<Item = EntityOptions>,
    {
        self.batch(records, false)
    }

    fn batch<I>(&self, records: I, replace: bool) -> Result<usize, SourceError>
    where
        I: IntoIterator<Item = EntityOptions>,
    {
        // A caller already holding the source in loading owns the bracket.
        let started = set_loading(self, true)?;
        if replace {
            self.entities.remove_all();
        }

        let mut outcome = Ok(0usize);
        for (index, record) in records.into_iter().enumerate() {
            if let Err(source) = self.entities.add(record) {
                outcome = Err(SourceError::Record { index, source });
                break;
            }
            outcome = Ok(index.saturating_add(1));
        }

        let finished = if started {
            set_loading(self, false)
        } else {
            Ok(false)
        };
        match outcome {
            Ok(count) => {
                finished?;
                info!(source = %self.id, count, replace, "data source batch loaded");
                Ok(count)
            }
            Err(error) => {
                warn!(source = %self.id, %error, "data source batch failed");
                self.error_event.raise(&DataSourceFault {
                    source: self.id,
                    error: error.clone(),
                });
                Err(error)
            }
        }
    }
}

impl DataSource for CustomDataSource {
    fn id(&self) -> SourceId {
        self.id
    }

    fn name(&self) -> Option<String> {
        self.name.borrow().clone()
    }

    fn clock(&self) -> Option<DataSourceClock> {
        self.clock.get()
    }

    fn entities(&self) -> &EntityCollection {
        &self.entities
    }

    fn loading_state(&self) -> &LoadingState {
        &self.loading
    }

    fn show(&self) -> bool {
        self.entities.show()
    }

    fn clustering(&self) -> ClusteringOptions {
        self.clustering.get()
    }

    fn changed_event(&self) -> &Event<DataSourceChanged> {
        &self.changed_event
    }

    fn error_event(&self) -> &Event<DataSourceFault> {
        &self.error_event
    }

    fn loading_event(&self) -> &Event<LoadingChanged> {
        &self.loading_event
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use meridian_registry::{CollectionChanged, RegistryError};

    use super::*;

    fn count_changes(source: &CustomDataSource) -> Rc<Cell<u32>> {
        let count = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&count);
        source
            .changed_event()
            .add_listener(move |_: &DataSourceChanged| counter.set(counter.get() + 1));
        count
    }

    #[test]
    fn collection_is_owned_by_source() {
        let source = CustomDataSource::new(Some("tracks".into()));
        let Some(owner) = source.entities().owner::<CustomDataSource>() else {
            panic!("owner should resolve");
        };
        assert!(Rc::ptr_eq(&owner, &source));
        assert_eq!(source.name().as_deref(), Some("tracks"));
    }

    #[test]
    fn setters_raise_changed_only_on_change() {
        let source = CustomDataSource::new(None);
        let changes = count_changes(&source);

        source.set_name(Some("a".into()));
        source.set_name(Some("a".into()));
        source.set_show(false);
        source.set_show(false);
        source.set_clock(Some(DataSourceClock::default()));
        source.set_clock(Some(DataSourceClock::default()));

        assert_eq!(changes.get(), 3);
        assert!(!source.show());
    }

    #[test]
    fn load_delivers_one_notification() {
        let source = CustomDataSource::new(None);
        let batches = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&batches);
        source
            .entities()
            .collection_changed()
            .add_listener(move |change: &CollectionChanged| {
                sink.borrow_mut().push((change.added.len(), change.removed.len()));
            });

        let first = source.load(["a", "b", "c"].map(EntityOptions::with_id));
        assert_eq!(first, Ok(3));
        let second = source.load(["c", "d"].map(EntityOptions::with_id));
        assert_eq!(second, Ok(2));

        assert_eq!(*batches.borrow(), vec![(3, 0), (1, 2)]);
        assert!(!source.is_loading());
        assert_eq!(source.entities().len(), 2);
    }

    #[test]
    fn process_appends() {
        let source = CustomDataSource::new(None);
        assert_eq!(source.load([EntityOptions::with_id("a")]), Ok(1));
        assert_eq!(source.process([EntityOptions::with_id("b")]), Ok(1));
        assert_eq!(source.entities().len(), 2);
    }

    #[test]
    fn batches_inside_outer_loading_share_one_notification() {
        let source = CustomDataSource::new(None);
        let batches = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&batches);
        source
            .entities()
            .collection_changed()
            .add_listener(move |change: &CollectionChanged| sink.borrow_mut().push(change.added.len()));

        assert_eq!(set_loading(&*source, true), Ok(true));
        assert_eq!(source.process([EntityOptions::with_id("a")]), Ok(1));
        assert!(source.is_loading());
        assert!(source.entities().is_suspended());
        assert_eq!(source.process([EntityOptions::with_id("b")]), Ok(1));
        assert!(batches.borrow().is_empty());

        assert_eq!(set_loading(&*source, false), Ok(true));
        assert_eq!(*batches.borrow(), vec![2]);
        assert!(!source.entities().is_suspended());
    }

    #[test]
    fn failed_record_raises_error_and_stops_loading() {
        let source = CustomDataSource::new(None);
        let faults = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&faults);
        source
            .error_event()
            .add_listener(move |fault: &DataSourceFault| sink.borrow_mut().push(fault.error.clone()));

        let result = source.load(["a", "a"].map(EntityOptions::with_id));
        let expected = SourceError::Record {
            index: 1,
            source: RegistryError::DuplicateIdentifier { id: "a".into() },
        };
        assert_eq!(result, Err(expected.clone()));
        assert_eq!(*faults.borrow(), vec![expected]);
        assert!(!source.is_loading());
        assert!(!source.entities().is_suspended());
        assert_eq!(source.entities().len(), 1);
    }
}
