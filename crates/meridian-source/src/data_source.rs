//! The data source capability contract.
//!
//! A data source owns one [`EntityCollection`] and publishes lifecycle
//! notifications about it. Implementors store their loading flag in a
//! [`LoadingState`] and must change it only through [`set_loading`], which
//! keeps the flag and the collection's event suspension in lockstep: while
//! a source is loading, its collection accumulates changes silently and
//! delivers them as one batch when loading ends.

use std::cell::Cell;

use chrono::{DateTime, Utc};
use tracing::debug;

use meridian_events::Event;
use meridian_registry::EntityCollection;
use meridian_types::SourceId;

use crate::clock::DataSourceClock;
use crate::clustering::ClusteringOptions;
use crate::error::SourceError;

/// Payload of [`DataSource::loading_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadingChanged {
    /// The source whose loading flag changed.
    pub source: SourceId,
    /// The new value of the flag.
    pub is_loading: bool,
}

/// Payload of [`DataSource::changed_event`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataSourceChanged {
    /// The source whose name, clock, or visibility changed.
    pub source: SourceId,
}

/// Payload of [`DataSource::error_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataSourceFault {
    /// The source that failed.
    pub source: SourceId,
    /// What went wrong.
    pub error: SourceError,
}

/// Storage for a data source's loading flag.
///
/// Read it freely; write it only through [`set_loading`].
#[derive(Debug, Default)]
pub struct LoadingState(Cell<bool>);

impl LoadingState {
    /// A state that is not loading.
    pub const fn new() -> Self {
        Self(Cell::new(false))
    }

    /// Whether the owner is currently loading.
    pub fn get(&self) -> bool {
        self.0.get()
    }

    fn set(&self, is_loading: bool) {
        self.0.set(is_loading);
    }
}

/// A provider of entities plus the lifecycle around them.
pub trait DataSource {
    /// Globally unique id of this source.
    fn id(&self) -> SourceId;

    /// Human-readable name.
    fn name(&self) -> Option<String>;

    /// Suggested clock settings, if the source has any.
    fn clock(&self) -> Option<DataSourceClock>;

    /// The collection of entities this source provides.
    fn entities(&self) -> &EntityCollection;

    /// Storage for the loading flag, driven by [`set_loading`].
    fn loading_state(&self) -> &LoadingState;

    /// Whether the source is currently loading.
    fn is_loading(&self) -> bool {
        self.loading_state().get()
    }

    /// Whether the source's entities are shown.
    fn show(&self) -> bool;

    /// Clustering settings for this source.
    fn clustering(&self) -> ClusteringOptions;

    /// Raised when the name, clock, or visibility changes.
    fn changed_event(&self) -> &Event<DataSourceChanged>;

    /// Raised when loading or processing fails.
    fn error_event(&self) -> &Event<DataSourceFault>;

    /// Raised when the loading flag changes.
    fn loading_event(&self) -> &Event<LoadingChanged>;

    /// Advance the source to `time`.
    ///
    /// Returns `true` when the source is ready to be displayed at `time`.
    fn update(&self, _time: DateTime<Utc>) -> bool {
        true
    }
}

/// Toggle a source's loading flag.
///
/// Entering the loading state suspends the source's collection; leaving it
/// resumes the collection, which flushes everything added meanwhile as one
/// notification. [`DataSource::loading_event`] is raised only on an actual
/// change. Returns whether the flag changed.
///
/// # Errors
///
/// Returns [`SourceError::Registry`] if the collection's suspension was
/// resumed by someone else while the source was loading.
pub fn set_loading<S: DataSource + ?Sized>(source: &S, is_loading: bool) -> Result<bool, SourceError> {
    if source.loading_state().get() == is_loading {
        return Ok(false);
    }

    if is_loading {
        source.entities().suspend_events();
    } else {
        source.entities().resume_events()?;
    }
    source.loading_state().set(is_loading);
    debug!(source = %source.id(), is_loading, "data source loading state changed");

    source.loading_event().raise(&LoadingChanged {
        source: source.id(),
        is_loading,
    });
    Ok(true)
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use meridian_registry::{CollectionChanged, Entity};

    use super::*;

    /// Minimal source holding only what the trait requires.
    #[derive(Default)]
    struct Bare {
        id: SourceId,
        entities: EntityCollection,
        loading: LoadingState,
        changed: Event<DataSourceChanged>,
        error: Event<DataSourceFault>,
        loading_event: Event<LoadingChanged>,
    }

    impl DataSource for Bare {
        fn id(&self) -> SourceId {
            self.id
        }
        fn name(&self) -> Option<String> {
            None
        }
        fn clock(&self) -> Option<DataSourceClock> {
            None
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
            ClusteringOptions::default()
        }
        fn changed_event(&self) -> &Event<DataSourceChanged> {
            &self.changed
        }
        fn error_event(&self) -> &Event<DataSourceFault> {
            &self.error
        }
        fn loading_event(&self) -> &Event<LoadingChanged> {
            &self.loading_event
        }
    }

    #[test]
    fn loading_suspends_collection_in_lockstep() {
        let source = Bare::default();
        let flags = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&flags);
        source
            .loading_event()
            .add_listener(move |change: &LoadingChanged| sink.borrow_mut().push(change.is_loading));
        let batches = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&batches);
        source
            .entities()
            .collection_changed()
            .add_listener(move |change: &CollectionChanged| sink.borrow_mut().push(change.added.len()));

        assert_eq!(set_loading(&source, true), Ok(true));
        assert!(source.is_loading());
        assert!(source.entities().is_suspended());

        assert!(source.entities().add(Entity::with_id("a")).is_ok());
        assert!(source.entities().add(Entity::with_id("b")).is_ok());
        assert!(batches.borrow().is_empty());

        assert_eq!(set_loading(&source, false), Ok(true));
        assert!(!source.is_loading());
        assert!(!source.entities().is_suspended());
        assert_eq!(*batches.borrow(), vec![2]);
        assert_eq!(*flags.borrow(), vec![true, false]);
    }

    #[test]
    fn repeated_value_is_a_no_op() {
        let source = Bare::default();
        let raised = Rc::new(Cell::new(0u32));
        let counter = Rc::clone(&raised);
        source
            .loading_event()
            .add_listener(move |_: &LoadingChanged| counter.set(counter.get() + 1));

        assert_eq!(set_loading(&source, false), Ok(false));
        assert_eq!(set_loading(&source, true), Ok(true));
        assert_eq!(set_loading(&source, true), Ok(false));
        assert!(source.entities().is_suspended());
        assert_eq!(raised.get(), 1);
    }

    #[test]
    fn foreign_resume_surfaces_as_error() {
        let source = Bare::default();
        assert_eq!(set_loading(&source, true), Ok(true));
        assert!(source.entities().resume_events().is_ok());

        assert!(matches!(
            set_loading(&source, false),
            Err(SourceError::Registry(_))
        ));
        assert!(source.is_loading());
    }

    #[test]
    fn update_defaults_to_ready() {
        assert!(Bare::default().update(Utc::now()));
    }
}
