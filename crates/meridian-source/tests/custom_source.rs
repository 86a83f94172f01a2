//! Integration tests for `CustomDataSource` driven through the
//! `DataSource` trait object, the way a frame driver sees it.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use std::cell::RefCell;
use std::rc::Rc;

use chrono::{TimeZone, Utc};
use meridian_registry::{CollectionChanged, EntityOptions};
use meridian_source::{
    CustomDataSource, DataSource, DataSourceClock, LoadingChanged, set_loading,
};
use meridian_types::{ClockRange, TimeInterval};

fn window(id: &str, start: i64, stop: i64) -> EntityOptions {
    EntityOptions {
        availability: Some(TimeInterval::new(
            Utc.timestamp_opt(start, 0).unwrap(),
            Utc.timestamp_opt(stop, 0).unwrap(),
        )),
        ..EntityOptions::with_id(id)
    }
}

#[test]
fn loaded_availability_yields_a_clock() {
    let source = CustomDataSource::new(Some("passes".into()));
    source
        .load([window("a", 0, 600), window("b", 300, 3000)])
        .unwrap();

    let availability = source.entities().compute_availability();
    let clock = DataSourceClock::from_availability(&availability).unwrap();
    source.set_clock(Some(clock));

    let dyn_source: &dyn DataSource = &*source;
    let clock = dyn_source.clock().unwrap();
    assert_eq!(clock.start_time, Some(Utc.timestamp_opt(0, 0).unwrap()));
    assert_eq!(clock.stop_time, Some(Utc.timestamp_opt(3000, 0).unwrap()));
    assert_eq!(clock.clock_range, Some(ClockRange::LoopStop));
    assert_eq!(clock.multiplier, Some(10.0));
    assert!(dyn_source.update(Utc::now()));
}

#[test]
fn observers_see_loading_before_the_batch_ends() {
    let source = CustomDataSource::new(None);
    let log = Rc::new(RefCell::new(Vec::<String>::new()));

    let sink = Rc::clone(&log);
    source
        .loading_event()
        .add_listener(move |change: &LoadingChanged| {
            sink.borrow_mut().push(format!("loading={}", change.is_loading));
        });
    let sink = Rc::clone(&log);
    source
        .entities()
        .collection_changed()
        .add_listener(move |change: &CollectionChanged| {
            sink.borrow_mut().push(format!("added={}", change.added.len()));
        });

    source.load((0..5).map(|i| EntityOptions::with_id(format!("e{i}")))).unwrap();

    assert_eq!(
        *log.borrow(),
        vec!["loading=true", "added=5", "loading=false"]
    );
}

#[test]
fn manual_loading_brackets_direct_adds() {
    let source = CustomDataSource::new(None);
    let batches = Rc::new(RefCell::new(0u32));
    let counter = Rc::clone(&batches);
    source
        .entities()
        .collection_changed()
        .add_listener(move |_: &CollectionChanged| *counter.borrow_mut() += 1);

    set_loading(&*source, true).unwrap();
    for id in ["x", "y", "z"] {
        source.entities().get_or_create_entity(id).unwrap();
    }
    set_loading(&*source, false).unwrap();

    assert_eq!(*batches.borrow(), 1);
    assert_eq!(source.entities().len(), 3);
}
