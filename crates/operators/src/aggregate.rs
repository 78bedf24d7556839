//! Running aggregates over keyed change-set streams.
//!
//! The extremum aggregates share their upstream between two internal
//! consumers: a mirror cache holding the current collection (subscribed
//! first, so it is always ahead) and the aggregation fold itself, which
//! falls back to a full scan of the mirror when the current extremum is
//! removed. All aggregates suppress consecutive duplicate emissions.

use crate::CacheStream;
use alloc::rc::Rc;
use core::cell::{Cell, RefCell};
use core::fmt::Debug;
use core::hash::Hash;
use core::ops::{Add, Sub};
use rill_core::{Cache, ChangeReason, ChangeSet};
use rill_stream::{
    publish, synchronize, CallbackObserver, EmissionLock, Observable, SubscriptionSet,
};

#[derive(Clone, Copy)]
enum Extremum {
    Max,
    Min,
}

fn better<R: PartialOrd>(kind: Extremum, candidate: &R, current: &R) -> bool {
    match kind {
        Extremum::Max => candidate > current,
        Extremum::Min => candidate < current,
    }
}

fn fold<R: PartialOrd>(kind: Extremum, current: &mut Option<R>, candidate: R) {
    match current {
        None => *current = Some(candidate),
        Some(value) => {
            if better(kind, &candidate, value) {
                *current = Some(candidate);
            }
        }
    }
}

fn extremum<T, K, R, S>(
    source: &CacheStream<T, K>,
    selector: Rc<S>,
    empty_value: R,
    kind: Extremum,
) -> Observable<R>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + Debug + 'static,
    R: Clone + PartialOrd + PartialEq + 'static,
    S: Fn(&T) -> R + 'static,
{
    let source = source.clone();
    Observable::new(move |downstream| {
        let lock = EmissionLock::new();
        let shared = publish(&synchronize(&source, &lock));
        let mirror: Rc<RefCell<Cache<T, K>>> = Rc::new(RefCell::new(Cache::new()));

        // Collection-snapshot view, subscribed first.
        let mirror_sub = {
            let mirror = mirror.clone();
            let downstream = downstream.clone();
            shared.observable().subscribe(CallbackObserver::new(
                move |set: &ChangeSet<T, K>| {
                    if let Err(error) = mirror.borrow_mut().apply(set) {
                        downstream.error(&error);
                    }
                },
                |_| {},
                || {},
            ))
        };

        // Aggregation view.
        let aggregate_sub = {
            let mirror = mirror.clone();
            let selector = selector.clone();
            let empty_value = empty_value.clone();
            let current: Rc<RefCell<Option<R>>> = Rc::new(RefCell::new(None));
            let last_emitted: Rc<RefCell<Option<R>>> = Rc::new(RefCell::new(None));
            let downstream_next = downstream.clone();
            let downstream_error = downstream.clone();
            let downstream_complete = downstream;
            shared.observable().subscribe(CallbackObserver::new(
                move |set: &ChangeSet<T, K>| {
                    let mut current = current.borrow_mut();
                    let mut needs_reset = false;
                    for change in set.iter() {
                        match change.reason {
                            ChangeReason::Add => {
                                fold(kind, &mut current, selector(&change.current));
                            }
                            ChangeReason::Update => {
                                if let Some(previous) = &change.previous {
                                    if current.as_ref() == Some(&selector(previous)) {
                                        needs_reset = true;
                                        break;
                                    }
                                }
                                fold(kind, &mut current, selector(&change.current));
                            }
                            ChangeReason::Remove => {
                                if current.as_ref() == Some(&selector(&change.current)) {
                                    needs_reset = true;
                                    break;
                                }
                            }
                            ChangeReason::Refresh | ChangeReason::Moved => {}
                        }
                    }
                    if needs_reset {
                        // The mirror already holds the post-change
                        // collection; recompute from scratch.
                        let mirror = mirror.borrow();
                        *current = None;
                        for item in mirror.items() {
                            fold(kind, &mut current, selector(item));
                        }
                    }
                    let value = current.clone().unwrap_or_else(|| empty_value.clone());
                    drop(current);

                    let mut last = last_emitted.borrow_mut();
                    if last.as_ref() != Some(&value) {
                        *last = Some(value.clone());
                        drop(last);
                        downstream_next.next(&value);
                    }
                },
                move |error| downstream_error.error(error),
                move || downstream_complete.complete(),
            ))
        };

        let connection = shared.connect();

        let mut subscriptions = SubscriptionSet::new();
        subscriptions.push(mirror_sub);
        subscriptions.push(aggregate_sub);
        subscriptions.push(connection);
        subscriptions.into_subscription()
    })
}

/// The running maximum of `selector` over the collection.
///
/// Emits `empty_value` when the collection empties; consecutive duplicate
/// values are suppressed.
pub fn maximum<T, K, R, S>(source: &CacheStream<T, K>, selector: S, empty_value: R) -> Observable<R>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + Debug + 'static,
    R: Clone + PartialOrd + PartialEq + 'static,
    S: Fn(&T) -> R + 'static,
{
    extremum(source, Rc::new(selector), empty_value, Extremum::Max)
}

/// The running minimum of `selector` over the collection.
pub fn minimum<T, K, R, S>(source: &CacheStream<T, K>, selector: S, empty_value: R) -> Observable<R>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + Debug + 'static,
    R: Clone + PartialOrd + PartialEq + 'static,
    S: Fn(&T) -> R + 'static,
{
    extremum(source, Rc::new(selector), empty_value, Extremum::Min)
}

/// The running number of keys in the collection.
pub fn count<T, K>(source: &CacheStream<T, K>) -> Observable<usize>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + 'static,
{
    let source = source.clone();
    Observable::new(move |downstream| {
        let n = Rc::new(Cell::new(0usize));
        let last: Rc<RefCell<Option<usize>>> = Rc::new(RefCell::new(None));
        let downstream_next = downstream.clone();
        let downstream_error = downstream.clone();
        let downstream_complete = downstream;
        source.subscribe(CallbackObserver::new(
            move |set: &ChangeSet<T, K>| {
                for change in set.iter() {
                    match change.reason {
                        ChangeReason::Add => n.set(n.get() + 1),
                        ChangeReason::Remove => n.set(n.get().saturating_sub(1)),
                        _ => {}
                    }
                }
                let value = n.get();
                let mut last = last.borrow_mut();
                if *last != Some(value) {
                    *last = Some(value);
                    drop(last);
                    downstream_next.next(&value);
                }
            },
            move |error| downstream_error.error(error),
            move || downstream_complete.complete(),
        ))
    })
}

/// The running sum of `selector` over the collection.
pub fn sum<T, K, R, S>(source: &CacheStream<T, K>, selector: S) -> Observable<R>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + 'static,
    R: Default + Copy + PartialEq + Add<Output = R> + Sub<Output = R> + 'static,
    S: Fn(&T) -> R + 'static,
{
    let source = source.clone();
    let selector = Rc::new(selector);
    Observable::new(move |downstream| {
        let total = Rc::new(Cell::new(R::default()));
        let last: Rc<RefCell<Option<R>>> = Rc::new(RefCell::new(None));
        let selector = selector.clone();
        let downstream_next = downstream.clone();
        let downstream_error = downstream.clone();
        let downstream_complete = downstream;
        source.subscribe(CallbackObserver::new(
            move |set: &ChangeSet<T, K>| {
                for change in set.iter() {
                    match change.reason {
                        ChangeReason::Add => total.set(total.get() + selector(&change.current)),
                        ChangeReason::Remove => total.set(total.get() - selector(&change.current)),
                        ChangeReason::Update => {
                            let mut value = total.get();
                            if let Some(previous) = &change.previous {
                                value = value - selector(previous);
                            }
                            total.set(value + selector(&change.current));
                        }
                        _ => {}
                    }
                }
                let value = total.get();
                let mut last = last.borrow_mut();
                if *last != Some(value) {
                    *last = Some(value);
                    drop(last);
                    downstream_next.next(&value);
                }
            },
            move |error| downstream_error.error(error),
            move || downstream_complete.complete(),
        ))
    })
}
