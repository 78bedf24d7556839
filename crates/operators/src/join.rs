//! Joins across keyed streams.
//!
//! Both sides are mirrored into operator-owned caches under one emission
//! lock; the right side is re-keyed to the left key space by the caller's
//! key selector. Every change touching a key re-runs the result selector
//! for that key and upserts, removes, or refreshes the result entry.

use crate::group::group_on;
use crate::operator::emit_if_any;
use crate::CacheStream;
use alloc::rc::Rc;
use core::cell::RefCell;
use core::fmt::Debug;
use core::hash::Hash;
use rill_core::{Cache, ChangeAwareCache, ChangeReason, ChangeSet, Grouping};
use rill_stream::{
    synchronize, CallbackObserver, EmissionLock, Observable, Subscription, SubscriptionSet,
};

struct JoinState<L, R, D, KL> {
    left: Cache<L, KL>,
    right: Cache<R, KL>,
    result: ChangeAwareCache<D, KL>,
    completed: usize,
}

type SharedSubscriptions = Rc<RefCell<SubscriptionSet>>;

/// Joins two keyed streams, keeping every left key.
///
/// The result contains exactly the keys of the left side; each value is
/// `selector(key, left, right.lookup(key))`, re-evaluated whenever either
/// side changes the key.
pub fn left_join<L, R, KL, KR, D, RK, RS>(
    left: &CacheStream<L, KL>,
    right: &CacheStream<R, KR>,
    right_key: RK,
    selector: RS,
) -> CacheStream<D, KL>
where
    L: Clone + 'static,
    R: Clone + 'static,
    D: Clone + 'static,
    KL: Eq + Hash + Clone + Debug + 'static,
    KR: Eq + Hash + Clone + 'static,
    RK: Fn(&R) -> KL + 'static,
    RS: Fn(&KL, &L, Option<&R>) -> D + 'static,
{
    let left = left.clone();
    let right = right.clone();
    let right_key = Rc::new(right_key);
    let selector = Rc::new(selector);

    Observable::new(move |downstream| {
        let lock = EmissionLock::new();
        let state = Rc::new(RefCell::new(JoinState::<L, R, D, KL> {
            left: Cache::new(),
            right: Cache::new(),
            result: ChangeAwareCache::new(),
            completed: 0,
        }));
        let subscriptions: SharedSubscriptions = Rc::new(RefCell::new(SubscriptionSet::new()));

        // Left side.
        let left_sub = {
            let value = state.clone();
            let downstream_next = downstream.clone();
            let selector = selector.clone();
            let subs = subscriptions.clone();
            let next = move |set: &ChangeSet<L, KL>| {
                let outcome = {
                    let mut st = value.borrow_mut();
                    let st = &mut *st;
                    match st.left.apply(set) {
                        Err(error) => Err(error),
                        Ok(()) => {
                            for change in set.iter() {
                                let key = &change.key;
                                match change.reason {
                                    ChangeReason::Add | ChangeReason::Update => {
                                        let derived =
                                            selector(key, &change.current, st.right.lookup(key));
                                        st.result.add_or_update(derived, key.clone());
                                    }
                                    ChangeReason::Remove => st.result.remove(key),
                                    ChangeReason::Refresh => st.result.refresh(key),
                                    ChangeReason::Moved => {}
                                }
                            }
                            Ok(st.result.capture_changes())
                        }
                    }
                };
                match outcome {
                    Ok(changes) => emit_if_any(changes, &downstream_next),
                    Err(error) => {
                        subs.borrow_mut().dispose();
                        downstream_next.error(&error);
                    }
                }
            };
            let downstream_error = downstream.clone();
            let error_subs = subscriptions.clone();
            let downstream_complete = downstream.clone();
            let complete_state = state.clone();
            synchronize(&left, &lock).subscribe(CallbackObserver::new(
                next,
                move |error| {
                    error_subs.borrow_mut().dispose();
                    downstream_error.error(error);
                },
                move || {
                    let done = {
                        let mut st = complete_state.borrow_mut();
                        st.completed += 1;
                        st.completed == 2
                    };
                    if done {
                        downstream_complete.complete();
                    }
                },
            ))
        };
        subscriptions.borrow_mut().push(left_sub);

        // Right side, re-keyed to the left key space.
        let right_sub = {
            let value = state.clone();
            let downstream_next = downstream.clone();
            let selector = selector.clone();
            let right_key = right_key.clone();
            let next = move |set: &ChangeSet<R, KR>| {
                let changes = {
                    let mut st = value.borrow_mut();
                    let st = &mut *st;
                    for change in set.iter() {
                        match change.reason {
                            ChangeReason::Add | ChangeReason::Update => {
                                let key = right_key(&change.current);
                                if let Some(previous) = &change.previous {
                                    let old_key = right_key(previous);
                                    if old_key != key {
                                        st.right.remove(&old_key);
                                        match st.left.lookup(&old_key) {
                                            Some(left_value) => {
                                                let derived =
                                                    selector(&old_key, left_value, None);
                                                st.result.add_or_update(derived, old_key);
                                            }
                                            None => st.result.remove(&old_key),
                                        }
                                    }
                                }
                                st.right.add_or_update(change.current.clone(), key.clone());
                                match st.left.lookup(&key) {
                                    Some(left_value) => {
                                        let derived =
                                            selector(&key, left_value, Some(&change.current));
                                        st.result.add_or_update(derived, key);
                                    }
                                    None => st.result.remove(&key),
                                }
                            }
                            ChangeReason::Remove => {
                                let key = right_key(&change.current);
                                st.right.remove(&key);
                                match st.left.lookup(&key) {
                                    Some(left_value) => {
                                        let derived = selector(&key, left_value, None);
                                        st.result.add_or_update(derived, key);
                                    }
                                    None => st.result.remove(&key),
                                }
                            }
                            ChangeReason::Refresh => {
                                let key = right_key(&change.current);
                                st.result.refresh(&key);
                            }
                            ChangeReason::Moved => {}
                        }
                    }
                    st.result.capture_changes()
                };
                emit_if_any(changes, &downstream_next);
            };
            let downstream_error = downstream.clone();
            let error_subs = subscriptions.clone();
            let downstream_complete = downstream;
            let complete_state = state;
            synchronize(&right, &lock).subscribe(CallbackObserver::new(
                next,
                move |error| {
                    error_subs.borrow_mut().dispose();
                    downstream_error.error(error);
                },
                move || {
                    let done = {
                        let mut st = complete_state.borrow_mut();
                        st.completed += 1;
                        st.completed == 2
                    };
                    if done {
                        downstream_complete.complete();
                    }
                },
            ))
        };
        subscriptions.borrow_mut().push(right_sub);

        Subscription::new(move || subscriptions.borrow_mut().dispose())
    })
}

/// Joins two keyed streams, keeping every key present on either side.
///
/// The selector sees `(key, Option<&L>, Option<&R>)`; a key leaves the
/// result only when both sides have dropped it.
pub fn full_join<L, R, KL, KR, D, RK, RS>(
    left: &CacheStream<L, KL>,
    right: &CacheStream<R, KR>,
    right_key: RK,
    selector: RS,
) -> CacheStream<D, KL>
where
    L: Clone + 'static,
    R: Clone + 'static,
    D: Clone + 'static,
    KL: Eq + Hash + Clone + Debug + 'static,
    KR: Eq + Hash + Clone + 'static,
    RK: Fn(&R) -> KL + 'static,
    RS: Fn(&KL, Option<&L>, Option<&R>) -> D + 'static,
{
    let left = left.clone();
    let right = right.clone();
    let right_key = Rc::new(right_key);
    let selector = Rc::new(selector);

    Observable::new(move |downstream| {
        let lock = EmissionLock::new();
        let state = Rc::new(RefCell::new(JoinState::<L, R, D, KL> {
            left: Cache::new(),
            right: Cache::new(),
            result: ChangeAwareCache::new(),
            completed: 0,
        }));
        let subscriptions: SharedSubscriptions = Rc::new(RefCell::new(SubscriptionSet::new()));

        let left_sub = {
            let value = state.clone();
            let downstream_next = downstream.clone();
            let selector = selector.clone();
            let subs = subscriptions.clone();
            let next = move |set: &ChangeSet<L, KL>| {
                let outcome = {
                    let mut st = value.borrow_mut();
                    let st = &mut *st;
                    match st.left.apply(set) {
                        Err(error) => Err(error),
                        Ok(()) => {
                            for change in set.iter() {
                                let key = &change.key;
                                match change.reason {
                                    ChangeReason::Add | ChangeReason::Update => {
                                        let derived = selector(
                                            key,
                                            Some(&change.current),
                                            st.right.lookup(key),
                                        );
                                        st.result.add_or_update(derived, key.clone());
                                    }
                                    ChangeReason::Remove => match st.right.lookup(key) {
                                        Some(right_value) => {
                                            let derived = selector(key, None, Some(right_value));
                                            st.result.add_or_update(derived, key.clone());
                                        }
                                        None => st.result.remove(key),
                                    },
                                    ChangeReason::Refresh => st.result.refresh(key),
                                    ChangeReason::Moved => {}
                                }
                            }
                            Ok(st.result.capture_changes())
                        }
                    }
                };
                match outcome {
                    Ok(changes) => emit_if_any(changes, &downstream_next),
                    Err(error) => {
                        subs.borrow_mut().dispose();
                        downstream_next.error(&error);
                    }
                }
            };
            let downstream_error = downstream.clone();
            let error_subs = subscriptions.clone();
            let downstream_complete = downstream.clone();
            let complete_state = state.clone();
            synchronize(&left, &lock).subscribe(CallbackObserver::new(
                next,
                move |error| {
                    error_subs.borrow_mut().dispose();
                    downstream_error.error(error);
                },
                move || {
                    let done = {
                        let mut st = complete_state.borrow_mut();
                        st.completed += 1;
                        st.completed == 2
                    };
                    if done {
                        downstream_complete.complete();
                    }
                },
            ))
        };
        subscriptions.borrow_mut().push(left_sub);

        let right_sub = {
            let value = state.clone();
            let downstream_next = downstream.clone();
            let selector = selector.clone();
            let right_key = right_key.clone();
            let next = move |set: &ChangeSet<R, KR>| {
                let changes = {
                    let mut st = value.borrow_mut();
                    let st = &mut *st;
                    for change in set.iter() {
                        match change.reason {
                            ChangeReason::Add | ChangeReason::Update => {
                                let key = right_key(&change.current);
                                if let Some(previous) = &change.previous {
                                    let old_key = right_key(previous);
                                    if old_key != key {
                                        st.right.remove(&old_key);
                                        match st.left.lookup(&old_key) {
                                            Some(left_value) => {
                                                let derived =
                                                    selector(&old_key, Some(left_value), None);
                                                st.result.add_or_update(derived, old_key);
                                            }
                                            None => st.result.remove(&old_key),
                                        }
                                    }
                                }
                                st.right.add_or_update(change.current.clone(), key.clone());
                                let derived = selector(
                                    &key,
                                    st.left.lookup(&key),
                                    Some(&change.current),
                                );
                                st.result.add_or_update(derived, key);
                            }
                            ChangeReason::Remove => {
                                let key = right_key(&change.current);
                                st.right.remove(&key);
                                match st.left.lookup(&key) {
                                    Some(left_value) => {
                                        let derived = selector(&key, Some(left_value), None);
                                        st.result.add_or_update(derived, key);
                                    }
                                    None => st.result.remove(&key),
                                }
                            }
                            ChangeReason::Refresh => {
                                let key = right_key(&change.current);
                                st.result.refresh(&key);
                            }
                            ChangeReason::Moved => {}
                        }
                    }
                    st.result.capture_changes()
                };
                emit_if_any(changes, &downstream_next);
            };
            let downstream_error = downstream.clone();
            let error_subs = subscriptions.clone();
            let downstream_complete = downstream;
            let complete_state = state;
            synchronize(&right, &lock).subscribe(CallbackObserver::new(
                next,
                move |error| {
                    error_subs.borrow_mut().dispose();
                    downstream_error.error(error);
                },
                move || {
                    let done = {
                        let mut st = complete_state.borrow_mut();
                        st.completed += 1;
                        st.completed == 2
                    };
                    if done {
                        downstream_complete.complete();
                    }
                },
            ))
        };
        subscriptions.borrow_mut().push(right_sub);

        Subscription::new(move || subscriptions.borrow_mut().dispose())
    })
}

/// Joins a keyed stream against whole groups of a second stream.
///
/// The right stream is grouped by `right_group_key` into immutable
/// [`Grouping`] snapshots, then full-joined, so the selector sees every
/// left key and every group key, with an empty group substituted where the
/// right side has no members for a key.
pub fn full_join_many<L, R, KL, KR, D, GK, RS>(
    left: &CacheStream<L, KL>,
    right: &CacheStream<R, KR>,
    right_group_key: GK,
    selector: RS,
) -> CacheStream<D, KL>
where
    L: Clone + 'static,
    R: Clone + 'static,
    D: Clone + 'static,
    KL: Eq + Hash + Clone + Debug + 'static,
    KR: Eq + Hash + Clone + Debug + 'static,
    GK: Fn(&R) -> KL + 'static,
    RS: Fn(&KL, Option<&L>, &Grouping<R, KR, KL>) -> D + 'static,
{
    let grouped = group_on(right, right_group_key);
    full_join(
        left,
        &grouped,
        |group: &Grouping<R, KR, KL>| group.key().clone(),
        move |key, left_value, group: Option<&Grouping<R, KR, KL>>| match group {
            Some(group) => selector(key, left_value, group),
            None => selector(key, left_value, &Grouping::empty(key.clone())),
        },
    )
}
