//! Set combination across a dynamic collection of keyed sources.
//!
//! `combine` subscribes to an observable list of inner change-set streams
//! and maintains the result of a set operation over their current keys. A
//! key's membership is re-evaluated whenever any inner source reports a
//! change touching it, and whenever a source joins or leaves the list.

use crate::operator::emit_if_any;
use crate::{CacheStream, ListStream};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt::Debug;
use core::hash::Hash;
use hashbrown::HashSet;
use rill_core::{Cache, ChangeAwareCache, ChangeReason, ChangeSet, Error, ListChange, ListChangeSet};
use rill_stream::{
    synchronize, CallbackObserver, Downstream, EmissionLock, Observable, Subscription,
    SubscriptionSet,
};

/// The set operation applied over the inner sources.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CombineOperator {
    /// Keys present in every source.
    And,
    /// Keys present in any source.
    Or,
    /// Keys present in exactly one source.
    Xor,
    /// Keys present in the first source and no other.
    Except,
}

struct MergeContainer<T, K> {
    id: u64,
    cache: Cache<T, K>,
    subscription: Subscription,
    completed: bool,
}

struct CombineState<T, K> {
    containers: Vec<MergeContainer<T, K>>,
    result: ChangeAwareCache<T, K>,
    next_id: u64,
    /// While a parent list change is being applied, inner reactions buffer
    /// into the result cache instead of emitting, so the whole parent
    /// change yields one net change set.
    muted: bool,
    parent_completed: bool,
}

fn matches<T, K>(op: CombineOperator, key: &K, containers: &[MergeContainer<T, K>]) -> bool
where
    K: Eq + Hash + Clone,
{
    if containers.is_empty() {
        return false;
    }
    match op {
        CombineOperator::And => containers.iter().all(|c| c.cache.contains_key(key)),
        CombineOperator::Or => containers.iter().any(|c| c.cache.contains_key(key)),
        CombineOperator::Xor => {
            containers
                .iter()
                .filter(|c| c.cache.contains_key(key))
                .count()
                == 1
        }
        CombineOperator::Except => {
            containers[0].cache.contains_key(key)
                && !containers[1..].iter().any(|c| c.cache.contains_key(key))
        }
    }
}

/// The value stored for a matching key: taken from the first source (in
/// list order) that carries it.
fn value_of<T, K>(containers: &[MergeContainer<T, K>], key: &K) -> Option<T>
where
    T: Clone,
    K: Eq + Hash + Clone,
{
    containers.iter().find_map(|c| c.cache.lookup(key).cloned())
}

fn update_membership<T, K>(
    containers: &[MergeContainer<T, K>],
    result: &mut ChangeAwareCache<T, K>,
    op: CombineOperator,
    eq: &dyn Fn(&T, &T) -> bool,
    key: &K,
) where
    T: Clone,
    K: Eq + Hash + Clone,
{
    let should_be = matches(op, key, containers);
    if should_be {
        if let Some(value) = value_of(containers, key) {
            let changed = match result.lookup(key) {
                Some(cached) => !eq(cached, &value),
                None => true,
            };
            if changed {
                result.add_or_update(value, key.clone());
            }
        }
    } else if result.contains_key(key) {
        result.remove(key);
    }
}

fn all_keys<T, K>(containers: &[MergeContainer<T, K>]) -> Vec<K>
where
    K: Eq + Hash + Clone,
{
    let mut seen: HashSet<K> = HashSet::new();
    let mut keys = Vec::new();
    for container in containers {
        for key in container.cache.keys() {
            if seen.insert(key.clone()) {
                keys.push(key.clone());
            }
        }
    }
    keys
}

struct Combiner<T, K> {
    state: Rc<RefCell<CombineState<T, K>>>,
    downstream: Downstream<ChangeSet<T, K>>,
    lock: EmissionLock,
    eq: Rc<dyn Fn(&T, &T) -> bool>,
    op: CombineOperator,
}

impl<T, K> Clone for Combiner<T, K> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            downstream: self.downstream.clone(),
            lock: self.lock.clone(),
            eq: self.eq.clone(),
            op: self.op,
        }
    }
}

impl<T, K> Combiner<T, K>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + Debug + 'static,
{
    fn handle_parent(&self, set: &ListChangeSet<CacheStream<T, K>>) {
        {
            self.state.borrow_mut().muted = true;
        }
        for change in set.iter() {
            match change {
                ListChange::Add { item, index } => self.add_source(item.clone(), *index),
                ListChange::AddRange { items, index } => {
                    for (offset, item) in items.iter().enumerate() {
                        self.add_source(item.clone(), index + offset);
                    }
                }
                ListChange::Replace { item, index, .. } => {
                    self.remove_source(*index);
                    self.add_source(item.clone(), *index);
                }
                ListChange::Remove { index, .. } => self.remove_source(*index),
                ListChange::RemoveRange { items, index } => {
                    for _ in 0..items.len() {
                        self.remove_source(*index);
                    }
                }
                ListChange::Refresh { .. } => {}
                ListChange::Moved {
                    current_index,
                    previous_index,
                    ..
                } => self.move_source(*previous_index, *current_index),
                ListChange::Clear { .. } => {
                    while !self.state.borrow().containers.is_empty() {
                        self.remove_source(0);
                    }
                }
            }
        }
        let changes = {
            let mut st = self.state.borrow_mut();
            st.muted = false;
            st.result.capture_changes()
        };
        emit_if_any(changes, &self.downstream);
    }

    fn handle_inner(&self, id: u64, set: &ChangeSet<T, K>) {
        let outcome = {
            let mut st = self.state.borrow_mut();
            let st = &mut *st;
            let index = match st.containers.iter().position(|c| c.id == id) {
                Some(index) => index,
                None => return,
            };
            match st.containers[index].cache.apply(set) {
                Err(error) => Err(error),
                Ok(()) => {
                    for change in set.iter() {
                        match change.reason {
                            ChangeReason::Refresh => {
                                if st.result.contains_key(&change.key)
                                    && matches(self.op, &change.key, &st.containers)
                                {
                                    st.result.refresh(&change.key);
                                }
                            }
                            ChangeReason::Moved => {}
                            _ => update_membership(
                                &st.containers,
                                &mut st.result,
                                self.op,
                                &*self.eq,
                                &change.key,
                            ),
                        }
                    }
                    if st.muted {
                        Ok(None)
                    } else {
                        Ok(Some(st.result.capture_changes()))
                    }
                }
            }
        };
        match outcome {
            Ok(Some(changes)) => emit_if_any(changes, &self.downstream),
            Ok(None) => {}
            Err(error) => self.fail(&error),
        }
    }

    fn add_source(&self, source: CacheStream<T, K>, index: usize) {
        let id = {
            let mut st = self.state.borrow_mut();
            let id = st.next_id;
            st.next_id += 1;
            let at = index.min(st.containers.len());
            st.containers.insert(
                at,
                MergeContainer {
                    id,
                    cache: Cache::new(),
                    subscription: Subscription::empty(),
                    completed: false,
                },
            );
            id
        };

        // Subscribing replays the source's current state through
        // handle_inner, populating the mirror and the result buffer.
        let next = {
            let this = self.clone();
            move |set: &ChangeSet<T, K>| this.handle_inner(id, set)
        };
        let on_error = {
            let this = self.clone();
            move |error: &Error| this.fail(error)
        };
        let on_complete = {
            let this = self.clone();
            move || this.inner_done(id)
        };
        let subscription = synchronize(&source, &self.lock)
            .subscribe(CallbackObserver::new(next, on_error, on_complete));

        let mut st = self.state.borrow_mut();
        let st = &mut *st;
        if let Some(container) = st.containers.iter_mut().find(|c| c.id == id) {
            container.subscription = subscription;
        }
        // A new source can evict keys that matched before it joined.
        if matches!(self.op, CombineOperator::And | CombineOperator::Except) {
            let keys: Vec<K> = st.result.keys().cloned().collect();
            for key in &keys {
                update_membership(&st.containers, &mut st.result, self.op, &*self.eq, key);
            }
        }
    }

    fn remove_source(&self, index: usize) {
        let mut container = {
            let mut st = self.state.borrow_mut();
            if index >= st.containers.len() {
                return;
            }
            st.containers.remove(index)
        };
        container.subscription.dispose();

        let mut st = self.state.borrow_mut();
        let st = &mut *st;
        for key in container.cache.keys() {
            update_membership(&st.containers, &mut st.result, self.op, &*self.eq, key);
        }
        // A departed source can admit keys the remaining sources now agree
        // on.
        if matches!(self.op, CombineOperator::And | CombineOperator::Except) {
            let keys = all_keys(&st.containers);
            for key in &keys {
                update_membership(&st.containers, &mut st.result, self.op, &*self.eq, key);
            }
        }
    }

    fn move_source(&self, from: usize, to: usize) {
        let mut st = self.state.borrow_mut();
        if from >= st.containers.len() || from == to {
            return;
        }
        let container = st.containers.remove(from);
        let at = to.min(st.containers.len());
        st.containers.insert(at, container);

        // Source order is semantic for Except; re-evaluate everything.
        let st = &mut *st;
        let keys = all_keys(&st.containers);
        for key in &keys {
            update_membership(&st.containers, &mut st.result, self.op, &*self.eq, key);
        }
    }

    fn inner_done(&self, id: u64) {
        let done = {
            let mut st = self.state.borrow_mut();
            if let Some(container) = st.containers.iter_mut().find(|c| c.id == id) {
                container.completed = true;
            }
            st.parent_completed && st.containers.iter().all(|c| c.completed)
        };
        if done {
            self.downstream.complete();
        }
    }

    fn parent_done(&self) {
        let done = {
            let mut st = self.state.borrow_mut();
            st.parent_completed = true;
            st.containers.iter().all(|c| c.completed)
        };
        if done {
            self.downstream.complete();
        }
    }

    fn fail(&self, error: &Error) {
        self.teardown();
        self.downstream.error(error);
    }

    fn teardown(&self) {
        let containers = {
            let mut st = self.state.borrow_mut();
            core::mem::take(&mut st.containers)
        };
        for mut container in containers {
            container.subscription.dispose();
        }
    }
}

/// Combines a dynamic list of keyed sources with a custom update-suppression
/// equality.
///
/// The equality decides whether a re-evaluated key's value differs from the
/// cached one; equal values record no update.
pub fn combine_with<T, K, E>(
    sources: &ListStream<CacheStream<T, K>>,
    op: CombineOperator,
    eq: E,
) -> CacheStream<T, K>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + Debug + 'static,
    E: Fn(&T, &T) -> bool + 'static,
{
    let sources = sources.clone();
    let eq: Rc<dyn Fn(&T, &T) -> bool> = Rc::new(eq);
    Observable::new(move |downstream| {
        let combiner = Combiner {
            state: Rc::new(RefCell::new(CombineState {
                containers: Vec::new(),
                result: ChangeAwareCache::new(),
                next_id: 1,
                muted: false,
                parent_completed: false,
            })),
            downstream,
            lock: EmissionLock::new(),
            eq: eq.clone(),
            op,
        };

        let parent = {
            let next = {
                let this = combiner.clone();
                move |set: &ListChangeSet<CacheStream<T, K>>| this.handle_parent(set)
            };
            let on_error = {
                let this = combiner.clone();
                move |error: &Error| this.fail(error)
            };
            let on_complete = {
                let this = combiner.clone();
                move || this.parent_done()
            };
            synchronize(&sources, &combiner.lock)
                .subscribe(CallbackObserver::new(next, on_error, on_complete))
        };

        let mut subscriptions = SubscriptionSet::new();
        subscriptions.push(parent);
        let teardown = {
            let this = combiner;
            Subscription::new(move || this.teardown())
        };
        subscriptions.push(teardown);
        subscriptions.into_subscription()
    })
}

/// Combines a dynamic list of keyed sources, suppressing updates whose
/// values are structurally equal.
pub fn combine<T, K>(
    sources: &ListStream<CacheStream<T, K>>,
    op: CombineOperator,
) -> CacheStream<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Eq + Hash + Clone + Debug + 'static,
{
    combine_with(sources, op, |a: &T, b: &T| a == b)
}

/// Combines a fixed set of keyed sources.
pub fn combine_static<T, K>(sources: Vec<CacheStream<T, K>>, op: CombineOperator) -> CacheStream<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Eq + Hash + Clone + Debug + 'static,
{
    let parent = if sources.is_empty() {
        Observable::empty()
    } else {
        Observable::of_value(ListChangeSet::from_changes(alloc::vec![ListChange::AddRange {
            items: sources,
            index: 0,
        }]))
    };
    combine(&parent, op)
}

/// Keys present in every source.
pub fn and<T, K>(sources: &ListStream<CacheStream<T, K>>) -> CacheStream<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Eq + Hash + Clone + Debug + 'static,
{
    combine(sources, CombineOperator::And)
}

/// Keys present in any source.
pub fn or<T, K>(sources: &ListStream<CacheStream<T, K>>) -> CacheStream<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Eq + Hash + Clone + Debug + 'static,
{
    combine(sources, CombineOperator::Or)
}

/// Keys present in exactly one source.
pub fn xor<T, K>(sources: &ListStream<CacheStream<T, K>>) -> CacheStream<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Eq + Hash + Clone + Debug + 'static,
{
    combine(sources, CombineOperator::Xor)
}

/// Keys present in the first source and no other.
pub fn except<T, K>(sources: &ListStream<CacheStream<T, K>>) -> CacheStream<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Eq + Hash + Clone + Debug + 'static,
{
    combine(sources, CombineOperator::Except)
}
