//! Materialized sinks.
//!
//! Sinks subscribe to a change-set stream and maintain the final state for
//! readers outside the pipeline. They are the only components that hold
//! state *not* owned by an operator subscription, which is why they own
//! their subscription instead and release it on drop.

use crate::{CacheStream, ListStream};
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt::Debug;
use core::hash::Hash;
use rill_core::{Cache, Error, ListChange};
use rill_stream::Subscription;

/// A keyed view maintained from a change-set stream.
pub struct MaterializedCache<T, K> {
    state: Rc<RefCell<Cache<T, K>>>,
    failure: Rc<RefCell<Option<Error>>>,
    _subscription: Subscription,
}

impl<T, K> MaterializedCache<T, K>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + Debug + 'static,
{
    /// Subscribes to `source` and folds every change set into the view.
    pub fn new(source: &CacheStream<T, K>) -> Self {
        let state = Rc::new(RefCell::new(Cache::new()));
        let failure: Rc<RefCell<Option<Error>>> = Rc::new(RefCell::new(None));

        let apply_state = state.clone();
        let apply_failure = failure.clone();
        let error_failure = failure.clone();
        let subscription = source.subscribe_all(
            move |changes| {
                if apply_failure.borrow().is_some() {
                    return;
                }
                if let Err(error) = apply_state.borrow_mut().apply(changes) {
                    log::warn!("materialized cache rejected change set: {}", error);
                    *apply_failure.borrow_mut() = Some(error);
                }
            },
            move |error| {
                *error_failure.borrow_mut() = Some(error.clone());
            },
            || {},
        );

        Self {
            state,
            failure,
            _subscription: subscription,
        }
    }

    /// Looks up a value by key.
    pub fn lookup(&self, key: &K) -> Option<T> {
        self.state.borrow().lookup(key).cloned()
    }

    /// Returns the number of items in the view.
    pub fn len(&self) -> usize {
        self.state.borrow().len()
    }

    /// Returns true if the view is empty.
    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    /// Snapshot of the keys in insertion order.
    pub fn keys(&self) -> Vec<K> {
        self.state.borrow().keys().cloned().collect()
    }

    /// Snapshot of the key-value pairs in insertion order.
    pub fn items(&self) -> Vec<(K, T)> {
        self.state
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// The terminal error, if the upstream faulted or a replay was rejected.
    pub fn failure(&self) -> Option<Error> {
        self.failure.borrow().clone()
    }
}

/// An ordered view maintained from a list change-set stream.
pub struct MaterializedList<T> {
    state: Rc<RefCell<Vec<T>>>,
    failure: Rc<RefCell<Option<Error>>>,
    _subscription: Subscription,
}

impl<T> MaterializedList<T>
where
    T: Clone + 'static,
{
    /// Subscribes to `source` and folds every change set into the view.
    ///
    /// Out-of-range indices are clamped rather than rejected; the keyed
    /// replay errors have no positional counterpart.
    pub fn new(source: &ListStream<T>) -> Self {
        let state: Rc<RefCell<Vec<T>>> = Rc::new(RefCell::new(Vec::new()));
        let failure: Rc<RefCell<Option<Error>>> = Rc::new(RefCell::new(None));

        let apply_state = state.clone();
        let error_failure = failure.clone();
        let subscription = source.subscribe_all(
            move |changes: &rill_core::ListChangeSet<T>| {
                let mut items = apply_state.borrow_mut();
                for change in changes.iter() {
                    apply_list_change(&mut items, change);
                }
            },
            move |error| {
                *error_failure.borrow_mut() = Some(error.clone());
            },
            || {},
        );

        Self {
            state,
            failure,
            _subscription: subscription,
        }
    }

    /// Returns the number of items in the view.
    pub fn len(&self) -> usize {
        self.state.borrow().len()
    }

    /// Returns true if the view is empty.
    pub fn is_empty(&self) -> bool {
        self.state.borrow().is_empty()
    }

    /// Returns the item at `index`.
    pub fn get(&self, index: usize) -> Option<T> {
        self.state.borrow().get(index).cloned()
    }

    /// Snapshot of the current items.
    pub fn items(&self) -> Vec<T> {
        self.state.borrow().clone()
    }

    /// The terminal error, if the upstream faulted.
    pub fn failure(&self) -> Option<Error> {
        self.failure.borrow().clone()
    }
}

fn apply_list_change<T: Clone>(items: &mut Vec<T>, change: &ListChange<T>) {
    match change {
        ListChange::Add { item, index } => {
            let at = (*index).min(items.len());
            items.insert(at, item.clone());
        }
        ListChange::AddRange { items: block, index } => {
            let at = (*index).min(items.len());
            for (offset, item) in block.iter().enumerate() {
                items.insert(at + offset, item.clone());
            }
        }
        ListChange::Replace { item, index, .. } => {
            if let Some(slot) = items.get_mut(*index) {
                *slot = item.clone();
            }
        }
        ListChange::Remove { index, .. } => {
            if *index < items.len() {
                items.remove(*index);
            }
        }
        ListChange::RemoveRange { items: block, index } => {
            let start = (*index).min(items.len());
            let end = (start + block.len()).min(items.len());
            items.drain(start..end);
        }
        ListChange::Refresh { .. } => {}
        ListChange::Moved {
            current_index,
            previous_index,
            ..
        } => {
            if *previous_index < items.len() {
                let item = items.remove(*previous_index);
                let at = (*current_index).min(items.len());
                items.insert(at, item);
            }
        }
        ListChange::Clear { .. } => items.clear(),
    }
}
