//! Keyed source collection.
//!
//! A `SourceCache` is the mutable entry point of a keyed pipeline: callers
//! mutate it through transactional [`edit`](SourceCache::edit) batches, and
//! every edit publishes one change set to the streams obtained from
//! [`connect`](SourceCache::connect).

use crate::CacheStream;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::hash::Hash;
use hashbrown::HashSet;
use rill_core::{Change, ChangeAwareCache, ChangeSet};
use rill_stream::{Observable, Subject};

/// A mutable keyed collection publishing change sets.
///
/// The key of every item is derived by the key selector supplied at
/// construction, so callers never pass keys explicitly for upserts.
pub struct SourceCache<T, K> {
    cache: Rc<RefCell<ChangeAwareCache<T, K>>>,
    subject: Subject<ChangeSet<T, K>>,
    key_selector: Rc<dyn Fn(&T) -> K>,
}

impl<T, K> Clone for SourceCache<T, K> {
    fn clone(&self) -> Self {
        Self {
            cache: self.cache.clone(),
            subject: self.subject.clone(),
            key_selector: self.key_selector.clone(),
        }
    }
}

impl<T, K> SourceCache<T, K>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + 'static,
{
    /// Creates an empty source cache with the given key selector.
    pub fn new<S>(key_selector: S) -> Self
    where
        S: Fn(&T) -> K + 'static,
    {
        Self {
            cache: Rc::new(RefCell::new(ChangeAwareCache::new())),
            subject: Subject::new(),
            key_selector: Rc::new(key_selector),
        }
    }

    /// Runs a transactional batch of mutations.
    ///
    /// All mutations performed by `edit` are captured as a single change
    /// set, published once after the batch completes. Batches that change
    /// nothing publish nothing.
    pub fn edit<F>(&self, edit: F)
    where
        F: FnOnce(&mut CacheUpdater<'_, T, K>),
    {
        let changes = {
            let mut cache = self.cache.borrow_mut();
            let mut updater = CacheUpdater {
                cache: &mut cache,
                key_selector: &*self.key_selector,
            };
            edit(&mut updater);
            cache.capture_changes()
        };
        if !changes.is_empty() {
            self.subject.next(&changes);
        }
    }

    /// Upserts one item as a single-change batch.
    pub fn add_or_update(&self, item: T) {
        self.edit(|cache| cache.add_or_update(item));
    }

    /// Removes one key as a single-change batch.
    pub fn remove(&self, key: &K) {
        self.edit(|cache| cache.remove(key));
    }

    /// Refreshes one key as a single-change batch.
    pub fn refresh(&self, key: &K) {
        self.edit(|cache| cache.refresh(key));
    }

    /// Removes everything as a single batch.
    pub fn clear(&self) {
        self.edit(|cache| cache.clear());
    }

    /// Replaces the cache contents with `items`, emitting the minimal diff.
    ///
    /// Keys present in the cache but absent from `items` are removed first;
    /// then `items` are upserted in enumeration order, recording an update
    /// only where `eq` reports the stored and incoming values unequal.
    /// The whole operation is one transactional edit yielding one change
    /// set.
    pub fn edit_diff<I, E>(&self, items: I, eq: E)
    where
        I: IntoIterator<Item = T>,
        E: Fn(&T, &T) -> bool,
    {
        self.edit(|cache| cache.edit_diff(items, &eq));
    }

    /// The change-set stream of this cache.
    ///
    /// Each subscription first receives the current state as one
    /// adds-only change set (when non-empty), then every subsequent edit.
    pub fn connect(&self) -> CacheStream<T, K> {
        let cache = self.cache.clone();
        let live = self.subject.observable();
        Observable::new(move |downstream| {
            let initial = {
                let cache = cache.borrow();
                let mut changes = ChangeSet::new();
                for (key, value) in cache.iter() {
                    changes.push(Change::add(key.clone(), value.clone()));
                }
                changes
            };
            if !initial.is_empty() {
                downstream.next(&initial);
            }
            live.subscribe_with(downstream)
        })
    }

    /// Looks up a value by key.
    pub fn lookup(&self, key: &K) -> Option<T> {
        self.cache.borrow().lookup(key).cloned()
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.cache.borrow().len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.borrow().is_empty()
    }

    /// Snapshot of the keys in insertion order.
    pub fn keys(&self) -> Vec<K> {
        self.cache.borrow().keys().cloned().collect()
    }

    /// Snapshot of the key-value pairs in insertion order.
    pub fn items(&self) -> Vec<(K, T)> {
        self.cache
            .borrow()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

/// Mutation surface handed to [`SourceCache::edit`] batches.
pub struct CacheUpdater<'a, T, K> {
    cache: &'a mut ChangeAwareCache<T, K>,
    key_selector: &'a dyn Fn(&T) -> K,
}

impl<'a, T, K> CacheUpdater<'a, T, K>
where
    T: Clone,
    K: Eq + Hash + Clone,
{
    /// Upserts an item under its derived key.
    pub fn add_or_update(&mut self, item: T) {
        let key = (self.key_selector)(&item);
        self.cache.add_or_update(item, key);
    }

    /// Removes a key if present.
    pub fn remove(&mut self, key: &K) {
        self.cache.remove(key);
    }

    /// Signals that the value under `key` changed observably.
    pub fn refresh(&mut self, key: &K) {
        self.cache.refresh(key);
    }

    /// Removes every item.
    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Looks up a value by key.
    pub fn lookup(&self, key: &K) -> Option<&T> {
        self.cache.lookup(key)
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns true if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Diffs the cache against `items`; see [`SourceCache::edit_diff`].
    pub fn edit_diff<I, E>(&mut self, items: I, eq: &E)
    where
        I: IntoIterator<Item = T>,
        E: Fn(&T, &T) -> bool,
    {
        let incoming: Vec<(K, T)> = items
            .into_iter()
            .map(|item| ((self.key_selector)(&item), item))
            .collect();
        let incoming_keys: HashSet<K> = incoming.iter().map(|(key, _)| key.clone()).collect();

        // Removes first, then upserts, to bound intermediate size.
        let stale: Vec<K> = self
            .cache
            .keys()
            .filter(|key| !incoming_keys.contains(*key))
            .cloned()
            .collect();
        for key in &stale {
            self.cache.remove(key);
        }

        for (key, item) in incoming {
            match self.cache.lookup(&key) {
                Some(existing) if eq(existing, &item) => {}
                _ => self.cache.add_or_update(item, key),
            }
        }
    }
}
