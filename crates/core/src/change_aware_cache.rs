//! A cache that records the deltas applied to it.
//!
//! Operators mutate a `ChangeAwareCache` while reacting to upstream change
//! sets, then drain the recorded deltas with [`capture_changes`] and forward
//! them downstream. Capturing and replaying the captured set against a
//! mirror of the pre-capture state reproduces the post-capture state.
//!
//! [`capture_changes`]: ChangeAwareCache::capture_changes

use crate::cache::Cache;
use crate::change::Change;
use crate::change_set::ChangeSet;
use crate::error::Result;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::Hash;

/// A keyed cache with a buffered delta log.
#[derive(Clone, Debug)]
pub struct ChangeAwareCache<T, K> {
    cache: Cache<T, K>,
    changes: Vec<Change<T, K>>,
}

impl<T, K> Default for ChangeAwareCache<T, K>
where
    T: Clone,
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K> ChangeAwareCache<T, K>
where
    T: Clone,
    K: Eq + Hash + Clone,
{
    /// Creates an empty cache with an empty delta log.
    pub fn new() -> Self {
        Self {
            cache: Cache::new(),
            changes: Vec::new(),
        }
    }

    /// Looks up a value without mutating.
    #[inline]
    pub fn lookup(&self, key: &K) -> Option<&T> {
        self.cache.lookup(key)
    }

    /// Returns true if the key is present.
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.cache.contains_key(key)
    }

    /// Returns the number of mappings.
    #[inline]
    pub fn len(&self) -> usize {
        self.cache.len()
    }

    /// Returns true if there are no mappings.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    /// Iterates the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.cache.keys()
    }

    /// Iterates key-value pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &T)> {
        self.cache.iter()
    }

    /// Writes a mapping, recording `Add` for a new key and `Update` (with
    /// the replaced value) for an existing one.
    pub fn add_or_update(&mut self, value: T, key: K) {
        let previous = self.cache.add_or_update(value.clone(), key.clone());
        match previous {
            None => self.changes.push(Change::add(key, value)),
            Some(prev) => self.changes.push(Change::update(key, value, prev)),
        }
    }

    /// Removes a mapping if present, recording `Remove` with the removed
    /// value. Removing an absent key records nothing.
    pub fn remove(&mut self, key: &K) {
        if let Some(removed) = self.cache.remove(key) {
            self.changes.push(Change::remove(key.clone(), removed));
        }
    }

    /// Records `Refresh` for a present key without changing storage.
    /// Refreshing an absent key records nothing.
    pub fn refresh(&mut self, key: &K) {
        if let Some(value) = self.cache.lookup(key) {
            self.changes.push(Change::refresh(key.clone(), value.clone()));
        }
    }

    /// Removes every mapping, recording one `Remove` per entry in insertion
    /// order.
    pub fn clear(&mut self) {
        for (key, value) in self.cache.clear() {
            self.changes.push(Change::remove(key, value));
        }
    }

    /// Drains the delta log into a change set whose order matches record
    /// order. Returns an empty sentinel set when nothing was recorded;
    /// callers must not emit empty sets downstream.
    pub fn capture_changes(&mut self) -> ChangeSet<T, K> {
        ChangeSet::from_changes(core::mem::take(&mut self.changes))
    }
}

impl<T, K> ChangeAwareCache<T, K>
where
    T: Clone,
    K: Eq + Hash + Clone + Debug,
{
    /// Applies an external change set to internal state without recording.
    ///
    /// Used when an operator mirrors an upstream source: the upstream deltas
    /// are already what the operator will forward, so logging them again
    /// would double-count.
    pub fn apply(&mut self, changes: &ChangeSet<T, K>) -> Result<()> {
        self.cache.apply(changes)
    }
}
