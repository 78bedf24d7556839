//! Keyed cache with insertion-order iteration.

use crate::change::ChangeReason;
use crate::change_set::ChangeSet;
use crate::error::{Error, Result};
use alloc::format;
use alloc::vec::Vec;
use core::fmt::Debug;
use core::hash::Hash;
use hashbrown::HashMap;

/// A keyed mapping with unique keys and predictable iteration order.
///
/// Iteration yields entries in the insertion order of the keys that are
/// still present. Updating an existing key keeps its position; removing and
/// re-adding a key moves it to the end.
#[derive(Clone, Debug)]
pub struct Cache<T, K> {
    map: HashMap<K, T>,
    order: Vec<K>,
}

impl<T, K> Default for Cache<T, K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K> Cache<T, K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self {
            map: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Looks up a value without mutating.
    #[inline]
    pub fn lookup(&self, key: &K) -> Option<&T> {
        self.map.get(key)
    }

    /// Returns true if the key is present.
    #[inline]
    pub fn contains_key(&self, key: &K) -> bool {
        self.map.contains_key(key)
    }

    /// Writes a mapping, returning the prior value if the key was present.
    pub fn add_or_update(&mut self, value: T, key: K) -> Option<T> {
        let previous = self.map.insert(key.clone(), value);
        if previous.is_none() {
            self.order.push(key);
        }
        previous
    }

    /// Removes a mapping, returning the removed value if the key was present.
    pub fn remove(&mut self, key: &K) -> Option<T> {
        let removed = self.map.remove(key);
        if removed.is_some() {
            if let Some(pos) = self.order.iter().position(|k| k == key) {
                self.order.remove(pos);
            }
        }
        removed
    }

    /// Removes every mapping, returning the evicted pairs in insertion order.
    pub fn clear(&mut self) -> Vec<(K, T)> {
        let order = core::mem::take(&mut self.order);
        let mut map = core::mem::take(&mut self.map);
        order
            .into_iter()
            .filter_map(|k| map.remove(&k).map(|v| (k, v)))
            .collect()
    }

    /// Returns the number of mappings.
    #[inline]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns true if there are no mappings.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates the keys in insertion order.
    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.order.iter()
    }

    /// Iterates key-value pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &T)> {
        self.order.iter().filter_map(|k| self.map.get(k).map(|v| (k, v)))
    }

    /// Iterates the values in insertion order.
    pub fn items(&self) -> impl Iterator<Item = &T> {
        self.order.iter().filter_map(|k| self.map.get(k))
    }
}

impl<T, K> Cache<T, K>
where
    T: Clone,
    K: Eq + Hash + Clone + Debug,
{
    /// Replays an external change set against this cache.
    ///
    /// `Update` or `Refresh` of an absent key means the sender and this
    /// mirror have diverged and is rejected. `Remove` of an absent key and
    /// `Moved` are no-ops for keyed state.
    pub fn apply(&mut self, changes: &ChangeSet<T, K>) -> Result<()> {
        for change in changes.iter() {
            match change.reason {
                ChangeReason::Add => {
                    self.add_or_update(change.current.clone(), change.key.clone());
                }
                ChangeReason::Update => {
                    if !self.contains_key(&change.key) {
                        return Err(Error::missing_key(format!(
                            "update replayed against absent key {:?}",
                            change.key
                        )));
                    }
                    self.add_or_update(change.current.clone(), change.key.clone());
                }
                ChangeReason::Remove => {
                    self.remove(&change.key);
                }
                ChangeReason::Refresh => {
                    if !self.contains_key(&change.key) {
                        return Err(Error::missing_key(format!(
                            "refresh replayed against absent key {:?}",
                            change.key
                        )));
                    }
                }
                ChangeReason::Moved => {}
            }
        }
        Ok(())
    }
}

impl<T, K> PartialEq for Cache<T, K>
where
    T: PartialEq,
    K: Eq + Hash + Clone,
{
    /// Equality is insertion-order sensitive, matching iteration.
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.iter().zip(other.iter()).all(|(a, b)| a == b)
    }
}
