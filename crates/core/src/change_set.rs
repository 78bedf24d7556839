//! Batched keyed change sets.
//!
//! A `ChangeSet` is a finite ordered sequence of [`Change`]s plus summary
//! counters derived from it. Replaying the changes in order against a mirror
//! of the sender's prior state reproduces the sender's current state, so the
//! order of the sequence is significant and must be preserved by operators.

use crate::change::{Change, ChangeReason};
use alloc::vec::Vec;
use core::slice;

/// An ordered batch of keyed changes with summary counters.
///
/// Counters are computed from the sequence, so they always equal the count
/// of matching reasons. Empty change sets exist as a sentinel returned by
/// `ChangeAwareCache::capture_changes`; they must never be emitted on a
/// stream.
#[derive(Clone, Debug, PartialEq)]
pub struct ChangeSet<T, K> {
    changes: Vec<Change<T, K>>,
}

impl<T, K> Default for ChangeSet<T, K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, K> ChangeSet<T, K> {
    /// Creates an empty change set.
    pub fn new() -> Self {
        Self { changes: Vec::new() }
    }

    /// Creates a change set from an ordered sequence of changes.
    pub fn from_changes(changes: Vec<Change<T, K>>) -> Self {
        Self { changes }
    }

    /// Appends a change, preserving order.
    pub fn push(&mut self, change: Change<T, K>) {
        self.changes.push(change);
    }

    /// Returns true if there are no changes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Returns the total number of changes.
    #[inline]
    pub fn total_changes(&self) -> usize {
        self.changes.len()
    }

    /// Iterates the changes in order.
    pub fn iter(&self) -> slice::Iter<'_, Change<T, K>> {
        self.changes.iter()
    }

    /// Returns the changes as a slice.
    #[inline]
    pub fn as_slice(&self) -> &[Change<T, K>] {
        &self.changes
    }

    fn count(&self, reason: ChangeReason) -> usize {
        self.changes.iter().filter(|c| c.reason == reason).count()
    }

    /// Number of `Add` changes.
    pub fn adds(&self) -> usize {
        self.count(ChangeReason::Add)
    }

    /// Number of `Update` changes.
    pub fn updates(&self) -> usize {
        self.count(ChangeReason::Update)
    }

    /// Number of `Remove` changes.
    pub fn removes(&self) -> usize {
        self.count(ChangeReason::Remove)
    }

    /// Number of `Refresh` changes.
    pub fn refreshes(&self) -> usize {
        self.count(ChangeReason::Refresh)
    }

    /// Number of `Moved` changes.
    pub fn moves(&self) -> usize {
        self.count(ChangeReason::Moved)
    }
}

impl<T, K> IntoIterator for ChangeSet<T, K> {
    type Item = Change<T, K>;
    type IntoIter = alloc::vec::IntoIter<Change<T, K>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a, T, K> IntoIterator for &'a ChangeSet<T, K> {
    type Item = &'a Change<T, K>;
    type IntoIter = slice::Iter<'a, Change<T, K>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}

impl<T, K> From<Vec<Change<T, K>>> for ChangeSet<T, K> {
    fn from(changes: Vec<Change<T, K>>) -> Self {
        Self::from_changes(changes)
    }
}

/// Auxiliary response describing the window a virtualizing consumer sees.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VirtualResponse {
    /// First index of the window.
    pub start_index: usize,
    /// Number of items in the window.
    pub size: usize,
}

/// A change set paired with a [`VirtualResponse`].
///
/// The wrapper forwards counters and iteration to the inner set verbatim;
/// it only adds the window metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct VirtualChangeSet<T, K> {
    /// Window metadata for the consumer.
    pub response: VirtualResponse,
    changes: ChangeSet<T, K>,
}

impl<T, K> VirtualChangeSet<T, K> {
    /// Wraps a change set with window metadata.
    pub fn new(changes: ChangeSet<T, K>, response: VirtualResponse) -> Self {
        Self { response, changes }
    }

    /// Returns the wrapped change set.
    #[inline]
    pub fn changes(&self) -> &ChangeSet<T, K> {
        &self.changes
    }

    /// Iterates the changes in order.
    pub fn iter(&self) -> slice::Iter<'_, Change<T, K>> {
        self.changes.iter()
    }

    /// Returns true if there are no changes.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Total number of changes in the wrapped set.
    #[inline]
    pub fn total_changes(&self) -> usize {
        self.changes.total_changes()
    }

    /// Number of `Add` changes in the wrapped set.
    pub fn adds(&self) -> usize {
        self.changes.adds()
    }

    /// Number of `Update` changes in the wrapped set.
    pub fn updates(&self) -> usize {
        self.changes.updates()
    }

    /// Number of `Remove` changes in the wrapped set.
    pub fn removes(&self) -> usize {
        self.changes.removes()
    }

    /// Number of `Refresh` changes in the wrapped set.
    pub fn refreshes(&self) -> usize {
        self.changes.refreshes()
    }

    /// Number of `Moved` changes in the wrapped set.
    pub fn moves(&self) -> usize {
        self.changes.moves()
    }
}
