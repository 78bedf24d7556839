//! Keyed change primitives.
//!
//! A `Change` describes one mutation of a keyed collection: what happened
//! (`ChangeReason`), to which key, the value after the change, and, for
//! updates, the value before it.

use core::fmt;

/// The kind of mutation a keyed [`Change`] describes.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChangeReason {
    /// A new key was added.
    Add,
    /// An existing key received a new value.
    Update,
    /// A key was removed.
    Remove,
    /// Observable properties of the value changed without a new value.
    Refresh,
    /// The item moved position in an ordered projection.
    Moved,
}

/// A single delta against a keyed collection.
///
/// `previous` is populated for `Update` only; `Remove` and `Refresh` carry
/// the affected value in `current`. The index pair is populated for `Moved`.
#[derive(Clone, Debug, PartialEq)]
pub struct Change<T, K> {
    /// What happened.
    pub reason: ChangeReason,
    /// The key the change applies to.
    pub key: K,
    /// The value after the change (for `Remove`, the removed value).
    pub current: T,
    /// The value before the change, for `Update`.
    pub previous: Option<T>,
    /// Position after the change, for `Moved`.
    pub current_index: Option<usize>,
    /// Position before the change, for `Moved`.
    pub previous_index: Option<usize>,
}

impl<T, K> Change<T, K> {
    /// Creates an `Add` change.
    pub fn add(key: K, current: T) -> Self {
        Self {
            reason: ChangeReason::Add,
            key,
            current,
            previous: None,
            current_index: None,
            previous_index: None,
        }
    }

    /// Creates an `Update` change carrying the replaced value.
    pub fn update(key: K, current: T, previous: T) -> Self {
        Self {
            reason: ChangeReason::Update,
            key,
            current,
            previous: Some(previous),
            current_index: None,
            previous_index: None,
        }
    }

    /// Creates a `Remove` change carrying the removed value.
    pub fn remove(key: K, current: T) -> Self {
        Self {
            reason: ChangeReason::Remove,
            key,
            current,
            previous: None,
            current_index: None,
            previous_index: None,
        }
    }

    /// Creates a `Refresh` change carrying the refreshed value.
    pub fn refresh(key: K, current: T) -> Self {
        Self {
            reason: ChangeReason::Refresh,
            key,
            current,
            previous: None,
            current_index: None,
            previous_index: None,
        }
    }

    /// Creates a `Moved` change with both positions.
    pub fn moved(key: K, current: T, current_index: usize, previous_index: usize) -> Self {
        Self {
            reason: ChangeReason::Moved,
            key,
            current,
            previous: None,
            current_index: Some(current_index),
            previous_index: Some(previous_index),
        }
    }
}

impl<T: fmt::Debug, K: fmt::Debug> fmt::Display for Change<T, K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} {:?}: {:?}", self.reason, self.key, self.current)
    }
}
