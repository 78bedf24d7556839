//! Rill Core - change primitives for reactive collections.
//!
//! This crate defines the data model shared by every rill operator: the
//! delta records describing a single mutation of a keyed or ordered
//! collection, the batched `ChangeSet` emitted on streams, and the caches
//! operators fold those change sets into.
//!
//! # Core Concepts
//!
//! - `Change` / `ListChange`: one delta against a keyed or ordered collection
//! - `ChangeSet` / `ListChangeSet`: an ordered batch of deltas with summary counters
//! - `Cache`: keyed storage with insertion-order iteration
//! - `ChangeAwareCache`: a cache that records the deltas applied to it and
//!   drains them as a `ChangeSet`
//! - `Grouping`: an immutable snapshot of a keyed sub-cache with its group key
//!
//! # Example
//!
//! ```ignore
//! use rill_core::ChangeAwareCache;
//!
//! let mut cache = ChangeAwareCache::new();
//! cache.add_or_update("alice", 1);
//! cache.add_or_update("alan", 1);
//! cache.remove(&1);
//!
//! let changes = cache.capture_changes();
//! assert_eq!(changes.adds(), 1);
//! assert_eq!(changes.updates(), 1);
//! assert_eq!(changes.removes(), 1);
//! ```

#![no_std]

extern crate alloc;

pub mod cache;
pub mod change;
pub mod change_aware_cache;
pub mod change_set;
pub mod error;
pub mod grouping;
pub mod list_change;

pub use cache::Cache;
pub use change::{Change, ChangeReason};
pub use change_aware_cache::ChangeAwareCache;
pub use change_set::{ChangeSet, VirtualChangeSet, VirtualResponse};
pub use error::{Error, Result};
pub use grouping::Grouping;
pub use list_change::{ListChange, ListChangeSet};
