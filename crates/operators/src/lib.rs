//! Rill Operators - turns mutable collections into streams of change sets
//! and derives new collections from them incrementally.
//!
//! Sources publish [`ChangeSet`]s describing their mutations; operators
//! subscribe, fold the changes into operator-owned caches, and publish
//! derived change sets; sinks materialize the final state. Nothing is ever
//! recomputed from scratch.
//!
//! # Core Concepts
//!
//! - `SourceCache` / `SourceList`: mutable collections with transactional
//!   `edit` and a `connect()` change-set stream
//! - `MaterializedCache` / `MaterializedList`: sinks maintaining a view
//! - `combine` (And/Or/Xor/Except), `left_join`, `full_join`,
//!   `full_join_many`, `group_on`, `merge_many`, `maximum`/`minimum`,
//!   `count`/`sum`: the operators
//!
//! # Example
//!
//! ```ignore
//! use rill_operators::{SourceCache, MaterializedCache};
//!
//! let people = SourceCache::new(|p: &Person| p.id);
//! let view = MaterializedCache::new(&people.connect());
//!
//! people.edit(|cache| {
//!     cache.add_or_update(Person { id: 1, name: "Alice".into() });
//!     cache.add_or_update(Person { id: 2, name: "Bob".into() });
//! });
//!
//! assert_eq!(view.len(), 2);
//! ```

#![no_std]

extern crate alloc;

pub mod aggregate;
pub mod combine;
pub mod group;
pub mod join;
pub mod materialize;
pub mod merge_many;
mod operator;
pub mod source_cache;
pub mod source_list;

pub use aggregate::{count, maximum, minimum, sum};
pub use combine::{and, combine, combine_static, combine_with, except, or, xor, CombineOperator};
pub use group::group_on;
pub use join::{full_join, full_join_many, left_join};
pub use materialize::{MaterializedCache, MaterializedList};
pub use merge_many::merge_many;
pub use source_cache::{CacheUpdater, SourceCache};
pub use source_list::{ListUpdater, SourceList};

// Re-export commonly used types from dependencies
pub use rill_core::{
    Cache, Change, ChangeAwareCache, ChangeReason, ChangeSet, Error, Grouping, ListChange,
    ListChangeSet, Result,
};
pub use rill_stream::Observable;

/// A stream of keyed change sets.
pub type CacheStream<T, K> = Observable<ChangeSet<T, K>>;

/// A stream of ordered-list change sets.
pub type ListStream<T> = Observable<ListChangeSet<T>>;
