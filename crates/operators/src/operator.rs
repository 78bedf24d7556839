//! Shared plumbing for operator implementations.
//!
//! Every operator follows the same skeleton: its factory returns an
//! [`Observable`](rill_stream::Observable) whose subscription body
//!
//! 1. creates an `EmissionLock`, the operator state (mirror caches plus a
//!    result `ChangeAwareCache`) in an `Rc<RefCell<_>>`, and subscribes each
//!    upstream through `synchronize` on that one lock;
//! 2. reacts to each upstream change set by mutating state under a single
//!    borrow, capturing the result deltas, then emitting them *after* the
//!    borrow is released (so a re-entrant disposal from the observer cannot
//!    collide with the state cell);
//! 3. forwards the first upstream error after releasing its own resources,
//!    and completes downstream once the parent and all live inner upstreams
//!    have completed;
//! 4. returns its owned subscriptions as a `SubscriptionSet` collapsed into
//!    one idempotent `Subscription` (LIFO teardown).

use core::hash::Hash;
use rill_core::ChangeSet;
use rill_stream::Downstream;

/// Emits a captured change set unless it is the empty sentinel.
pub(crate) fn emit_if_any<T, K>(changes: ChangeSet<T, K>, downstream: &Downstream<ChangeSet<T, K>>)
where
    T: Clone,
    K: Eq + Hash + Clone,
{
    if !changes.is_empty() {
        downstream.next(&changes);
    }
}
