//! Rill Stream - the push-based stream primitive rill operators compose over.
//!
//! This crate implements the abstract stream contract the operator layer is
//! written against: observers receive `on_next` values and at most one
//! terminal `on_error` or `on_complete`; subscriptions are disposed
//! idempotently and on drop; subjects multicast to many observers; and the
//! synchronization seams (emission locks, shared publication) that
//! multi-source operators rely on.
//!
//! # Core Concepts
//!
//! - `Observer` / `CallbackObserver`: the receiving side of a stream
//! - `Observable`: a cloneable subscription factory
//! - `Downstream`: the guarded handle operators emit through
//! - `Subject`: multicast emitter with terminal-state latching
//! - `Subscription` / `SubscriptionSet`: idempotent, LIFO teardown
//! - `EmissionLock` / `synchronize`: the serializing decorator shared by all
//!   upstreams of a multi-source operator
//! - `publish` / `Connectable`: exactly-once upstream connection multiplexed
//!   to many inner consumers
//! - `monitor_status`: surfaces the lifecycle of any stream
//!
//! # Example
//!
//! ```ignore
//! use rill_stream::Subject;
//!
//! let subject = Subject::new();
//! let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
//! let seen_clone = seen.clone();
//!
//! let sub = subject.observable().subscribe_next(move |v: &i32| {
//!     seen_clone.borrow_mut().push(*v);
//! });
//!
//! subject.next(&1);
//! subject.next(&2);
//! drop(sub);
//! subject.next(&3); // not observed
//! ```

#![no_std]

extern crate alloc;

pub mod observable;
pub mod observer;
pub mod publish;
pub mod status;
pub mod subject;
pub mod subscription;
pub mod sync;

pub use observable::Observable;
pub use observer::{CallbackObserver, Downstream, Observer, ObserverRef};
pub use publish::{publish, Connectable};
pub use status::{monitor_status, ConnectionStatus};
pub use subject::Subject;
pub use subscription::{Subscription, SubscriptionSet};
pub use sync::{synchronize, EmissionGuard, EmissionLock};

// Re-export commonly used types from dependencies
pub use rill_core::{Error, Result};
