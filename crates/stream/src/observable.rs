//! Cloneable subscription factories.

use crate::observer::{CallbackObserver, Downstream, Observer};
use crate::subscription::Subscription;
use alloc::rc::Rc;
use core::cell::RefCell;
use rill_core::Error;

/// A push-based stream: subscribing wires an observer to a producer and
/// returns the subscription owning the teardown.
///
/// `Observable` is a thin handle around its subscription factory, so it is
/// cheap to clone and a single definition can be subscribed many times,
/// each subscription getting fresh state.
pub struct Observable<T> {
    on_subscribe: Rc<dyn Fn(Downstream<T>) -> Subscription>,
}

impl<T> Clone for Observable<T> {
    fn clone(&self) -> Self {
        Self {
            on_subscribe: self.on_subscribe.clone(),
        }
    }
}

impl<T: 'static> Observable<T> {
    /// Creates an observable from a subscription factory.
    pub fn new<F>(on_subscribe: F) -> Self
    where
        F: Fn(Downstream<T>) -> Subscription + 'static,
    {
        Self {
            on_subscribe: Rc::new(on_subscribe),
        }
    }

    /// Subscribes an already-guarded downstream handle.
    ///
    /// This is the primitive operators chain with; most callers want
    /// [`subscribe`](Self::subscribe).
    pub fn subscribe_with(&self, downstream: Downstream<T>) -> Subscription {
        (self.on_subscribe)(downstream)
    }

    /// Subscribes an observer. Disposing the returned subscription silences
    /// the observer first, then releases the upstream.
    pub fn subscribe<O>(&self, observer: O) -> Subscription
    where
        O: Observer<T> + 'static,
    {
        let downstream = Downstream::new(Rc::new(RefCell::new(observer)));
        let mut upstream = self.subscribe_with(downstream.clone());
        Subscription::new(move || {
            downstream.mark_done();
            upstream.dispose();
        })
    }

    /// Subscribes a value-only callback.
    pub fn subscribe_next<N>(&self, next: N) -> Subscription
    where
        N: FnMut(&T) + 'static,
    {
        self.subscribe(CallbackObserver::of_next(next))
    }

    /// Subscribes three callbacks.
    pub fn subscribe_all<N, E, C>(&self, next: N, error: E, complete: C) -> Subscription
    where
        N: FnMut(&T) + 'static,
        E: FnMut(&Error) + 'static,
        C: FnMut() + 'static,
    {
        self.subscribe(CallbackObserver::new(next, error, complete))
    }

    /// An observable that emits one value and completes.
    pub fn of_value(value: T) -> Self {
        Observable::new(move |down| {
            down.next(&value);
            down.complete();
            Subscription::empty()
        })
    }

    /// An observable that completes immediately without emitting.
    pub fn empty() -> Self {
        Observable::new(|down| {
            down.complete();
            Subscription::empty()
        })
    }

    /// Suppresses consecutive equal values.
    pub fn distinct_until_changed(&self) -> Observable<T>
    where
        T: Clone + PartialEq,
    {
        let source = self.clone();
        Observable::new(move |down| {
            let last: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));
            let d_err = down.clone();
            let d_done = down.clone();
            source.subscribe(CallbackObserver::new(
                move |value: &T| {
                    let mut last = last.borrow_mut();
                    if last.as_ref() != Some(value) {
                        *last = Some(value.clone());
                        down.next(value);
                    }
                },
                move |error| d_err.error(error),
                move || d_done.complete(),
            ))
        })
    }
}
