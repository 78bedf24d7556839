//! Shared publication of a single upstream.
//!
//! Some operators need one upstream subscription multiplexed to several
//! internal consumers. [`publish`] returns a [`Connectable`]: inner
//! consumers subscribe to its [`observable`](Connectable::observable), and
//! [`connect`](Connectable::connect) establishes the single upstream
//! subscription. Every inner consumer sees the same sequence from the
//! moment the connection is established; disposing the connection releases
//! the upstream exactly once.

use crate::observable::Observable;
use crate::observer::CallbackObserver;
use crate::subject::Subject;
use crate::subscription::Subscription;
use alloc::rc::Rc;
use core::cell::{Cell, RefCell};

/// A published upstream awaiting connection.
pub struct Connectable<T> {
    source: Observable<T>,
    subject: Subject<T>,
    connection: Rc<RefCell<Option<Subscription>>>,
}

impl<T> Clone for Connectable<T> {
    fn clone(&self) -> Self {
        Self {
            source: self.source.clone(),
            subject: self.subject.clone(),
            connection: self.connection.clone(),
        }
    }
}

/// Publishes `source` through an internal subject.
pub fn publish<T: 'static>(source: &Observable<T>) -> Connectable<T> {
    Connectable {
        source: source.clone(),
        subject: Subject::new(),
        connection: Rc::new(RefCell::new(None)),
    }
}

impl<T: 'static> Connectable<T> {
    /// The multiplexed view inner consumers subscribe to.
    pub fn observable(&self) -> Observable<T> {
        self.subject.observable()
    }

    /// Establishes the upstream subscription if not yet connected.
    ///
    /// The returned handle disposes the shared connection; the upstream is
    /// released exactly once no matter how many handles are disposed.
    pub fn connect(&self) -> Subscription {
        let connected = self.connection.borrow().is_some();
        if !connected {
            log::debug!("publish: connecting upstream");
            let subject = self.subject.clone();
            let subject_error = self.subject.clone();
            let subject_complete = self.subject.clone();
            let sub = self.source.subscribe(CallbackObserver::new(
                move |value| subject.next(value),
                move |error| subject_error.error(error.clone()),
                move || subject_complete.complete(),
            ));
            *self.connection.borrow_mut() = Some(sub);
        }

        let connection = self.connection.clone();
        Subscription::new(move || {
            if let Some(mut sub) = connection.borrow_mut().take() {
                log::debug!("publish: disconnecting upstream");
                sub.dispose();
            }
        })
    }

    /// Returns true while the upstream subscription is live.
    pub fn is_connected(&self) -> bool {
        self.connection.borrow().is_some()
    }

    /// Connects on the first subscriber and disconnects on the last.
    pub fn ref_count(&self) -> Observable<T> {
        let this = self.clone();
        let count = Rc::new(Cell::new(0usize));
        // Shared across subscribers: the connection must survive the
        // departure of the subscriber that happened to establish it.
        let connection: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        Observable::new(move |downstream| {
            let mut inner = this.observable().subscribe_with(downstream);
            count.set(count.get() + 1);
            if count.get() == 1 {
                *connection.borrow_mut() = Some(this.connect());
            }

            let count = count.clone();
            let connection = connection.clone();
            Subscription::new(move || {
                inner.dispose();
                count.set(count.get() - 1);
                if count.get() == 0 {
                    if let Some(mut connection) = connection.borrow_mut().take() {
                        connection.dispose();
                    }
                }
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    /// An observable counting how many times it has been subscribed.
    fn counted_source(subscribes: Rc<Cell<usize>>, subject: &Subject<i32>) -> Observable<i32> {
        let inner = subject.observable();
        Observable::new(move |down| {
            subscribes.set(subscribes.get() + 1);
            inner.subscribe_with(down)
        })
    }

    #[test]
    fn test_publish_single_upstream_subscription() {
        let source_subject = Subject::new();
        let subscribes = Rc::new(Cell::new(0));
        let source = counted_source(subscribes.clone(), &source_subject);

        let shared = publish(&source);

        let seen_a = Rc::new(RefCell::new(Vec::new()));
        let seen_b = Rc::new(RefCell::new(Vec::new()));
        let sa = seen_a.clone();
        let sb = seen_b.clone();
        let _sub_a = shared.observable().subscribe_next(move |v: &i32| sa.borrow_mut().push(*v));
        let _sub_b = shared.observable().subscribe_next(move |v: &i32| sb.borrow_mut().push(*v));

        // Nothing flows before connection.
        source_subject.next(&1);
        assert!(seen_a.borrow().is_empty());
        assert_eq!(subscribes.get(), 0);

        let _connection = shared.connect();
        assert_eq!(subscribes.get(), 1);
        assert!(shared.is_connected());

        source_subject.next(&2);
        assert_eq!(*seen_a.borrow(), [2]);
        assert_eq!(*seen_b.borrow(), [2]);
    }

    #[test]
    fn test_connect_twice_subscribes_once() {
        let source_subject = Subject::new();
        let subscribes = Rc::new(Cell::new(0));
        let source = counted_source(subscribes.clone(), &source_subject);

        let shared = publish(&source);
        let _c1 = shared.connect();
        let _c2 = shared.connect();

        assert_eq!(subscribes.get(), 1);
    }

    #[test]
    fn test_disconnect_releases_upstream_exactly_once() {
        let source_subject = Subject::new();
        let shared = publish(&source_subject.observable());

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let _sub = shared.observable().subscribe_next(move |v: &i32| {
            seen_clone.borrow_mut().push(*v);
        });

        let mut connection = shared.connect();
        source_subject.next(&1);

        connection.dispose();
        connection.dispose();
        assert!(!shared.is_connected());

        source_subject.next(&2);
        assert_eq!(*seen.borrow(), [1]);
    }

    #[test]
    fn test_ref_count_connects_and_disconnects() {
        let source_subject = Subject::new();
        let subscribes = Rc::new(Cell::new(0));
        let source = counted_source(subscribes.clone(), &source_subject);

        let shared = publish(&source).ref_count();

        let sub_a = shared.subscribe_next(|_: &i32| {});
        assert_eq!(subscribes.get(), 1);

        let sub_b = shared.subscribe_next(|_: &i32| {});
        assert_eq!(subscribes.get(), 1);

        drop(sub_a);
        // One subscriber left: upstream stays connected.
        assert_eq!(source_subject.observer_count(), 1);

        drop(sub_b);
        // Last subscriber gone: upstream released.
        assert_eq!(source_subject.observer_count(), 0);
    }
}
