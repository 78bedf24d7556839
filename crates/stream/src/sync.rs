//! Emission locks and the synchronizing decorator.
//!
//! Every multi-source operator creates one [`EmissionLock`] per subscription
//! and wraps each of its upstreams with [`synchronize`] on that lock before
//! subscribing, so deliveries from all of its upstreams are funneled through
//! a single serialization point and downstream observers see a total order.
//!
//! The runtime is single-threaded cooperative, so the lock is re-entrant
//! depth accounting rather than a blocking mutex: nested delivery (an
//! upstream emitting while a synchronized handler is on the stack) is legal
//! and observable via [`EmissionLock::depth`]. Disposal actions never take
//! the lock, so disposing during an in-flight emission cannot deadlock.

use crate::observable::Observable;
use crate::observer::CallbackObserver;
use alloc::rc::Rc;
use core::cell::Cell;

/// A shared serialization point for the upstreams of one operator.
#[derive(Default)]
pub struct EmissionLock {
    depth: Rc<Cell<usize>>,
}

impl Clone for EmissionLock {
    fn clone(&self) -> Self {
        Self {
            depth: self.depth.clone(),
        }
    }
}

impl EmissionLock {
    /// Creates a lock held by nobody.
    pub fn new() -> Self {
        Self {
            depth: Rc::new(Cell::new(0)),
        }
    }

    /// Acquires the lock for the lifetime of the returned guard.
    pub fn acquire(&self) -> EmissionGuard {
        self.depth.set(self.depth.get() + 1);
        EmissionGuard {
            depth: self.depth.clone(),
        }
    }

    /// Current acquisition depth. Greater than one means nested delivery.
    #[inline]
    pub fn depth(&self) -> usize {
        self.depth.get()
    }

    /// Returns true while any guard is alive.
    #[inline]
    pub fn is_held(&self) -> bool {
        self.depth.get() > 0
    }
}

/// Guard returned by [`EmissionLock::acquire`].
pub struct EmissionGuard {
    depth: Rc<Cell<usize>>,
}

impl Drop for EmissionGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get() - 1);
    }
}

/// Funnels every emission of `source` through `lock`.
pub fn synchronize<T: 'static>(source: &Observable<T>, lock: &EmissionLock) -> Observable<T> {
    let source = source.clone();
    let lock = lock.clone();
    Observable::new(move |downstream| {
        let lock_next = lock.clone();
        let lock_error = lock.clone();
        let lock_complete = lock.clone();
        let down_error = downstream.clone();
        let down_complete = downstream.clone();
        source.subscribe(CallbackObserver::new(
            move |value| {
                let _guard = lock_next.acquire();
                downstream.next(value);
            },
            move |error| {
                let _guard = lock_error.acquire();
                down_error.error(error);
            },
            move || {
                let _guard = lock_complete.acquire();
                down_complete.complete();
            },
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subject::Subject;
    use alloc::rc::Rc;
    use alloc::vec::Vec;
    use core::cell::RefCell;

    #[test]
    fn test_lock_depth_tracks_guards() {
        let lock = EmissionLock::new();
        assert!(!lock.is_held());

        let outer = lock.acquire();
        assert_eq!(lock.depth(), 1);
        {
            let _inner = lock.acquire();
            assert_eq!(lock.depth(), 2);
        }
        assert_eq!(lock.depth(), 1);

        drop(outer);
        assert!(!lock.is_held());
    }

    #[test]
    fn test_synchronize_forwards_values() {
        let subject = Subject::new();
        let lock = EmissionLock::new();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = seen.clone();
        let _sub = synchronize(&subject.observable(), &lock)
            .subscribe_next(move |v: &i32| seen_clone.borrow_mut().push(*v));

        subject.next(&1);
        subject.next(&2);

        assert_eq!(*seen.borrow(), [1, 2]);
        assert!(!lock.is_held());
    }

    #[test]
    fn test_synchronize_holds_lock_during_delivery() {
        let subject = Subject::new();
        let lock = EmissionLock::new();

        let observed_depth = Rc::new(RefCell::new(0));
        let observed_clone = observed_depth.clone();
        let probe = lock.clone();
        let _sub = synchronize(&subject.observable(), &lock).subscribe_next(move |_: &i32| {
            *observed_clone.borrow_mut() = probe.depth();
        });

        subject.next(&1);

        assert_eq!(*observed_depth.borrow(), 1);
        assert!(!lock.is_held());
    }

    #[test]
    fn test_synchronize_shares_one_lock_across_sources() {
        let a = Subject::new();
        let b = Subject::new();
        let lock = EmissionLock::new();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s1 = seen.clone();
        let s2 = seen.clone();
        let _sa = synchronize(&a.observable(), &lock)
            .subscribe_next(move |v: &i32| s1.borrow_mut().push(*v));
        let _sb = synchronize(&b.observable(), &lock)
            .subscribe_next(move |v: &i32| s2.borrow_mut().push(*v));

        a.next(&1);
        b.next(&2);
        a.next(&3);

        assert_eq!(*seen.borrow(), [1, 2, 3]);
    }

    #[test]
    fn test_synchronize_forwards_terminal() {
        let subject = Subject::<i32>::new();
        let lock = EmissionLock::new();

        let completed = Rc::new(RefCell::new(false));
        let completed_clone = completed.clone();
        let _sub = synchronize(&subject.observable(), &lock).subscribe_all(
            |_| {},
            |_| {},
            move || *completed_clone.borrow_mut() = true,
        );

        subject.complete();
        assert!(*completed.borrow());
    }
}
