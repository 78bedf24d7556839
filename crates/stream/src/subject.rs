//! Multicast emitters with terminal-state latching.

use crate::observable::Observable;
use crate::observer::Downstream;
use crate::subscription::Subscription;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use rill_core::Error;

enum Terminal {
    Errored(Error),
    Completed,
}

struct SubjectState<T> {
    observers: Vec<(u64, Downstream<T>)>,
    next_id: u64,
    terminal: Option<Terminal>,
}

/// A multicast source: values pushed into the subject are delivered to
/// every current observer.
///
/// A terminal event latches: no further values are delivered, observers are
/// released, and a late subscriber receives the terminal event immediately.
/// Observer snapshots are taken before notification, so an observer may
/// subscribe or dispose re-entrantly while a value is being delivered.
pub struct Subject<T> {
    state: Rc<RefCell<SubjectState<T>>>,
}

impl<T> Clone for Subject<T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<T: 'static> Default for Subject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: 'static> Subject<T> {
    /// Creates a subject with no observers.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SubjectState {
                observers: Vec::new(),
                next_id: 1,
                terminal: None,
            })),
        }
    }

    /// Delivers a value to every current observer.
    pub fn next(&self, value: &T) {
        let snapshot = {
            let state = self.state.borrow();
            if state.terminal.is_some() {
                return;
            }
            state.observers.clone()
        };
        for (_, downstream) in snapshot {
            downstream.next(value);
        }
    }

    /// Terminates the subject with an error.
    pub fn error(&self, error: Error) {
        let observers = {
            let mut state = self.state.borrow_mut();
            if state.terminal.is_some() {
                return;
            }
            state.terminal = Some(Terminal::Errored(error.clone()));
            core::mem::take(&mut state.observers)
        };
        for (_, downstream) in observers {
            downstream.error(&error);
        }
    }

    /// Terminates the subject with completion.
    pub fn complete(&self) {
        let observers = {
            let mut state = self.state.borrow_mut();
            if state.terminal.is_some() {
                return;
            }
            state.terminal = Some(Terminal::Completed);
            core::mem::take(&mut state.observers)
        };
        for (_, downstream) in observers {
            downstream.complete();
        }
    }

    /// Returns true if a terminal event has been delivered.
    pub fn is_terminated(&self) -> bool {
        self.state.borrow().terminal.is_some()
    }

    /// Returns the number of attached observers.
    pub fn observer_count(&self) -> usize {
        self.state.borrow().observers.len()
    }

    /// Returns a stream view of this subject.
    ///
    /// The view holds the subject weakly; once every `Subject` handle is
    /// dropped, new subscribers complete immediately.
    pub fn observable(&self) -> Observable<T> {
        let weak = Rc::downgrade(&self.state);
        Observable::new(move |downstream| {
            let state = match weak.upgrade() {
                Some(state) => state,
                None => {
                    downstream.complete();
                    return Subscription::empty();
                }
            };

            let id = {
                let mut s = state.borrow_mut();
                match &s.terminal {
                    Some(Terminal::Errored(error)) => {
                        let error = error.clone();
                        drop(s);
                        downstream.error(&error);
                        return Subscription::empty();
                    }
                    Some(Terminal::Completed) => {
                        drop(s);
                        downstream.complete();
                        return Subscription::empty();
                    }
                    None => {
                        let id = s.next_id;
                        s.next_id += 1;
                        s.observers.push((id, downstream.clone()));
                        id
                    }
                }
            };

            let weak = Rc::downgrade(&state);
            Subscription::new(move || {
                downstream.mark_done();
                if let Some(state) = weak.upgrade() {
                    let mut s = state.borrow_mut();
                    if let Some(pos) = s.observers.iter().position(|(oid, _)| *oid == id) {
                        s.observers.remove(pos);
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

    #[test]
    fn test_subject_multicasts() {
        let subject = Subject::new();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s1 = seen.clone();
        let s2 = seen.clone();
        let _a = subject.observable().subscribe_next(move |v: &i32| s1.borrow_mut().push(*v));
        let _b = subject.observable().subscribe_next(move |v: &i32| s2.borrow_mut().push(*v * 10));

        subject.next(&1);

        assert_eq!(*seen.borrow(), [1, 10]);
        assert_eq!(subject.observer_count(), 2);
    }

    #[test]
    fn test_subject_dispose_detaches() {
        let subject = Subject::new();

        let count = Rc::new(RefCell::new(0));
        let count_clone = count.clone();
        let sub = subject.observable().subscribe_next(move |_: &i32| {
            *count_clone.borrow_mut() += 1;
        });

        subject.next(&1);
        drop(sub);
        subject.next(&2);

        assert_eq!(*count.borrow(), 1);
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn test_subject_terminal_latches() {
        let subject = Subject::new();

        let seen = Rc::new(RefCell::new(Vec::new()));
        let completed = Rc::new(RefCell::new(0));
        let seen_clone = seen.clone();
        let completed_clone = completed.clone();
        let _sub = subject.observable().subscribe_all(
            move |v: &i32| seen_clone.borrow_mut().push(*v),
            |_| {},
            move || *completed_clone.borrow_mut() += 1,
        );

        subject.next(&1);
        subject.complete();
        subject.complete();
        subject.next(&2);

        assert_eq!(*seen.borrow(), [1]);
        assert_eq!(*completed.borrow(), 1);
        assert!(subject.is_terminated());
    }

    #[test]
    fn test_subject_late_subscriber_sees_terminal() {
        let subject = Subject::<i32>::new();
        subject.error(Error::upstream("boom"));

        let errors = Rc::new(RefCell::new(Vec::new()));
        let errors_clone = errors.clone();
        let _sub = subject.observable().subscribe_all(
            |_: &i32| {},
            move |e| errors_clone.borrow_mut().push(e.clone()),
            || {},
        );

        assert_eq!(errors.borrow().len(), 1);
    }

    #[test]
    fn test_subject_error_releases_observers() {
        let subject = Subject::<i32>::new();
        let _sub = subject.observable().subscribe_next(|_| {});

        assert_eq!(subject.observer_count(), 1);
        subject.error(Error::upstream("boom"));
        assert_eq!(subject.observer_count(), 0);
    }

    #[test]
    fn test_subject_dropped_handles_complete_new_subscribers() {
        let observable = {
            let subject = Subject::<i32>::new();
            subject.observable()
        };

        let completed = Rc::new(RefCell::new(false));
        let completed_clone = completed.clone();
        let _sub = observable.subscribe_all(
            |_: &i32| {},
            |_| {},
            move || *completed_clone.borrow_mut() = true,
        );

        assert!(*completed.borrow());
    }

    #[test]
    fn test_subject_reentrant_dispose_during_emit() {
        let subject = Subject::new();

        let holder: Rc<RefCell<Option<Subscription>>> = Rc::new(RefCell::new(None));
        let holder_clone = holder.clone();
        let seen = Rc::new(RefCell::new(0));
        let seen_clone = seen.clone();

        let sub = subject.observable().subscribe_next(move |_: &i32| {
            *seen_clone.borrow_mut() += 1;
            // Dispose ourselves while the subject is mid-notification.
            if let Some(mut own) = holder_clone.borrow_mut().take() {
                own.dispose();
            }
        });
        *holder.borrow_mut() = Some(sub);

        subject.next(&1);
        subject.next(&2);

        assert_eq!(*seen.borrow(), 1);
    }
}
