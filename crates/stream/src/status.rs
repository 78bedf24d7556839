//! Stream lifecycle monitoring.

use crate::observable::Observable;
use crate::observer::CallbackObserver;
use alloc::rc::Rc;
use core::cell::Cell;

/// The lifecycle state of a monitored stream.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionStatus {
    /// Subscribed, nothing received yet.
    Pending,
    /// At least one value received.
    Loaded,
    /// Terminated with an error.
    Errored,
    /// Terminated normally.
    Completed,
}

/// Surfaces the lifecycle of `source` as a stream of status transitions.
///
/// Each subscription starts by emitting `Pending`, then emits on every
/// transition: `Loaded` on the first value, `Errored` on upstream error
/// (followed by the error itself), `Completed` on normal completion
/// (followed by completion). Only transitions emit, so consecutive
/// duplicates cannot occur.
pub fn monitor_status<T: 'static>(source: &Observable<T>) -> Observable<ConnectionStatus> {
    let source = source.clone();
    Observable::new(move |downstream| {
        downstream.next(&ConnectionStatus::Pending);

        let status = Rc::new(Cell::new(ConnectionStatus::Pending));
        let status_next = status.clone();
        let status_error = status.clone();
        let status_complete = status;
        let down_next = downstream.clone();
        let down_error = downstream.clone();
        let down_complete = downstream;

        source.subscribe(CallbackObserver::new(
            move |_value: &T| {
                if status_next.get() == ConnectionStatus::Pending {
                    status_next.set(ConnectionStatus::Loaded);
                    down_next.next(&ConnectionStatus::Loaded);
                }
            },
            move |error| {
                status_error.set(ConnectionStatus::Errored);
                down_error.next(&ConnectionStatus::Errored);
                down_error.error(error);
            },
            move || {
                if status_complete.get() != ConnectionStatus::Errored {
                    status_complete.set(ConnectionStatus::Completed);
                    down_complete.next(&ConnectionStatus::Completed);
                    down_complete.complete();
                }
            },
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subject::Subject;
    use alloc::vec::Vec;
    use core::cell::RefCell;
    use rill_core::Error;

    fn collect(source: &Observable<ConnectionStatus>) -> (
        Rc<RefCell<Vec<ConnectionStatus>>>,
        Rc<RefCell<Vec<Error>>>,
        crate::subscription::Subscription,
    ) {
        let statuses = Rc::new(RefCell::new(Vec::new()));
        let errors = Rc::new(RefCell::new(Vec::new()));
        let s = statuses.clone();
        let e = errors.clone();
        let sub = source.subscribe_all(
            move |status: &ConnectionStatus| s.borrow_mut().push(*status),
            move |error| e.borrow_mut().push(error.clone()),
            || {},
        );
        (statuses, errors, sub)
    }

    #[test]
    fn test_monitor_value_then_error() {
        let subject = Subject::new();
        let (statuses, errors, _sub) = collect(&monitor_status(&subject.observable()));

        subject.next(&1);
        subject.error(Error::upstream("boom"));

        assert_eq!(
            *statuses.borrow(),
            [
                ConnectionStatus::Pending,
                ConnectionStatus::Loaded,
                ConnectionStatus::Errored
            ]
        );
        assert_eq!(errors.borrow().len(), 1);
    }

    #[test]
    fn test_monitor_suppresses_repeat_loaded() {
        let subject = Subject::new();
        let (statuses, _errors, _sub) = collect(&monitor_status(&subject.observable()));

        subject.next(&1);
        subject.next(&2);
        subject.next(&3);

        assert_eq!(
            *statuses.borrow(),
            [ConnectionStatus::Pending, ConnectionStatus::Loaded]
        );
    }

    #[test]
    fn test_monitor_completion() {
        let subject = Subject::<i32>::new();
        let (statuses, _errors, _sub) = collect(&monitor_status(&subject.observable()));

        subject.complete();

        assert_eq!(
            *statuses.borrow(),
            [ConnectionStatus::Pending, ConnectionStatus::Completed]
        );
    }

    #[test]
    fn test_monitor_error_without_value() {
        let subject = Subject::<i32>::new();
        let (statuses, errors, _sub) = collect(&monitor_status(&subject.observable()));

        subject.error(Error::upstream("early"));

        assert_eq!(
            *statuses.borrow(),
            [ConnectionStatus::Pending, ConnectionStatus::Errored]
        );
        assert_eq!(errors.borrow().len(), 1);
    }
}
