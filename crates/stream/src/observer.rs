//! Observer capability and the guarded downstream handle.

use alloc::boxed::Box;
use alloc::rc::Rc;
use core::cell::{Cell, RefCell};
use rill_core::Error;

/// The receiving side of a stream.
///
/// A subscription delivers any number of `on_next` calls followed by at
/// most one terminal `on_error` or `on_complete`. Delivery within one
/// subscription is serial.
pub trait Observer<T> {
    /// Receives the next value.
    fn on_next(&mut self, value: &T);
    /// Receives the terminal error.
    fn on_error(&mut self, error: &Error);
    /// Receives the terminal completion.
    fn on_complete(&mut self);
}

/// Shared handle to a boxed observer.
pub type ObserverRef<T> = Rc<RefCell<dyn Observer<T>>>;

/// Adapts closures to the [`Observer`] trait.
pub struct CallbackObserver<T> {
    next: Box<dyn FnMut(&T)>,
    error: Box<dyn FnMut(&Error)>,
    complete: Box<dyn FnMut()>,
}

impl<T> CallbackObserver<T> {
    /// Creates an observer from the three callbacks.
    pub fn new<N, E, C>(next: N, error: E, complete: C) -> Self
    where
        N: FnMut(&T) + 'static,
        E: FnMut(&Error) + 'static,
        C: FnMut() + 'static,
    {
        Self {
            next: Box::new(next),
            error: Box::new(error),
            complete: Box::new(complete),
        }
    }

    /// Creates an observer handling values only. Errors are logged and
    /// completion is ignored.
    pub fn of_next<N>(next: N) -> Self
    where
        N: FnMut(&T) + 'static,
    {
        Self::new(
            next,
            |error| log::warn!("unhandled upstream error: {}", error),
            || {},
        )
    }
}

impl<T> Observer<T> for CallbackObserver<T> {
    fn on_next(&mut self, value: &T) {
        (self.next)(value);
    }

    fn on_error(&mut self, error: &Error) {
        (self.error)(error);
    }

    fn on_complete(&mut self) {
        (self.complete)();
    }
}

/// The handle an upstream emits through.
///
/// `Downstream` enforces the push contract: nothing is delivered after a
/// terminal event, a terminal event is delivered at most once, and marking
/// the handle done (on disposal) silences it without a terminal event.
pub struct Downstream<T> {
    observer: ObserverRef<T>,
    done: Rc<Cell<bool>>,
}

impl<T> Clone for Downstream<T> {
    fn clone(&self) -> Self {
        Self {
            observer: self.observer.clone(),
            done: self.done.clone(),
        }
    }
}

impl<T> Downstream<T> {
    /// Wraps an observer in a guarded handle.
    pub fn new(observer: ObserverRef<T>) -> Self {
        Self {
            observer,
            done: Rc::new(Cell::new(false)),
        }
    }

    /// Delivers a value unless the handle is done.
    pub fn next(&self, value: &T) {
        if !self.done.get() {
            self.observer.borrow_mut().on_next(value);
        }
    }

    /// Delivers the terminal error, at most once.
    pub fn error(&self, error: &Error) {
        if !self.done.replace(true) {
            self.observer.borrow_mut().on_error(error);
        }
    }

    /// Delivers the terminal completion, at most once.
    pub fn complete(&self) {
        if !self.done.replace(true) {
            self.observer.borrow_mut().on_complete();
        }
    }

    /// Returns true if a terminal event was delivered or the handle was
    /// marked done.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.done.get()
    }

    /// Silences the handle without a terminal event. Used by disposal so no
    /// emission escapes after teardown begins.
    pub fn mark_done(&self) {
        self.done.set(true);
    }
}
