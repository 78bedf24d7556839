//! Subscription handles and composite teardown.
//!
//! A `Subscription` owns a single disposal action. Disposal is idempotent
//! and also runs on drop, so holding a subscription in scope keeps the
//! stream alive and leaving the scope tears it down on every exit path.

use alloc::boxed::Box;
use alloc::vec::Vec;

/// A single-shot disposal action.
pub struct Subscription {
    action: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    /// Creates a subscription that runs `action` when disposed.
    pub fn new<F>(action: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        Self {
            action: Some(Box::new(action)),
        }
    }

    /// Creates an already-disposed subscription.
    pub fn empty() -> Self {
        Self { action: None }
    }

    /// Runs the disposal action. Calling this more than once has no
    /// further effect.
    pub fn dispose(&mut self) {
        if let Some(action) = self.action.take() {
            action();
        }
    }

    /// Returns true if the subscription has been disposed.
    #[inline]
    pub fn is_disposed(&self) -> bool {
        self.action.is_none()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// A composite of subscriptions disposed in LIFO order.
///
/// Operators push their owned subscriptions as they acquire them; disposal
/// releases the most recently acquired first.
pub struct SubscriptionSet {
    subscriptions: Vec<Subscription>,
}

impl Default for SubscriptionSet {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionSet {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            subscriptions: Vec::new(),
        }
    }

    /// Adds a subscription to be disposed with the set.
    pub fn push(&mut self, subscription: Subscription) {
        self.subscriptions.push(subscription);
    }

    /// Returns the number of live subscriptions in the set.
    #[inline]
    pub fn len(&self) -> usize {
        self.subscriptions.len()
    }

    /// Returns true if the set holds no subscriptions.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.subscriptions.is_empty()
    }

    /// Disposes all held subscriptions in reverse acquisition order.
    pub fn dispose(&mut self) {
        while let Some(mut subscription) = self.subscriptions.pop() {
            subscription.dispose();
        }
    }

    /// Converts the set into a single subscription disposing the whole set.
    pub fn into_subscription(self) -> Subscription {
        let mut set = self;
        Subscription::new(move || set.dispose())
    }
}

impl Drop for SubscriptionSet {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::rc::Rc;
    use core::cell::RefCell;

    #[test]
    fn test_subscription_dispose_runs_action() {
        let disposed = Rc::new(RefCell::new(false));
        let disposed_clone = disposed.clone();

        let mut sub = Subscription::new(move || *disposed_clone.borrow_mut() = true);
        assert!(!sub.is_disposed());

        sub.dispose();
        assert!(sub.is_disposed());
        assert!(*disposed.borrow());
    }

    #[test]
    fn test_subscription_dispose_idempotent() {
        let count = Rc::new(RefCell::new(0));
        let count_clone = count.clone();

        let mut sub = Subscription::new(move || *count_clone.borrow_mut() += 1);
        sub.dispose();
        sub.dispose();

        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_subscription_disposes_on_drop() {
        let count = Rc::new(RefCell::new(0));
        let count_clone = count.clone();

        {
            let _sub = Subscription::new(move || *count_clone.borrow_mut() += 1);
        }

        assert_eq!(*count.borrow(), 1);
    }

    #[test]
    fn test_subscription_set_disposes_lifo() {
        let order = Rc::new(RefCell::new(Vec::new()));

        let mut set = SubscriptionSet::new();
        for i in 0..3 {
            let order_clone = order.clone();
            set.push(Subscription::new(move || order_clone.borrow_mut().push(i)));
        }

        set.dispose();
        assert_eq!(*order.borrow(), [2, 1, 0]);
        assert!(set.is_empty());
    }

    #[test]
    fn test_subscription_set_into_subscription() {
        let count = Rc::new(RefCell::new(0));

        let mut set = SubscriptionSet::new();
        let count_clone = count.clone();
        set.push(Subscription::new(move || *count_clone.borrow_mut() += 1));

        let mut sub = set.into_subscription();
        sub.dispose();
        sub.dispose();

        assert_eq!(*count.borrow(), 1);
    }
}
