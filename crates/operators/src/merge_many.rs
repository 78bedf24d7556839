//! Merging the streams of every child of a parent list.
//!
//! The merged view is the concatenation of the children's current lists in
//! parent order. Child-local indices are rebased by the summed lengths of
//! the preceding children, so downstream consumers see one coherent list.
//! When a child leaves the parent its subscription is disposed and its
//! whole current contribution is withdrawn from the merged view.

use crate::ListStream;
use alloc::rc::Rc;
use alloc::vec;
use alloc::vec::Vec;
use core::cell::RefCell;
use rill_core::{Error, ListChange, ListChangeSet};
use rill_stream::{
    synchronize, CallbackObserver, Downstream, EmissionLock, Observable, Subscription,
    SubscriptionSet,
};

struct ChildMirror<T> {
    id: u64,
    items: Vec<T>,
    subscription: Subscription,
    completed: bool,
}

struct MergeManyState<T> {
    children: Vec<ChildMirror<T>>,
    next_id: u64,
    parent_completed: bool,
}

impl<T> MergeManyState<T> {
    fn offset(&self, index: usize) -> usize {
        self.children[..index].iter().map(|c| c.items.len()).sum()
    }
}

struct Merger<S, T> {
    state: Rc<RefCell<MergeManyState<T>>>,
    downstream: Downstream<ListChangeSet<T>>,
    lock: EmissionLock,
    selector: Rc<dyn Fn(&S) -> ListStream<T>>,
}

impl<S, T> Clone for Merger<S, T> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
            downstream: self.downstream.clone(),
            lock: self.lock.clone(),
            selector: self.selector.clone(),
        }
    }
}

impl<S, T> Merger<S, T>
where
    S: Clone + 'static,
    T: Clone + 'static,
{
    fn handle_parent(&self, set: &ListChangeSet<S>) {
        for change in set.iter() {
            match change {
                ListChange::Add { item, index } => self.add_child(item, *index),
                ListChange::AddRange { items, index } => {
                    for (offset, item) in items.iter().enumerate() {
                        self.add_child(item, index + offset);
                    }
                }
                ListChange::Replace { item, index, .. } => {
                    self.remove_child(*index);
                    self.add_child(item, *index);
                }
                ListChange::Remove { index, .. } => self.remove_child(*index),
                ListChange::RemoveRange { items, index } => {
                    for _ in 0..items.len() {
                        self.remove_child(*index);
                    }
                }
                ListChange::Refresh { .. } => {}
                ListChange::Moved {
                    current_index,
                    previous_index,
                    ..
                } => self.move_child(*previous_index, *current_index),
                ListChange::Clear { .. } => self.clear_children(),
            }
        }
    }

    fn handle_child(&self, id: u64, set: &ListChangeSet<T>) {
        let rebased = {
            let mut st = self.state.borrow_mut();
            let index = match st.children.iter().position(|c| c.id == id) {
                Some(index) => index,
                None => return,
            };
            let base = st.offset(index);
            let child = &mut st.children[index];
            let mut rebased = ListChangeSet::new();
            for change in set.iter() {
                rebase_child_change(child, base, change, &mut rebased);
            }
            rebased
        };
        if !rebased.is_empty() {
            self.downstream.next(&rebased);
        }
    }

    fn add_child(&self, item: &S, index: usize) {
        let id = {
            let mut st = self.state.borrow_mut();
            let id = st.next_id;
            st.next_id += 1;
            let at = index.min(st.children.len());
            st.children.insert(
                at,
                ChildMirror {
                    id,
                    items: Vec::new(),
                    subscription: Subscription::empty(),
                    completed: false,
                },
            );
            id
        };

        // The child's current state replays through handle_child as a
        // rebased AddRange.
        let stream = (self.selector)(item);
        let next = {
            let this = self.clone();
            move |set: &ListChangeSet<T>| this.handle_child(id, set)
        };
        let on_error = {
            let this = self.clone();
            move |error: &Error| this.fail(error)
        };
        let on_complete = {
            let this = self.clone();
            move || this.child_done(id)
        };
        let subscription = synchronize(&stream, &self.lock)
            .subscribe(CallbackObserver::new(next, on_error, on_complete));

        let mut st = self.state.borrow_mut();
        if let Some(child) = st.children.iter_mut().find(|c| c.id == id) {
            child.subscription = subscription;
        }
    }

    fn remove_child(&self, index: usize) {
        let (mut subscription, withdrawn, base) = {
            let mut st = self.state.borrow_mut();
            if index >= st.children.len() {
                return;
            }
            let base = st.offset(index);
            let child = st.children.remove(index);
            (child.subscription, child.items, base)
        };
        subscription.dispose();

        if !withdrawn.is_empty() {
            let set = ListChangeSet::from_changes(vec![ListChange::RemoveRange {
                items: withdrawn,
                index: base,
            }]);
            self.downstream.next(&set);
        }
    }

    fn move_child(&self, from: usize, to: usize) {
        let (moved, old_base, new_base) = {
            let mut st = self.state.borrow_mut();
            if from >= st.children.len() || from == to {
                return;
            }
            let old_base = st.offset(from);
            let child = st.children.remove(from);
            let moved = child.items.clone();
            let at = to.min(st.children.len());
            st.children.insert(at, child);
            let new_base = st.offset(at);
            (moved, old_base, new_base)
        };
        if !moved.is_empty() {
            let set = ListChangeSet::from_changes(vec![
                ListChange::RemoveRange {
                    items: moved.clone(),
                    index: old_base,
                },
                ListChange::AddRange {
                    items: moved,
                    index: new_base,
                },
            ]);
            self.downstream.next(&set);
        }
    }

    fn clear_children(&self) {
        let (subscriptions, merged) = {
            let mut st = self.state.borrow_mut();
            let children = core::mem::take(&mut st.children);
            let mut subscriptions = Vec::new();
            let mut merged = Vec::new();
            for child in children {
                subscriptions.push(child.subscription);
                merged.extend(child.items);
            }
            (subscriptions, merged)
        };
        for mut subscription in subscriptions {
            subscription.dispose();
        }
        if !merged.is_empty() {
            let set = ListChangeSet::from_changes(vec![ListChange::Clear { items: merged }]);
            self.downstream.next(&set);
        }
    }

    fn child_done(&self, id: u64) {
        let done = {
            let mut st = self.state.borrow_mut();
            if let Some(child) = st.children.iter_mut().find(|c| c.id == id) {
                child.completed = true;
            }
            st.parent_completed && st.children.iter().all(|c| c.completed)
        };
        if done {
            self.downstream.complete();
        }
    }

    fn parent_done(&self) {
        let done = {
            let mut st = self.state.borrow_mut();
            st.parent_completed = true;
            st.children.iter().all(|c| c.completed)
        };
        if done {
            self.downstream.complete();
        }
    }

    fn fail(&self, error: &Error) {
        self.teardown();
        self.downstream.error(error);
    }

    fn teardown(&self) {
        let children = {
            let mut st = self.state.borrow_mut();
            core::mem::take(&mut st.children)
        };
        for mut child in children {
            child.subscription.dispose();
        }
    }
}

fn rebase_child_change<T: Clone>(
    child: &mut ChildMirror<T>,
    base: usize,
    change: &ListChange<T>,
    out: &mut ListChangeSet<T>,
) {
    match change {
        ListChange::Add { item, index } => {
            let at = (*index).min(child.items.len());
            child.items.insert(at, item.clone());
            out.push(ListChange::Add {
                item: item.clone(),
                index: base + at,
            });
        }
        ListChange::AddRange { items, index } => {
            let at = (*index).min(child.items.len());
            for (offset, item) in items.iter().enumerate() {
                child.items.insert(at + offset, item.clone());
            }
            out.push(ListChange::AddRange {
                items: items.clone(),
                index: base + at,
            });
        }
        ListChange::Replace {
            item,
            previous,
            index,
        } => {
            if let Some(slot) = child.items.get_mut(*index) {
                *slot = item.clone();
                out.push(ListChange::Replace {
                    item: item.clone(),
                    previous: previous.clone(),
                    index: base + index,
                });
            }
        }
        ListChange::Remove { item, index } => {
            if *index < child.items.len() {
                child.items.remove(*index);
                out.push(ListChange::Remove {
                    item: item.clone(),
                    index: base + index,
                });
            }
        }
        ListChange::RemoveRange { items, index } => {
            let start = (*index).min(child.items.len());
            let end = (start + items.len()).min(child.items.len());
            child.items.drain(start..end);
            out.push(ListChange::RemoveRange {
                items: items.clone(),
                index: base + start,
            });
        }
        ListChange::Refresh { item, index } => {
            out.push(ListChange::Refresh {
                item: item.clone(),
                index: base + index,
            });
        }
        ListChange::Moved {
            item,
            current_index,
            previous_index,
        } => {
            if *previous_index < child.items.len() {
                let moved = child.items.remove(*previous_index);
                let at = (*current_index).min(child.items.len());
                child.items.insert(at, moved);
                out.push(ListChange::Moved {
                    item: item.clone(),
                    current_index: base + at,
                    previous_index: base + previous_index,
                });
            }
        }
        ListChange::Clear { .. } => {
            let removed = core::mem::take(&mut child.items);
            if !removed.is_empty() {
                out.push(ListChange::RemoveRange {
                    items: removed,
                    index: base,
                });
            }
        }
    }
}

/// Merges the streams selected from every child of `parent` into one list
/// stream.
pub fn merge_many<S, T, F>(parent: &ListStream<S>, selector: F) -> ListStream<T>
where
    S: Clone + 'static,
    T: Clone + 'static,
    F: Fn(&S) -> ListStream<T> + 'static,
{
    let parent = parent.clone();
    let selector: Rc<dyn Fn(&S) -> ListStream<T>> = Rc::new(selector);

    Observable::new(move |downstream| {
        let merger = Merger {
            state: Rc::new(RefCell::new(MergeManyState {
                children: Vec::new(),
                next_id: 1,
                parent_completed: false,
            })),
            downstream,
            lock: EmissionLock::new(),
            selector: selector.clone(),
        };

        let parent_sub = {
            let next = {
                let this = merger.clone();
                move |set: &ListChangeSet<S>| this.handle_parent(set)
            };
            let on_error = {
                let this = merger.clone();
                move |error: &Error| this.fail(error)
            };
            let on_complete = {
                let this = merger.clone();
                move || this.parent_done()
            };
            synchronize(&parent, &merger.lock)
                .subscribe(CallbackObserver::new(next, on_error, on_complete))
        };

        let mut subscriptions = SubscriptionSet::new();
        subscriptions.push(parent_sub);
        let teardown = Subscription::new(move || merger.teardown());
        subscriptions.push(teardown);
        subscriptions.into_subscription()
    })
}
