//! Ordered source collection.

use crate::ListStream;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use rill_core::{ListChange, ListChangeSet};
use rill_stream::{Observable, Subject};

/// A mutable ordered collection publishing list change sets.
///
/// Like [`SourceCache`](crate::SourceCache), all mutation goes through
/// transactional [`edit`](SourceList::edit) batches, each publishing one
/// change set.
pub struct SourceList<T> {
    items: Rc<RefCell<Vec<T>>>,
    subject: Subject<ListChangeSet<T>>,
}

impl<T> Clone for SourceList<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
            subject: self.subject.clone(),
        }
    }
}

impl<T> Default for SourceList<T>
where
    T: Clone + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SourceList<T>
where
    T: Clone + 'static,
{
    /// Creates an empty source list.
    pub fn new() -> Self {
        Self {
            items: Rc::new(RefCell::new(Vec::new())),
            subject: Subject::new(),
        }
    }

    /// Runs a transactional batch of mutations, publishing one change set.
    pub fn edit<F>(&self, edit: F)
    where
        F: FnOnce(&mut ListUpdater<'_, T>),
    {
        let changes = {
            let mut items = self.items.borrow_mut();
            let mut updater = ListUpdater {
                items: &mut items,
                changes: ListChangeSet::new(),
            };
            edit(&mut updater);
            updater.changes
        };
        if !changes.is_empty() {
            self.subject.next(&changes);
        }
    }

    /// Appends one item as a single-change batch.
    pub fn add(&self, item: T) {
        self.edit(|list| list.add(item));
    }

    /// Appends a block of items as a single-change batch.
    pub fn add_range(&self, items: Vec<T>) {
        self.edit(|list| list.add_range(items));
    }

    /// Removes the item at `index` as a single-change batch.
    pub fn remove_at(&self, index: usize) {
        self.edit(|list| {
            list.remove_at(index);
        });
    }

    /// Replaces the item at `index` as a single-change batch.
    pub fn replace_at(&self, index: usize, item: T) {
        self.edit(|list| list.replace_at(index, item));
    }

    /// Moves an item between positions as a single-change batch.
    pub fn move_item(&self, from: usize, to: usize) {
        self.edit(|list| list.move_item(from, to));
    }

    /// Removes everything as a single-change batch.
    pub fn clear(&self) {
        self.edit(|list| list.clear());
    }

    /// The change-set stream of this list.
    ///
    /// Each subscription first receives the current state as one
    /// `AddRange` change set (when non-empty), then every subsequent edit.
    pub fn connect(&self) -> ListStream<T> {
        let items = self.items.clone();
        let live = self.subject.observable();
        Observable::new(move |downstream| {
            let snapshot = items.borrow().clone();
            if !snapshot.is_empty() {
                let initial = ListChangeSet::from_changes(alloc::vec![ListChange::AddRange {
                    items: snapshot,
                    index: 0,
                }]);
                downstream.next(&initial);
            }
            live.subscribe_with(downstream)
        })
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    /// Returns true if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Snapshot of the current items.
    pub fn items(&self) -> Vec<T> {
        self.items.borrow().clone()
    }
}

impl<T> SourceList<T>
where
    T: Clone + PartialEq + 'static,
{
    /// Removes the first occurrence of `item` as a single-change batch.
    /// Returns true if the item was found.
    pub fn remove(&self, item: &T) -> bool {
        let mut found = false;
        self.edit(|list| found = list.remove(item));
        found
    }
}

/// Mutation surface handed to [`SourceList::edit`] batches.
pub struct ListUpdater<'a, T> {
    items: &'a mut Vec<T>,
    changes: ListChangeSet<T>,
}

impl<'a, T> ListUpdater<'a, T>
where
    T: Clone,
{
    /// Appends an item.
    pub fn add(&mut self, item: T) {
        let index = self.items.len();
        self.items.push(item.clone());
        self.changes.push(ListChange::Add { item, index });
    }

    /// Inserts an item at `index`.
    pub fn insert(&mut self, index: usize, item: T) {
        self.items.insert(index, item.clone());
        self.changes.push(ListChange::Add { item, index });
    }

    /// Appends a block of items. Empty blocks record nothing.
    pub fn add_range(&mut self, items: Vec<T>) {
        if items.is_empty() {
            return;
        }
        let index = self.items.len();
        self.items.extend(items.iter().cloned());
        self.changes.push(ListChange::AddRange { items, index });
    }

    /// Replaces the item at `index`.
    pub fn replace_at(&mut self, index: usize, item: T) {
        let previous = core::mem::replace(&mut self.items[index], item.clone());
        self.changes.push(ListChange::Replace {
            item,
            previous,
            index,
        });
    }

    /// Removes and returns the item at `index`.
    pub fn remove_at(&mut self, index: usize) -> T {
        let item = self.items.remove(index);
        self.changes.push(ListChange::Remove {
            item: item.clone(),
            index,
        });
        item
    }

    /// Signals that the item at `index` changed observably.
    pub fn refresh_at(&mut self, index: usize) {
        let item = self.items[index].clone();
        self.changes.push(ListChange::Refresh { item, index });
    }

    /// Moves the item at `from` to position `to`.
    pub fn move_item(&mut self, from: usize, to: usize) {
        if from == to {
            return;
        }
        let item = self.items.remove(from);
        self.items.insert(to, item.clone());
        self.changes.push(ListChange::Moved {
            item,
            current_index: to,
            previous_index: from,
        });
    }

    /// Removes every item. An empty list records nothing.
    pub fn clear(&mut self) {
        if self.items.is_empty() {
            return;
        }
        let items = core::mem::take(self.items);
        self.changes.push(ListChange::Clear { items });
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if the list is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Returns the item at `index`.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }
}

impl<'a, T> ListUpdater<'a, T>
where
    T: Clone + PartialEq,
{
    /// Removes the first occurrence of `item`. Returns true if found.
    pub fn remove(&mut self, item: &T) -> bool {
        match self.items.iter().position(|existing| existing == item) {
            Some(index) => {
                self.remove_at(index);
                true
            }
            None => false,
        }
    }
}
