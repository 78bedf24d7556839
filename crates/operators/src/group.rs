//! Grouping a keyed stream into immutable group snapshots.

use crate::operator::emit_if_any;
use crate::CacheStream;
use alloc::rc::Rc;
use alloc::vec::Vec;
use core::cell::RefCell;
use core::fmt::Debug;
use core::hash::Hash;
use hashbrown::HashMap;
use rill_core::{Cache, ChangeAwareCache, ChangeReason, ChangeSet, Grouping};
use rill_stream::{CallbackObserver, Observable};

struct GroupState<T, K, G> {
    /// Which group each item key currently belongs to.
    item_groups: HashMap<K, G>,
    /// Working membership per group.
    groups: HashMap<G, Cache<T, K>>,
    result: ChangeAwareCache<Grouping<T, K, G>, G>,
}

/// Groups a keyed stream by a derived group key.
///
/// The output is keyed by group key; each value is an immutable
/// [`Grouping`] snapshot, rebuilt whole whenever the group's membership or
/// any member value changes. A group whose last member leaves is removed.
/// A `Refresh` whose recomputed group key is unchanged propagates as a
/// refresh of the group; one that changed regroups the item.
pub fn group_on<T, K, G, GS>(source: &CacheStream<T, K>, group_key: GS) -> CacheStream<Grouping<T, K, G>, G>
where
    T: Clone + 'static,
    K: Eq + Hash + Clone + Debug + 'static,
    G: Eq + Hash + Clone + Debug + 'static,
    GS: Fn(&T) -> G + 'static,
{
    let source = source.clone();
    let group_key = Rc::new(group_key);

    Observable::new(move |downstream| {
        let state = Rc::new(RefCell::new(GroupState::<T, K, G> {
            item_groups: HashMap::new(),
            groups: HashMap::new(),
            result: ChangeAwareCache::new(),
        }));

        let next = {
            let state = state.clone();
            let group_key = group_key.clone();
            let downstream = downstream.clone();
            move |set: &ChangeSet<T, K>| {
                let changes = {
                    let mut st = state.borrow_mut();
                    let st = &mut *st;
                    let mut touched: Vec<G> = Vec::new();
                    let mut refreshed: Vec<G> = Vec::new();
                    let mut touch = |list: &mut Vec<G>, group: &G| {
                        if !list.contains(group) {
                            list.push(group.clone());
                        }
                    };

                    for change in set.iter() {
                        let key = change.key.clone();
                        match change.reason {
                            ChangeReason::Add | ChangeReason::Update => {
                                let group = group_key(&change.current);
                                if let Some(old_group) = st.item_groups.get(&key).cloned() {
                                    if old_group != group {
                                        if let Some(members) = st.groups.get_mut(&old_group) {
                                            members.remove(&key);
                                        }
                                        touch(&mut touched, &old_group);
                                    }
                                }
                                st.groups
                                    .entry(group.clone())
                                    .or_insert_with(Cache::new)
                                    .add_or_update(change.current.clone(), key.clone());
                                st.item_groups.insert(key, group.clone());
                                touch(&mut touched, &group);
                            }
                            ChangeReason::Remove => {
                                if let Some(group) = st.item_groups.remove(&key) {
                                    if let Some(members) = st.groups.get_mut(&group) {
                                        members.remove(&key);
                                    }
                                    touch(&mut touched, &group);
                                }
                            }
                            ChangeReason::Refresh => {
                                let group = group_key(&change.current);
                                match st.item_groups.get(&key).cloned() {
                                    Some(old_group) if old_group == group => {
                                        touch(&mut refreshed, &group);
                                    }
                                    Some(old_group) => {
                                        if let Some(members) = st.groups.get_mut(&old_group) {
                                            members.remove(&key);
                                        }
                                        touch(&mut touched, &old_group);
                                        st.groups
                                            .entry(group.clone())
                                            .or_insert_with(Cache::new)
                                            .add_or_update(change.current.clone(), key.clone());
                                        st.item_groups.insert(key, group.clone());
                                        touch(&mut touched, &group);
                                    }
                                    None => {}
                                }
                            }
                            ChangeReason::Moved => {}
                        }
                    }

                    for group in &touched {
                        match st.groups.get(group) {
                            Some(members) if !members.is_empty() => {
                                st.result.add_or_update(
                                    Grouping::new(group.clone(), members.clone()),
                                    group.clone(),
                                );
                            }
                            _ => {
                                st.groups.remove(group);
                                st.result.remove(group);
                            }
                        }
                    }
                    for group in &refreshed {
                        if !touched.contains(group) {
                            st.result.refresh(group);
                        }
                    }
                    st.result.capture_changes()
                };
                emit_if_any(changes, &downstream);
            }
        };

        let downstream_error = downstream.clone();
        let downstream_complete = downstream;
        source.subscribe(CallbackObserver::new(
            next,
            move |error| downstream_error.error(error),
            move || downstream_complete.complete(),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MaterializedCache, SourceCache};
    use alloc::vec::Vec;

    fn grouped_by_parity() -> (
        SourceCache<i32, i32>,
        MaterializedCache<Grouping<i32, i32, bool>, bool>,
    ) {
        let source = SourceCache::new(|v: &i32| *v);
        let view = MaterializedCache::new(&group_on(&source.connect(), |v: &i32| v % 2 == 0));
        (source, view)
    }

    #[test]
    fn test_group_on_partitions_items() {
        let (source, view) = grouped_by_parity();
        source.edit(|cache| {
            for v in [1, 2, 3, 4] {
                cache.add_or_update(v);
            }
        });

        assert_eq!(view.len(), 2);
        let evens = view.lookup(&true).unwrap();
        let mut even_items: Vec<i32> = evens.items().copied().collect();
        even_items.sort_unstable();
        assert_eq!(even_items, [2, 4]);
    }

    #[test]
    fn test_group_removed_when_empty() {
        let (source, view) = grouped_by_parity();
        source.add_or_update(2);
        assert_eq!(view.len(), 1);

        source.remove(&2);
        assert!(view.is_empty());
    }

    #[test]
    fn test_groupings_are_snapshots() {
        let (source, view) = grouped_by_parity();
        source.add_or_update(2);

        let before = view.lookup(&true).unwrap();
        source.add_or_update(4);
        let after = view.lookup(&true).unwrap();

        assert_eq!(before.len(), 1);
        assert_eq!(after.len(), 2);
    }

    #[test]
    fn test_group_refresh_propagates() {
        let source = SourceCache::new(|v: &i32| *v);
        let refreshes = Rc::new(RefCell::new(0));
        let refreshes_clone = refreshes.clone();
        let _sub = group_on(&source.connect(), |v: &i32| v % 2 == 0)
            .subscribe_next(move |set: &ChangeSet<Grouping<i32, i32, bool>, bool>| {
                *refreshes_clone.borrow_mut() += set.refreshes();
            });

        source.add_or_update(2);
        source.refresh(&2);

        assert_eq!(*refreshes.borrow(), 1);
    }

    #[test]
    fn test_update_regroups_item() {
        #[derive(Clone, Debug, PartialEq)]
        struct Task {
            id: i32,
            done: bool,
        }

        let source = SourceCache::new(|t: &Task| t.id);
        let view = MaterializedCache::new(&group_on(&source.connect(), |t: &Task| t.done));

        source.add_or_update(Task { id: 1, done: false });
        assert!(view.lookup(&false).is_some());

        source.add_or_update(Task { id: 1, done: true });
        assert!(view.lookup(&false).is_none());
        assert_eq!(view.lookup(&true).unwrap().len(), 1);
    }
}
