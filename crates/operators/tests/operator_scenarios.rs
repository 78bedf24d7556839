//! Cross-operator scenarios exercising whole pipelines end to end.

use std::cell::RefCell;
use std::rc::Rc;

use rill_core::{ChangeReason, ChangeSet, Error, Grouping};
use rill_operators::{
    combine_static, count, full_join_many, left_join, maximum, merge_many, CombineOperator,
    MaterializedCache, MaterializedList, SourceCache, SourceList,
};
use rill_stream::{monitor_status, ConnectionStatus, Subject};

#[derive(Clone, Debug, PartialEq)]
struct Item {
    id: i32,
    name: String,
}

fn item(id: i32, name: &str) -> Item {
    Item {
        id,
        name: name.into(),
    }
}

#[test]
fn merge_many_withdraws_cleared_child() {
    let a: SourceList<i32> = SourceList::new();
    let b: SourceList<i32> = SourceList::new();
    let c: SourceList<i32> = SourceList::new();

    let parent: SourceList<SourceList<i32>> = SourceList::new();
    parent.add_range(vec![a.clone(), b.clone(), c.clone()]);

    let merged = merge_many(&parent.connect(), |child: &SourceList<i32>| child.connect());
    let view = MaterializedList::new(&merged);

    a.add(1);
    a.add(2);
    b.add(3);
    b.add(5);

    let mut items = view.items();
    items.sort_unstable();
    assert_eq!(items, vec![1, 2, 3, 5]);
    assert_eq!(view.len(), 4);

    b.clear();

    let mut items = view.items();
    items.sort_unstable();
    assert_eq!(items, vec![1, 2]);
    assert_eq!(view.len(), 2);
}

#[test]
fn maximum_resets_when_extremum_removed() {
    let source = SourceCache::new(|v: &(i32, i32)| v.0);

    let emissions = Rc::new(RefCell::new(Vec::new()));
    let emissions_clone = emissions.clone();
    let _sub = maximum(&source.connect(), |v: &(i32, i32)| v.1, 0)
        .subscribe_next(move |v: &i32| emissions_clone.borrow_mut().push(*v));

    source.add_or_update((1, 3));
    source.add_or_update((2, 7));
    source.add_or_update((3, 5));
    assert_eq!(*emissions.borrow(), vec![3, 7]);

    source.remove(&2);
    assert_eq!(*emissions.borrow(), vec![3, 7, 5]);

    source.remove(&1);
    source.remove(&3);
    assert_eq!(*emissions.borrow(), vec![3, 7, 5, 0]);
}

#[test]
fn edit_diff_emits_one_minimal_change_set() {
    let source = SourceCache::new(|i: &Item| i.id);
    source.edit(|cache| {
        cache.add_or_update(item(1, "a"));
        cache.add_or_update(item(2, "b"));
    });

    let sets = Rc::new(RefCell::new(Vec::new()));
    let sets_clone = sets.clone();
    let _sub = source
        .connect()
        .subscribe_next(move |set: &ChangeSet<Item, i32>| sets_clone.borrow_mut().push(set.clone()));
    sets.borrow_mut().clear();

    source.edit_diff(
        vec![item(1, "a"), item(2, "B"), item(3, "c")],
        |a, b| a.name == b.name,
    );

    let sets = sets.borrow();
    assert_eq!(sets.len(), 1);
    let set = &sets[0];
    assert_eq!(set.removes(), 0);
    assert_eq!(set.updates(), 1);
    assert_eq!(set.adds(), 1);

    let update = set
        .iter()
        .find(|c| c.reason == ChangeReason::Update)
        .unwrap();
    assert_eq!(update.key, 2);
    assert_eq!(update.previous.as_ref().unwrap().name, "b");
    assert_eq!(update.current.name, "B");

    let add = set.iter().find(|c| c.reason == ChangeReason::Add).unwrap();
    assert_eq!(add.key, 3);
}

#[derive(Clone, Debug, PartialEq)]
struct RightRow {
    key: &'static str,
    left_id: i32,
}

#[test]
fn left_join_follows_both_sides() {
    let left = SourceCache::new(|i: &Item| i.id);
    let right = SourceCache::new(|r: &RightRow| r.key);
    left.add_or_update(item(1, "L1"));
    left.add_or_update(item(2, "L2"));
    right.add_or_update(RightRow {
        key: "r",
        left_id: 1,
    });
    right.add_or_update(RightRow {
        key: "s",
        left_id: 2,
    });

    let joined = left_join(
        &left.connect(),
        &right.connect(),
        |r| r.left_id,
        |key, l: &Item, r: Option<&RightRow>| {
            format!("{}|{}|{}", key, l.name, r.map(|r| r.key).unwrap_or("-"))
        },
    );
    let view = MaterializedCache::new(&joined);

    assert_eq!(view.lookup(&1), Some("1|L1|r".into()));
    assert_eq!(view.lookup(&2), Some("2|L2|s".into()));

    right.remove(&"s");
    assert_eq!(view.lookup(&2), Some("2|L2|-".into()));

    left.remove(&1);
    assert_eq!(view.lookup(&1), None);
    assert_eq!(view.len(), 1);
}

#[test]
fn dynamic_and_reacts_to_source_membership() {
    let a = SourceCache::new(|v: &i32| *v);
    let b = SourceCache::new(|v: &i32| *v);
    let c = SourceCache::new(|v: &i32| *v);
    for v in [1, 2, 3] {
        a.add_or_update(v);
    }
    for v in [2, 3, 4] {
        b.add_or_update(v);
    }
    for v in [3, 4] {
        c.add_or_update(v);
    }

    let sources: SourceList<rill_operators::CacheStream<i32, i32>> = SourceList::new();
    sources.add(a.connect());
    sources.add(b.connect());

    let view = MaterializedCache::new(&rill_operators::and(&sources.connect()));

    let mut keys = view.keys();
    keys.sort_unstable();
    assert_eq!(keys, vec![2, 3]);

    sources.add(c.connect());
    let mut keys = view.keys();
    keys.sort_unstable();
    assert_eq!(keys, vec![3]);

    sources.remove_at(2);
    let mut keys = view.keys();
    keys.sort_unstable();
    assert_eq!(keys, vec![2, 3]);
}

#[test]
fn status_monitor_reports_lifecycle() {
    let subject: Subject<i32> = Subject::new();

    let statuses = Rc::new(RefCell::new(Vec::new()));
    let errors = Rc::new(RefCell::new(Vec::new()));
    let statuses_clone = statuses.clone();
    let errors_clone = errors.clone();
    let _sub = monitor_status(&subject.observable()).subscribe_all(
        move |s: &ConnectionStatus| statuses_clone.borrow_mut().push(*s),
        move |e| errors_clone.borrow_mut().push(e.clone()),
        || {},
    );

    subject.next(&1);
    subject.error(Error::upstream("wire dropped"));

    assert_eq!(
        *statuses.borrow(),
        vec![
            ConnectionStatus::Pending,
            ConnectionStatus::Loaded,
            ConnectionStatus::Errored
        ]
    );
    assert_eq!(errors.borrow().len(), 1);
}

#[test]
fn full_join_many_sees_whole_groups() {
    let left = SourceCache::new(|i: &Item| i.id);
    let right = SourceCache::new(|r: &RightRow| r.key);
    left.add_or_update(item(1, "parent"));
    right.add_or_update(RightRow {
        key: "x",
        left_id: 1,
    });
    right.add_or_update(RightRow {
        key: "y",
        left_id: 1,
    });

    let joined = full_join_many(
        &left.connect(),
        &right.connect(),
        |r: &RightRow| r.left_id,
        |_key, l: Option<&Item>, group: &Grouping<RightRow, &'static str, i32>| {
            (l.map(|i| i.name.clone()), group.len())
        },
    );
    let view = MaterializedCache::new(&joined);

    assert_eq!(view.lookup(&1), Some((Some("parent".into()), 2)));

    right.remove(&"x");
    assert_eq!(view.lookup(&1), Some((Some("parent".into()), 1)));

    right.remove(&"y");
    assert_eq!(view.lookup(&1), Some((Some("parent".into()), 0)));

    left.remove(&1);
    assert!(view.is_empty());
}

#[test]
fn no_empty_change_sets_reach_downstream() {
    let a = SourceCache::new(|v: &i32| *v);
    let b = SourceCache::new(|v: &i32| *v);

    let emitted = Rc::new(RefCell::new(Vec::new()));
    let emitted_clone = emitted.clone();
    let _sub = combine_static(vec![a.connect(), b.connect()], CombineOperator::And)
        .subscribe_next(move |set: &ChangeSet<i32, i32>| {
            emitted_clone.borrow_mut().push(set.clone())
        });

    // Not in both sources: membership never changes, nothing may be
    // emitted.
    a.add_or_update(1);
    a.remove(&1);
    b.add_or_update(2);

    for set in emitted.borrow().iter() {
        assert!(set.total_changes() >= 1);
    }
    assert!(emitted.borrow().is_empty());
}

#[test]
fn counters_match_change_sequences() {
    let source = SourceCache::new(|i: &Item| i.id);

    let sets = Rc::new(RefCell::new(Vec::new()));
    let sets_clone = sets.clone();
    let _sub = source
        .connect()
        .subscribe_next(move |set: &ChangeSet<Item, i32>| sets_clone.borrow_mut().push(set.clone()));

    source.edit(|cache| {
        cache.add_or_update(item(1, "a"));
        cache.add_or_update(item(1, "b"));
        cache.add_or_update(item(2, "c"));
        cache.remove(&2);
        cache.refresh(&1);
    });

    for set in sets.borrow().iter() {
        let mut adds = 0;
        let mut updates = 0;
        let mut removes = 0;
        let mut refreshes = 0;
        let mut moves = 0;
        for change in set.iter() {
            match change.reason {
                ChangeReason::Add => adds += 1,
                ChangeReason::Update => updates += 1,
                ChangeReason::Remove => removes += 1,
                ChangeReason::Refresh => refreshes += 1,
                ChangeReason::Moved => moves += 1,
            }
        }
        assert_eq!(set.adds(), adds);
        assert_eq!(set.updates(), updates);
        assert_eq!(set.removes(), removes);
        assert_eq!(set.refreshes(), refreshes);
        assert_eq!(set.moves(), moves);
        assert_eq!(
            set.total_changes(),
            adds + updates + removes + refreshes + moves
        );
    }
}

#[test]
fn disposal_is_idempotent_and_stops_emissions() {
    let source = SourceCache::new(|v: &i32| *v);

    let received = Rc::new(RefCell::new(0));
    let received_clone = received.clone();
    let mut sub = count(&source.connect()).subscribe_next(move |_: &usize| {
        *received_clone.borrow_mut() += 1;
    });

    source.add_or_update(1);
    assert_eq!(*received.borrow(), 1);

    sub.dispose();
    sub.dispose();

    source.add_or_update(2);
    assert_eq!(*received.borrow(), 1);
}

#[test]
fn aggregates_never_repeat_consecutive_values() {
    let source = SourceCache::new(|v: &(i32, i32)| v.0);

    let emissions = Rc::new(RefCell::new(Vec::new()));
    let emissions_clone = emissions.clone();
    let _sub = maximum(&source.connect(), |v: &(i32, i32)| v.1, 0)
        .subscribe_next(move |v: &i32| emissions_clone.borrow_mut().push(*v));

    source.add_or_update((1, 5));
    source.add_or_update((2, 3));
    source.add_or_update((3, 4));
    source.remove(&2);
    source.remove(&3);

    let emissions = emissions.borrow();
    for window in emissions.windows(2) {
        assert_ne!(window[0], window[1]);
    }
    assert_eq!(*emissions, vec![5]);
}

#[test]
fn replaying_emissions_rebuilds_operator_state() {
    let a = SourceCache::new(|v: &i32| *v);
    let b = SourceCache::new(|v: &i32| *v);

    let replayed = Rc::new(RefCell::new(rill_core::Cache::<i32, i32>::new()));
    let replayed_clone = replayed.clone();
    let stream = combine_static(vec![a.connect(), b.connect()], CombineOperator::Or);
    let _sub = stream.subscribe_next(move |set: &ChangeSet<i32, i32>| {
        replayed_clone.borrow_mut().apply(set).unwrap();
    });
    let view = MaterializedCache::new(&stream);

    a.add_or_update(1);
    b.add_or_update(2);
    a.add_or_update(3);
    a.remove(&1);
    b.add_or_update(1);

    let mut from_replay: Vec<i32> = replayed.borrow().keys().copied().collect();
    from_replay.sort_unstable();
    let mut from_view = view.keys();
    from_view.sort_unstable();
    assert_eq!(from_replay, from_view);
    assert_eq!(from_replay, vec![1, 2, 3]);
}
