use super::*;

#[derive(Debug, Clone, PartialEq)]
struct Row {
    id: char,
    label: &'static str,
}

fn row(id: char) -> Row {
    Row { id, label: "" }
}

fn labelled(id: char, label: &'static str) -> Row {
    Row { id, label }
}

fn rows(ids: &str) -> Vec<Row> {
    ids.chars().map(row).collect()
}

fn by_id(row: &Row) -> char {
    row.id
}

fn kinds(set: &ChangeSet<Row>) -> Vec<(ChangeKind, char)> {
    set.iter().map(|record| (record.kind(), record.item().id)).collect()
}

#[test]
fn identical_snapshots_are_idle() {
    let items = rows("abcd");
    let set = classify(&items, &items, by_id).unwrap();

    assert!(set.is_idle());
    assert!(!set.notify_parent());
    assert_eq!(set.records.len(), 4);
    for (index, record) in set.iter().enumerate() {
        assert_eq!(record.previous_index(), Some(index));
        assert_eq!(record.current_index(), Some(index));
    }
}

#[test]
fn remove_insert_and_move_in_one_pass() {
    let set = classify(&rows("abc"), &rows("cad"), by_id).unwrap();

    assert_eq!(
        set.records,
        vec![
            ChangeRecord::Remove {
                item: row('b'),
                previous_index: 1,
            },
            ChangeRecord::Unchanged {
                item: row('c'),
                previous_index: 2,
                index: 0,
            },
            ChangeRecord::Move {
                item: row('a'),
                previous_index: 0,
                current_index: 1,
            },
            ChangeRecord::Insert {
                item: row('d'),
                current_index: 2,
            },
        ]
    );
    assert_eq!(set.count, 3);
    assert_eq!(set.previous_count, 3);
    assert!(set.notify_parent());
}

#[test]
fn first_insert_into_empty_list() {
    let set = classify(&[], &rows("x"), by_id).unwrap();

    assert_eq!(
        set.records,
        vec![ChangeRecord::Insert {
            item: row('x'),
            current_index: 0,
        }]
    );
    assert_eq!(set.count, 1);
    assert!(set.notify_parent());
}

#[test]
fn value_change_is_an_update_without_notification() {
    let previous = vec![labelled('x', "old")];
    let next = vec![labelled('x', "new")];
    let set = classify(&previous, &next, by_id).unwrap();

    assert_eq!(
        set.records,
        vec![ChangeRecord::Update {
            item: labelled('x', "new"),
            previous_index: 0,
            current_index: 0,
        }]
    );
    assert!(!set.notify_parent());
}

#[test]
fn single_item_moved_forward_is_the_only_move() {
    let set = classify(&rows("abcdef"), &rows("abdefc"), by_id).unwrap();

    assert_eq!(set.count_of(ChangeKind::Move), 1);
    assert_eq!(set.count_of(ChangeKind::Unchanged), 5);
    let moved = set
        .iter()
        .find(|record| record.kind() == ChangeKind::Move)
        .unwrap();
    assert_eq!(moved.item().id, 'c');
    assert_eq!(moved.previous_index(), Some(2));
    assert_eq!(moved.current_index(), Some(5));
    assert!(!set.notify_parent());
}

#[test]
fn index_drift_is_not_a_move() {
    let set = classify(&rows("bcd"), &rows("abcd"), by_id).unwrap();

    assert_eq!(set.count_of(ChangeKind::Move), 0);
    assert_eq!(set.count_of(ChangeKind::Insert), 1);
    assert_eq!(set.count_of(ChangeKind::Unchanged), 3);

    let set = classify(&rows("abcd"), &rows("cd"), by_id).unwrap();
    assert_eq!(set.count_of(ChangeKind::Move), 0);
    assert_eq!(set.count_of(ChangeKind::Remove), 2);
}

#[test]
fn moved_and_changed_item_emits_move_then_update() {
    let previous = vec![labelled('a', "1"), row('b'), row('c')];
    let next = vec![row('b'), row('c'), labelled('a', "2")];
    let set = classify(&previous, &next, by_id).unwrap();

    assert_eq!(
        kinds(&set),
        vec![
            (ChangeKind::Unchanged, 'b'),
            (ChangeKind::Unchanged, 'c'),
            (ChangeKind::Move, 'a'),
            (ChangeKind::Update, 'a'),
        ]
    );
}

#[test]
fn reversal_keeps_a_single_stationary_item() {
    let set = classify(&rows("abcd"), &rows("dcba"), by_id).unwrap();

    assert_eq!(set.count_of(ChangeKind::Move), 3);
    assert_eq!(set.count_of(ChangeKind::Unchanged), 1);
    // ties resolve toward the earliest run in the new order
    assert_eq!(
        set.iter()
            .find(|record| record.kind() == ChangeKind::Unchanged)
            .map(|record| record.item().id),
        Some('d')
    );
}

#[test]
fn removes_are_reported_in_ascending_previous_order() {
    let set = classify(&rows("abcde"), &rows("bd"), by_id).unwrap();
    let removed: Vec<usize> = set
        .iter()
        .filter(|record| record.kind() == ChangeKind::Remove)
        .filter_map(ChangeRecord::previous_index)
        .collect();
    assert_eq!(removed, vec![0, 2, 4]);
}

#[test]
fn positional_records_claim_every_new_index_once() {
    let set = classify(&rows("abcdefg"), &rows("gxbdaqc"), by_id).unwrap();

    let mut claimed = vec![0usize; set.count];
    for record in set.iter() {
        if record.kind() == ChangeKind::Remove {
            continue;
        }
        if let Some(index) = record.current_index() {
            claimed[index] += 1;
        }
    }
    assert!(claimed.iter().all(|&claims| claims == 1));

    let mut previous: Vec<Option<char>> = vec![None; set.previous_count];
    for record in set.iter() {
        if let Some(index) = record.previous_index() {
            previous[index] = Some(record.item().id);
        }
    }
    let rebuilt: String = previous.into_iter().flatten().collect();
    assert_eq!(rebuilt, "abcdefg");
}

#[test]
fn duplicate_key_in_next_snapshot_is_rejected() {
    let error = classify(&rows("ab"), &rows("aba"), by_id).unwrap_err();
    assert_eq!(
        error,
        ClassificationError::DuplicateKey {
            snapshot: Snapshot::Next,
            key: "'a'".to_string(),
            first: 0,
            second: 2,
        }
    );
}

#[test]
fn duplicate_key_in_previous_snapshot_is_rejected() {
    let error = classify(&rows("aa"), &rows("a"), by_id).unwrap_err();
    assert!(matches!(
        error,
        ClassificationError::DuplicateKey {
            snapshot: Snapshot::Previous,
            ..
        }
    ));
}
