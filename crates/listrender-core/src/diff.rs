//! Identity based change classification between two snapshots.
//!
//! Survivors (keys present in both snapshots) are split into a stationary
//! run and movers. The stationary run is the longest run of survivors whose
//! relative order did not change; ties go to the run that starts earliest in
//! the new snapshot. Everything else in that group is a `Move`. Index drift
//! caused by inserts and removes elsewhere is never reported as a move.

use std::fmt;
use std::hash::Hash;

use crate::collections::IdentityMap;
use crate::error::{ClassificationError, Snapshot};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Insert,
    Remove,
    Move,
    Update,
    Unchanged,
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ChangeKind::Insert => "insert",
            ChangeKind::Remove => "remove",
            ChangeKind::Move => "move",
            ChangeKind::Update => "update",
            ChangeKind::Unchanged => "unchanged",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChangeRecord<T> {
    Insert {
        item: T,
        current_index: usize,
    },
    Remove {
        item: T,
        previous_index: usize,
    },
    Move {
        item: T,
        previous_index: usize,
        current_index: usize,
    },
    /// The value changed. Emitted after the `Move` of the same item when the
    /// item also moved.
    Update {
        item: T,
        previous_index: usize,
        current_index: usize,
    },
    Unchanged {
        item: T,
        previous_index: usize,
        index: usize,
    },
}

impl<T> ChangeRecord<T> {
    pub fn kind(&self) -> ChangeKind {
        match self {
            ChangeRecord::Insert { .. } => ChangeKind::Insert,
            ChangeRecord::Remove { .. } => ChangeKind::Remove,
            ChangeRecord::Move { .. } => ChangeKind::Move,
            ChangeRecord::Update { .. } => ChangeKind::Update,
            ChangeRecord::Unchanged { .. } => ChangeKind::Unchanged,
        }
    }

    pub fn item(&self) -> &T {
        match self {
            ChangeRecord::Insert { item, .. }
            | ChangeRecord::Remove { item, .. }
            | ChangeRecord::Move { item, .. }
            | ChangeRecord::Update { item, .. }
            | ChangeRecord::Unchanged { item, .. } => item,
        }
    }

    pub fn previous_index(&self) -> Option<usize> {
        match self {
            ChangeRecord::Insert { .. } => None,
            ChangeRecord::Remove { previous_index, .. }
            | ChangeRecord::Move { previous_index, .. }
            | ChangeRecord::Update { previous_index, .. }
            | ChangeRecord::Unchanged { previous_index, .. } => Some(*previous_index),
        }
    }

    pub fn current_index(&self) -> Option<usize> {
        match self {
            ChangeRecord::Remove { .. } => None,
            ChangeRecord::Insert { current_index, .. }
            | ChangeRecord::Move { current_index, .. }
            | ChangeRecord::Update { current_index, .. } => Some(*current_index),
            ChangeRecord::Unchanged { index, .. } => Some(*index),
        }
    }

    /// Inserts and removes change the parent's structural assumptions.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            ChangeRecord::Insert { .. } | ChangeRecord::Remove { .. }
        )
    }
}

/// Output of one classification pass.
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeSet<T> {
    pub records: Vec<ChangeRecord<T>>,
    pub previous_count: usize,
    pub count: usize,
}

impl<T> ChangeSet<T> {
    pub fn notify_parent(&self) -> bool {
        self.records.iter().any(ChangeRecord::is_structural)
    }

    /// `true` when every record is `Unchanged`.
    pub fn is_idle(&self) -> bool {
        self.records
            .iter()
            .all(|record| record.kind() == ChangeKind::Unchanged)
    }

    pub fn count_of(&self, kind: ChangeKind) -> usize {
        self.records
            .iter()
            .filter(|record| record.kind() == kind)
            .count()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChangeRecord<T>> {
        self.records.iter()
    }
}

pub fn classify<T, K>(
    previous: &[T],
    next: &[T],
    track_by: impl Fn(&T) -> K,
) -> Result<ChangeSet<T>, ClassificationError>
where
    T: Clone + PartialEq,
    K: Hash + Eq + fmt::Debug,
{
    let previous_keys = index_keys(previous, &track_by, Snapshot::Previous)?;
    let next_keys = index_keys(next, &track_by, Snapshot::Next)?;

    let mut records = Vec::with_capacity(previous.len().max(next.len()));

    for (previous_index, item) in previous.iter().enumerate() {
        if !next_keys.contains_key(&track_by(item)) {
            records.push(ChangeRecord::Remove {
                item: item.clone(),
                previous_index,
            });
        }
    }

    let sources: Vec<Option<usize>> = next
        .iter()
        .map(|item| previous_keys.get(&track_by(item)).copied())
        .collect();
    let stationary = stationary_run(&sources);

    for (current_index, item) in next.iter().enumerate() {
        let Some(previous_index) = sources[current_index] else {
            records.push(ChangeRecord::Insert {
                item: item.clone(),
                current_index,
            });
            continue;
        };
        let changed = previous[previous_index] != *item;
        if !stationary[current_index] {
            records.push(ChangeRecord::Move {
                item: item.clone(),
                previous_index,
                current_index,
            });
        }
        if changed {
            records.push(ChangeRecord::Update {
                item: item.clone(),
                previous_index,
                current_index,
            });
        } else if stationary[current_index] {
            records.push(ChangeRecord::Unchanged {
                item: item.clone(),
                previous_index,
                index: current_index,
            });
        }
    }

    Ok(ChangeSet {
        records,
        previous_count: previous.len(),
        count: next.len(),
    })
}

fn index_keys<T, K>(
    items: &[T],
    track_by: &impl Fn(&T) -> K,
    snapshot: Snapshot,
) -> Result<IdentityMap<K, usize>, ClassificationError>
where
    K: Hash + Eq + fmt::Debug,
{
    let mut keys = IdentityMap::with_capacity_and_hasher(items.len(), Default::default());
    for (index, item) in items.iter().enumerate() {
        let key = track_by(item);
        if let Some(&first) = keys.get(&key) {
            return Err(ClassificationError::DuplicateKey {
                snapshot,
                key: format!("{key:?}"),
                first,
                second: index,
            });
        }
        keys.insert(key, index);
    }
    Ok(keys)
}

/// Marks the positions of `sources` (previous index per new position, `None`
/// for inserts) that belong to the stationary run. Patience sorting, so
/// O(n log n).
fn stationary_run(sources: &[Option<usize>]) -> Vec<bool> {
    // tails[l] = (previous index, position) ending the best run of length l + 1
    let mut tails: Vec<(usize, usize)> = Vec::new();
    let mut parent: Vec<Option<usize>> = vec![None; sources.len()];
    let mut lengths = vec![0usize; sources.len()];

    for (position, source) in sources.iter().enumerate() {
        let Some(value) = *source else {
            continue;
        };
        let run = tails.partition_point(|&(tail, _)| tail < value);
        parent[position] = run.checked_sub(1).map(|shorter| tails[shorter].1);
        lengths[position] = run + 1;
        if run == tails.len() {
            tails.push((value, position));
        } else {
            tails[run] = (value, position);
        }
    }

    let mut stationary = vec![false; sources.len()];
    let longest = tails.len();
    if longest == 0 {
        return stationary;
    }
    let mut cursor = lengths.iter().position(|&length| length == longest);
    while let Some(position) = cursor {
        stationary[position] = true;
        cursor = parent[position];
    }
    stationary
}

#[cfg(test)]
#[path = "tests/diff_tests.rs"]
mod tests;
