use std::fmt;

use thiserror::Error;

use crate::diff::ChangeKind;
use crate::work::WorkIndex;

/// Which side of a reconciliation a snapshot came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Snapshot {
    Previous,
    Next,
}

impl fmt::Display for Snapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Snapshot::Previous => f.write_str("previous"),
            Snapshot::Next => f.write_str("next"),
        }
    }
}

/// Raised before any slot is touched; the batch is aborted as a whole.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassificationError {
    #[error("duplicate identity key {key} in {snapshot} snapshot at indices {first} and {second}")]
    DuplicateKey {
        snapshot: Snapshot,
        key: String,
        first: usize,
        second: usize,
    },
}

/// Failure reported by a [`SlotContainer`](crate::SlotContainer) or a
/// [`RenderSlot`](crate::RenderSlot).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SlotError {
    #[error("no slot at index {index}")]
    Missing { index: usize },
    #[error("index {index} out of bounds for container of length {len}")]
    OutOfBounds { index: usize, len: usize },
    #[error("slot does not belong to this container")]
    Foreign,
    #[error("host failure: {0}")]
    Host(String),
}

/// A single work function failed; its siblings in the batch still ran.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} work for key {key} at {index} failed: {source}")]
pub struct WorkError {
    /// Identity key of the item the work belonged to, formatted with `Debug`.
    pub key: String,
    pub kind: ChangeKind,
    pub index: WorkIndex,
    #[source]
    pub source: SlotError,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrategyError {
    #[error("unknown render strategy `{name}`")]
    Unknown { name: String },
}
