//! Turns a [`ChangeSet`] into per-slot work, keyed by final index.
//!
//! Slot handles are captured from the container while the plan is built and
//! suspended right away. Relocations never use absolute positions computed up
//! front: a slot landing on final index `i` is placed directly after whatever
//! slot owns `i - 1` at the moment the work runs. Running the entries in
//! ascending order then yields the exact snapshot order, regardless of how
//! moves and pending removals interleave.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use crate::collections::IdentityMap;
use crate::diff::{ChangeKind, ChangeRecord, ChangeSet};
use crate::error::{SlotError, WorkError};
use crate::slot::{ComputedContext, RenderSlot, SlotContainer};

/// Position of a unit of work within a batch.
///
/// `NotifyParent` orders after every slot index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkIndex {
    Slot(usize),
    NotifyParent,
}

impl fmt::Display for WorkIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkIndex::Slot(index) => write!(f, "slot {index}"),
            WorkIndex::NotifyParent => f.write_str("parent notification"),
        }
    }
}

type SlotWork<C> =
    Box<dyn FnOnce(&mut C) -> Result<Option<<C as SlotContainer>::Slot>, SlotError>>;

fn slot_work<C, F>(run: F) -> SlotWork<C>
where
    C: SlotContainer,
    F: FnOnce(&mut C) -> Result<Option<C::Slot>, SlotError> + 'static,
{
    Box::new(run)
}

/// Parent notification performed once all slot work of a batch is done.
pub type ParentWork = Box<dyn FnOnce()>;

/// One composable work function.
pub struct WorkOp<C: SlotContainer> {
    key: String,
    kind: ChangeKind,
    run: SlotWork<C>,
}

impl<C: SlotContainer> WorkOp<C> {
    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn kind(&self) -> ChangeKind {
        self.kind
    }

    /// Runs the work; `Ok(None)` means the op left no live slot behind.
    pub fn apply(self, container: &mut C, index: WorkIndex) -> Result<Option<C::Slot>, WorkError> {
        let WorkOp { key, kind, run } = self;
        run(container).map_err(|source| WorkError {
            key,
            kind,
            index,
            source,
        })
    }
}

impl<C: SlotContainer> fmt::Debug for WorkOp<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WorkOp")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .finish()
    }
}

/// Every work function landing on one final index, in append order.
pub struct WorkEntry<C: SlotContainer> {
    pub index: usize,
    pub ops: Vec<WorkOp<C>>,
}

impl<C: SlotContainer> WorkEntry<C> {
    pub fn work_index(&self) -> WorkIndex {
        WorkIndex::Slot(self.index)
    }

    pub fn kinds(&self) -> Vec<ChangeKind> {
        self.ops.iter().map(WorkOp::kind).collect()
    }
}

/// The aggregated work of one batch.
pub struct WorkPlan<C: SlotContainer> {
    pub entries: Vec<WorkEntry<C>>,
    pub parent: Option<ParentWork>,
    pub count: usize,
}

impl<C: SlotContainer> WorkPlan<C> {
    /// Work indices in execution order, sentinel last.
    pub fn indices(&self) -> Vec<WorkIndex> {
        let mut indices: Vec<WorkIndex> = self.entries.iter().map(WorkEntry::work_index).collect();
        if self.parent.is_some() {
            indices.push(WorkIndex::NotifyParent);
        }
        indices
    }

    pub fn entry(&self, index: usize) -> Option<&WorkEntry<C>> {
        self.entries
            .binary_search_by_key(&index, |entry| entry.index)
            .ok()
            .map(|position| &self.entries[position])
    }

    pub fn notifies_parent(&self) -> bool {
        self.parent.is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len() + usize::from(self.parent.is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Final index → slot that ends the batch there.
struct Anchors<S> {
    slots: RefCell<IdentityMap<usize, S>>,
}

impl<S: RenderSlot> Anchors<S> {
    fn new() -> Self {
        Self {
            slots: RefCell::new(IdentityMap::default()),
        }
    }

    fn register(&self, index: usize, slot: S) {
        self.slots.borrow_mut().insert(index, slot);
    }

    /// Position right after the closest placed predecessor of `index`.
    fn position_for<C>(&self, container: &C, index: usize) -> usize
    where
        C: SlotContainer<Slot = S>,
    {
        let slots = self.slots.borrow();
        (0..index)
            .rev()
            .find_map(|previous| {
                slots
                    .get(&previous)
                    .and_then(|slot| container.index_of(slot))
            })
            .map_or(0, |position| position + 1)
            .min(container.len())
    }
}

pub fn aggregate<C, K>(
    change_set: &ChangeSet<C::Item>,
    container: &C,
    template: &Rc<C::Template>,
    track_by: impl Fn(&C::Item) -> K,
    parent: Option<ParentWork>,
) -> WorkPlan<C>
where
    C: SlotContainer + 'static,
    C::Item: Clone,
    K: fmt::Debug,
{
    let count = change_set.count;
    let anchors: Rc<Anchors<C::Slot>> = Rc::new(Anchors::new());

    let mut captured: IdentityMap<usize, C::Slot> = IdentityMap::default();
    for record in change_set.iter() {
        let Some(previous_index) = record.previous_index() else {
            continue;
        };
        if captured.contains_key(&previous_index) {
            continue;
        }
        if let Some(slot) = container.get(previous_index) {
            slot.detach();
            if let Some(current_index) = record.current_index() {
                anchors.register(current_index, slot.clone());
            }
            captured.insert(previous_index, slot);
        }
    }

    let mut entries: BTreeMap<usize, Vec<WorkOp<C>>> = BTreeMap::new();
    for record in change_set.iter() {
        let key = format!("{:?}", track_by(record.item()));
        let kind = record.kind();
        let slot = record
            .previous_index()
            .and_then(|previous_index| captured.get(&previous_index).cloned());
        let (index, run): (usize, SlotWork<C>) = match record.clone() {
            ChangeRecord::Insert {
                item,
                current_index,
            } => {
                let anchors = Rc::clone(&anchors);
                let template = Rc::clone(template);
                (
                    current_index,
                    slot_work(move |container: &mut C| {
                        let position = anchors.position_for(container, current_index);
                        let context = ComputedContext::new(current_index, count);
                        let slot = container.create_at(&template, item, context, position)?;
                        anchors.register(current_index, slot.clone());
                        Ok(Some(slot))
                    }),
                )
            }
            ChangeRecord::Remove { previous_index, .. } => (
                previous_index,
                slot_work(move |container: &mut C| {
                    let position = slot.and_then(|slot| container.index_of(&slot));
                    if let Some(position) = position {
                        container.remove_at(position)?;
                    }
                    Ok(None)
                }),
            ),
            ChangeRecord::Move {
                item,
                previous_index,
                current_index,
            } => {
                let anchors = Rc::clone(&anchors);
                (
                    current_index,
                    slot_work(move |container: &mut C| {
                        let slot = slot.ok_or(SlotError::Missing {
                            index: previous_index,
                        })?;
                        let at = container.index_of(&slot).ok_or(SlotError::Foreign)?;
                        let position = anchors.position_for(container, current_index);
                        let target = if at < position { position - 1 } else { position };
                        let slot = if at == target {
                            slot
                        } else {
                            container.move_to(&slot, target)?
                        };
                        slot.bind(item);
                        slot.set_context(ComputedContext::new(current_index, count));
                        anchors.register(current_index, slot.clone());
                        Ok(Some(slot))
                    }),
                )
            }
            ChangeRecord::Update {
                item,
                previous_index,
                current_index,
            } => (
                current_index,
                slot_work(move |_: &mut C| {
                    let slot = slot.ok_or(SlotError::Missing {
                        index: previous_index,
                    })?;
                    slot.bind(item);
                    slot.set_context(ComputedContext::new(current_index, count));
                    Ok(Some(slot))
                }),
            ),
            ChangeRecord::Unchanged {
                previous_index,
                index,
                ..
            } => (
                index,
                slot_work(move |_: &mut C| {
                    let slot = slot.ok_or(SlotError::Missing {
                        index: previous_index,
                    })?;
                    slot.set_context(ComputedContext::new(index, count));
                    Ok(Some(slot))
                }),
            ),
        };
        entries
            .entry(index)
            .or_default()
            .push(WorkOp { key, kind, run });
    }

    WorkPlan {
        entries: entries
            .into_iter()
            .map(|(index, ops)| WorkEntry { index, ops })
            .collect(),
        parent: parent.filter(|_| change_set.notify_parent()),
        count,
    }
}

#[cfg(test)]
#[path = "tests/work_tests.rs"]
mod tests;
