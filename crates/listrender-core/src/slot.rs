//! Contracts for the host-owned slot container and its slots.
//!
//! The container owns slot lifetime. The core only asks it to create, move,
//! rebind and remove slots, and it drops every slot handle it captured once
//! the batch that captured it has finished.

use crate::error::SlotError;

/// Positional metadata attached to every slot binding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ComputedContext {
    pub index: usize,
    pub count: usize,
}

impl ComputedContext {
    pub fn new(index: usize, count: usize) -> Self {
        Self { index, count }
    }

    pub fn first(&self) -> bool {
        self.index == 0
    }

    pub fn last(&self) -> bool {
        self.index + 1 == self.count
    }

    pub fn even(&self) -> bool {
        self.index % 2 == 0
    }

    pub fn odd(&self) -> bool {
        !self.even()
    }
}

/// Something the strategies can ask to re-render: a parent view or a slot.
pub trait RenderTarget {
    /// Re-render now (detect changes).
    fn request_flush(&self);

    /// Flag for re-rendering during the host's next own cycle.
    fn request_mark_dirty(&self);
}

/// Handle to a materialized view bound to exactly one item at a time.
///
/// Handles are cheap clones of the same underlying slot; [`same_slot`]
/// compares instance identity, not content.
///
/// [`same_slot`]: RenderSlot::same_slot
pub trait RenderSlot: Clone {
    type Item;

    /// The item currently bound to the slot.
    fn item(&self) -> Self::Item;

    fn bind(&self, item: Self::Item);

    fn context(&self) -> ComputedContext;

    fn set_context(&self, context: ComputedContext);

    /// Suspend rendering.
    fn detach(&self);

    /// Resume rendering.
    fn reattach(&self);

    fn is_attached(&self) -> bool;

    /// Render the slot's current binding.
    fn detect_changes(&self) -> Result<(), SlotError>;

    fn same_slot(&self, other: &Self) -> bool;
}

/// The ordered, externally owned collection of slots.
pub trait SlotContainer {
    type Item;
    type Template;
    type Slot: RenderSlot<Item = Self::Item>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn get(&self, index: usize) -> Option<Self::Slot>;

    fn create_at(
        &mut self,
        template: &Self::Template,
        item: Self::Item,
        context: ComputedContext,
        index: usize,
    ) -> Result<Self::Slot, SlotError>;

    /// Relocates `slot` so that it ends up at `index`, keeping the instance.
    fn move_to(&mut self, slot: &Self::Slot, index: usize) -> Result<Self::Slot, SlotError>;

    fn remove_at(&mut self, index: usize) -> Result<(), SlotError>;

    fn index_of(&self, slot: &Self::Slot) -> Option<usize> {
        (0..self.len()).find(|&index| {
            self.get(index)
                .is_some_and(|candidate| candidate.same_slot(slot))
        })
    }

    /// Items currently bound, in container order.
    fn items(&self) -> Vec<Self::Item> {
        (0..self.len())
            .filter_map(|index| self.get(index))
            .map(|slot| slot.item())
            .collect()
    }
}
