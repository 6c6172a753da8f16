use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

use listrender_core::{ComputedContext, RenderSlot, SlotContainer, SlotError};

/// Observable effect on the in-memory container or the parent target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Event {
    Created { slot: usize, at: usize },
    Moved { slot: usize, from: usize, to: usize },
    Removed { slot: usize, at: usize },
    Rendered { slot: usize },
    ParentFlushed,
    ParentMarkedDirty,
}

impl Event {
    pub fn is_parent(&self) -> bool {
        matches!(self, Event::ParentFlushed | Event::ParentMarkedDirty)
    }
}

/// Shared, ordered record of [`Event`]s.
#[derive(Clone, Default)]
pub struct EventLog {
    events: Rc<RefCell<Vec<Event>>>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: Event) {
        self.events.borrow_mut().push(event);
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.borrow().clone()
    }

    pub fn clear(&self) {
        self.events.borrow_mut().clear();
    }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events.borrow().iter().filter(|event| predicate(event)).count()
    }

    pub fn parent_notifications(&self) -> usize {
        self.count(Event::is_parent)
    }
}

impl fmt::Debug for EventLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.events.borrow().iter()).finish()
    }
}

struct SlotState<T> {
    id: usize,
    item: RefCell<T>,
    context: Cell<ComputedContext>,
    attached: Cell<bool>,
    renders: Cell<usize>,
    last_render: RefCell<Option<(T, ComputedContext)>>,
    fail_render: Cell<bool>,
    log: EventLog,
}

/// Slot of a [`MemorySlotContainer`]; clones share the same slot.
pub struct TestSlot<T> {
    state: Rc<SlotState<T>>,
}

impl<T> Clone for TestSlot<T> {
    fn clone(&self) -> Self {
        Self {
            state: Rc::clone(&self.state),
        }
    }
}

impl<T: Clone> TestSlot<T> {
    pub fn id(&self) -> usize {
        self.state.id
    }

    /// Number of times the slot rendered.
    pub fn renders(&self) -> usize {
        self.state.renders.get()
    }

    /// Item and context as of the last render.
    pub fn last_render(&self) -> Option<(T, ComputedContext)> {
        self.state.last_render.borrow().clone()
    }

    /// Makes every later render of this slot fail.
    pub fn fail_renders(&self) {
        self.state.fail_render.set(true);
    }
}

impl<T: fmt::Debug> fmt::Debug for TestSlot<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestSlot")
            .field("id", &self.state.id)
            .field("item", &self.state.item.borrow())
            .field("context", &self.state.context.get())
            .field("attached", &self.state.attached.get())
            .finish()
    }
}

impl<T: Clone> RenderSlot for TestSlot<T> {
    type Item = T;

    fn item(&self) -> T {
        self.state.item.borrow().clone()
    }

    fn bind(&self, item: T) {
        *self.state.item.borrow_mut() = item;
    }

    fn context(&self) -> ComputedContext {
        self.state.context.get()
    }

    fn set_context(&self, context: ComputedContext) {
        self.state.context.set(context);
    }

    fn detach(&self) {
        self.state.attached.set(false);
    }

    fn reattach(&self) {
        self.state.attached.set(true);
    }

    fn is_attached(&self) -> bool {
        self.state.attached.get()
    }

    fn detect_changes(&self) -> Result<(), SlotError> {
        if !self.state.attached.get() {
            return Err(SlotError::Host(format!(
                "slot {} rendered while detached",
                self.state.id
            )));
        }
        if self.state.fail_render.get() {
            return Err(SlotError::Host(format!("slot {} failed to render", self.state.id)));
        }
        self.state.renders.set(self.state.renders.get() + 1);
        *self.state.last_render.borrow_mut() = Some((self.item(), self.context()));
        self.state.log.push(Event::Rendered {
            slot: self.state.id,
        });
        Ok(())
    }

    fn same_slot(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.state, &other.state)
    }
}

type CreateFilter<T> = Box<dyn Fn(&T) -> bool>;

/// Vec backed [`SlotContainer`] that records every mutation in an
/// [`EventLog`].
pub struct MemorySlotContainer<T> {
    slots: Vec<TestSlot<T>>,
    next_id: usize,
    log: EventLog,
    reject_create: Option<CreateFilter<T>>,
}

impl<T: Clone + 'static> MemorySlotContainer<T> {
    pub fn new(log: EventLog) -> Self {
        Self {
            slots: Vec::new(),
            next_id: 0,
            log,
            reject_create: None,
        }
    }

    /// Refuses to create slots for items matching `reject`.
    pub fn reject_create(&mut self, reject: impl Fn(&T) -> bool + 'static) {
        self.reject_create = Some(Box::new(reject));
    }

    pub fn slot(&self, index: usize) -> Option<&TestSlot<T>> {
        self.slots.get(index)
    }

    pub fn slots(&self) -> &[TestSlot<T>] {
        &self.slots
    }

    /// Slot ids in container order.
    pub fn ids(&self) -> Vec<usize> {
        self.slots.iter().map(TestSlot::id).collect()
    }

    pub fn contexts(&self) -> Vec<ComputedContext> {
        self.slots.iter().map(RenderSlot::context).collect()
    }

    pub fn log(&self) -> &EventLog {
        &self.log
    }
}

impl<T: Clone + 'static> SlotContainer for MemorySlotContainer<T> {
    type Item = T;
    type Template = ();
    type Slot = TestSlot<T>;

    fn len(&self) -> usize {
        self.slots.len()
    }

    fn get(&self, index: usize) -> Option<TestSlot<T>> {
        self.slots.get(index).cloned()
    }

    fn create_at(
        &mut self,
        _template: &(),
        item: T,
        context: ComputedContext,
        index: usize,
    ) -> Result<TestSlot<T>, SlotError> {
        if index > self.slots.len() {
            return Err(SlotError::OutOfBounds {
                index,
                len: self.slots.len(),
            });
        }
        if self.reject_create.as_ref().is_some_and(|reject| reject(&item)) {
            return Err(SlotError::Host(format!("slot creation rejected at {index}")));
        }
        let id = self.next_id;
        self.next_id += 1;
        let slot = TestSlot {
            state: Rc::new(SlotState {
                id,
                item: RefCell::new(item),
                context: Cell::new(context),
                attached: Cell::new(false),
                renders: Cell::new(0),
                last_render: RefCell::new(None),
                fail_render: Cell::new(false),
                log: self.log.clone(),
            }),
        };
        self.slots.insert(index, slot.clone());
        self.log.push(Event::Created { slot: id, at: index });
        Ok(slot)
    }

    fn move_to(&mut self, slot: &TestSlot<T>, index: usize) -> Result<TestSlot<T>, SlotError> {
        let from = self.index_of(slot).ok_or(SlotError::Foreign)?;
        let moved = self.slots.remove(from);
        let to = index.min(self.slots.len());
        self.slots.insert(to, moved.clone());
        self.log.push(Event::Moved {
            slot: moved.id(),
            from,
            to,
        });
        Ok(moved)
    }

    fn remove_at(&mut self, index: usize) -> Result<(), SlotError> {
        if index >= self.slots.len() {
            return Err(SlotError::Missing { index });
        }
        let removed = self.slots.remove(index);
        self.log.push(Event::Removed {
            slot: removed.id(),
            at: index,
        });
        Ok(())
    }

    fn index_of(&self, slot: &TestSlot<T>) -> Option<usize> {
        self.slots
            .iter()
            .position(|candidate| candidate.same_slot(slot))
    }
}
