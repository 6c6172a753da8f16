use std::cell::{Cell, RefCell};
use std::fmt;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use listrender_core::{Clock, HostScheduler, RenderTarget};

use super::memory::{Event, EventLog};

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicU64,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, millis: u64) {
        self.now.fetch_add(millis, Ordering::SeqCst);
    }

    pub fn set(&self, millis: u64) {
        self.now.store(millis, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

/// Host that counts turn requests instead of running anything.
#[derive(Debug, Default)]
pub struct ManualHost {
    turns: AtomicUsize,
}

impl ManualHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of turns requested since the last call.
    pub fn take_turns(&self) -> usize {
        self.turns.swap(0, Ordering::SeqCst)
    }
}

impl HostScheduler for ManualHost {
    fn request_turn(&self) {
        self.turns.fetch_add(1, Ordering::SeqCst);
    }
}

/// Parent target that records its render requests into an [`EventLog`].
pub struct RecordingTarget {
    log: EventLog,
    flushes: Cell<usize>,
    marked_dirty: Cell<usize>,
    next_flush: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl RecordingTarget {
    pub fn new(log: EventLog) -> Self {
        Self {
            log,
            flushes: Cell::new(0),
            marked_dirty: Cell::new(0),
            next_flush: RefCell::new(None),
        }
    }

    /// Runs `hook` inside the next flush request, after it is recorded.
    pub fn on_next_flush(&self, hook: impl FnOnce() + 'static) {
        *self.next_flush.borrow_mut() = Some(Box::new(hook));
    }

    pub fn flushes(&self) -> usize {
        self.flushes.get()
    }

    pub fn marked_dirty(&self) -> usize {
        self.marked_dirty.get()
    }
}

impl fmt::Debug for RecordingTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecordingTarget")
            .field("flushes", &self.flushes.get())
            .field("marked_dirty", &self.marked_dirty.get())
            .field("next_flush", &self.next_flush.borrow().is_some())
            .finish()
    }
}

impl RenderTarget for RecordingTarget {
    fn request_flush(&self) {
        self.flushes.set(self.flushes.get() + 1);
        self.log.push(Event::ParentFlushed);
        let hook = self.next_flush.borrow_mut().take();
        if let Some(hook) = hook {
            hook();
        }
    }

    fn request_mark_dirty(&self) {
        self.marked_dirty.set(self.marked_dirty.get() + 1);
        self.log.push(Event::ParentMarkedDirty);
    }
}
