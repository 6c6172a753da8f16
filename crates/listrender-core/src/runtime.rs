use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::platform::HostScheduler;
use crate::slot::RenderTarget;

/// A unit of deferred work queued on the runtime.
pub type Task = Box<dyn FnOnce() + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestKind {
    MarkDirty,
    Flush,
}

struct TargetRequest {
    target: Rc<dyn RenderTarget>,
    kind: RequestKind,
}

pub(crate) fn same_target(a: &Rc<dyn RenderTarget>, b: &Rc<dyn RenderTarget>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

/// Render requests collected during a turn, at most one per target. A flush
/// subsumes a mark-dirty of the same target.
#[derive(Default)]
pub(crate) struct PendingRequests {
    requests: RefCell<Vec<TargetRequest>>,
}

impl PendingRequests {
    pub(crate) fn push(&self, target: &Rc<dyn RenderTarget>, kind: RequestKind) {
        let mut requests = self.requests.borrow_mut();
        match requests
            .iter_mut()
            .find(|request| same_target(&request.target, target))
        {
            Some(existing) => {
                if kind == RequestKind::Flush {
                    existing.kind = RequestKind::Flush;
                }
            }
            None => requests.push(TargetRequest {
                target: Rc::clone(target),
                kind,
            }),
        }
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.requests.borrow().is_empty()
    }

    /// Performs and clears every pending request; `false` if there were none.
    pub(crate) fn perform(&self) -> bool {
        let requests = std::mem::take(&mut *self.requests.borrow_mut());
        if requests.is_empty() {
            return false;
        }
        for request in requests {
            match request.kind {
                RequestKind::Flush => request.target.request_flush(),
                RequestKind::MarkDirty => request.target.request_mark_dirty(),
            }
        }
        true
    }
}

struct RuntimeInner {
    host: Arc<dyn HostScheduler>,
    turn_requested: Cell<bool>,
    draining: Cell<bool>,
    tasks: RefCell<VecDeque<Task>>, // FUTURE(no_std): replace VecDeque with ring buffer.
    requests: PendingRequests,
}

impl RuntimeInner {
    fn new(host: Arc<dyn HostScheduler>) -> Self {
        Self {
            host,
            turn_requested: Cell::new(false),
            draining: Cell::new(false),
            tasks: RefCell::new(VecDeque::new()),
            requests: PendingRequests::default(),
        }
    }

    fn request_turn(&self) {
        if !self.turn_requested.replace(true) {
            self.host.request_turn();
        }
    }

    fn enqueue_task(&self, task: Task) {
        self.tasks.borrow_mut().push_back(task);
        self.request_turn();
    }

    fn enqueue_request(&self, target: &Rc<dyn RenderTarget>, kind: RequestKind) {
        self.requests.push(target, kind);
        self.request_turn();
    }

    fn next_task(&self) -> Option<Task> {
        self.tasks.borrow_mut().pop_front()
    }

    fn drain(&self) -> usize {
        if self.draining.replace(true) {
            return 0;
        }
        self.turn_requested.set(false);
        let mut ran = 0;
        loop {
            while let Some(task) = self.next_task() {
                task();
                ran += 1;
            }
            if !self.requests.perform() {
                break;
            }
        }
        self.draining.set(false);
        ran
    }

    fn has_tasks(&self) -> bool {
        !self.tasks.borrow().is_empty() || !self.requests.is_empty()
    }
}

/// Microtask queue drained at the end of a host turn.
#[derive(Clone)]
pub struct Runtime {
    inner: Rc<RuntimeInner>,
}

impl Runtime {
    pub fn new(host: Arc<dyn HostScheduler>) -> Self {
        Self {
            inner: Rc::new(RuntimeInner::new(host)),
        }
    }

    pub fn handle(&self) -> RuntimeHandle {
        RuntimeHandle(Rc::downgrade(&self.inner))
    }

    /// Runs every queued task, then the coalesced target requests. Returns
    /// the number of tasks that ran.
    pub fn drain(&self) -> usize {
        self.inner.drain()
    }

    pub fn has_pending_tasks(&self) -> bool {
        self.inner.has_tasks()
    }

    pub fn turn_requested(&self) -> bool {
        self.inner.turn_requested.get()
    }
}

/// Host that never gets asked for anything; turns are driven by hand.
#[derive(Debug, Default)]
pub struct DefaultHost;

impl HostScheduler for DefaultHost {
    fn request_turn(&self) {}
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Arc::new(DefaultHost))
    }
}

/// Weak handle to a [`Runtime`]; inert once the runtime is gone.
#[derive(Clone)]
pub struct RuntimeHandle(pub(crate) Weak<RuntimeInner>);

impl RuntimeHandle {
    /// Queues `task`; runs it inline when the runtime no longer exists.
    pub fn spawn_task(&self, task: Task) {
        if let Some(inner) = self.0.upgrade() {
            inner.enqueue_task(task);
        } else {
            task();
        }
    }

    /// Coalesced flush performed after the next drain.
    pub fn request_flush(&self, target: &Rc<dyn RenderTarget>) {
        match self.0.upgrade() {
            Some(inner) => inner.enqueue_request(target, RequestKind::Flush),
            None => target.request_flush(),
        }
    }

    /// Coalesced mark-dirty performed after the next drain, unless a flush of
    /// the same target is pending already.
    pub fn request_mark_dirty(&self, target: &Rc<dyn RenderTarget>) {
        match self.0.upgrade() {
            Some(inner) => inner.enqueue_request(target, RequestKind::MarkDirty),
            None => target.request_mark_dirty(),
        }
    }

    pub fn drain(&self) -> usize {
        self.0.upgrade().map(|inner| inner.drain()).unwrap_or(0)
    }

    pub fn has_pending_tasks(&self) -> bool {
        self.0
            .upgrade()
            .map(|inner| inner.has_tasks())
            .unwrap_or(false)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

#[cfg(test)]
#[path = "tests/runtime_tests.rs"]
mod tests;
