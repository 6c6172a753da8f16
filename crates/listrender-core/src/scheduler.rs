//! Cooperative priority scheduler shared by the concurrent strategies.
//!
//! Tasks are ordered by expiration time (submission time plus the priority's
//! timeout), then by submission order. A slice runs tasks until its frame
//! budget is spent; tasks that already expired run regardless, so low
//! priority work cannot starve forever behind a busy queue.

use std::cell::{Cell, RefCell};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use crate::config::SchedulerConfig;
use crate::frame_clock::FrameBudget;
use crate::platform::{Clock, HostScheduler};
use crate::runtime::{PendingRequests, RequestKind};
use crate::slot::RenderTarget;
use crate::strategy::{TaskHandle, Work};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Priority {
    Immediate,
    UserBlocking,
    Normal,
    Low,
    Idle,
}

impl Priority {
    pub const ALL: [Priority; 5] = [
        Priority::Immediate,
        Priority::UserBlocking,
        Priority::Normal,
        Priority::Low,
        Priority::Idle,
    ];

    /// Milliseconds after submission at which a task of this priority expires.
    pub fn timeout_millis(self) -> u64 {
        match self {
            Priority::Immediate => 0,
            Priority::UserBlocking => 250,
            Priority::Normal => 5_000,
            Priority::Low => 10_000,
            Priority::Idle => u64::MAX,
        }
    }

    /// Strategy name registered for this priority.
    pub fn name(self) -> &'static str {
        match self {
            Priority::Immediate => "immediate",
            Priority::UserBlocking => "userBlocking",
            Priority::Normal => "normal",
            Priority::Low => "low",
            Priority::Idle => "idle",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

struct QueuedTask {
    expires_at: u64,
    seq: u64,
    handle: TaskHandle,
    work: Work,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.expires_at == other.expires_at && self.seq == other.seq
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.expires_at, self.seq).cmp(&(other.expires_at, other.seq))
    }
}

struct SchedulerInner {
    clock: Arc<dyn Clock>,
    host: Arc<dyn HostScheduler>,
    config: SchedulerConfig,
    queue: RefCell<BinaryHeap<Reverse<QueuedTask>>>,
    next_seq: Cell<u64>,
    requests: PendingRequests,
    slice_requested: Cell<bool>,
    running: Cell<bool>,
    closed: Cell<bool>,
}

impl SchedulerInner {
    fn request_slice(&self) {
        if !self.slice_requested.replace(true) {
            self.host.request_turn();
        }
    }

    fn schedule(&self, priority: Priority, work: Work) -> TaskHandle {
        let handle = TaskHandle::new();
        if self.closed.get() {
            log::warn!("{priority} work submitted after scheduler shutdown; running inline");
            handle.run(work);
            return handle;
        }
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        let expires_at = self
            .clock
            .now_millis()
            .saturating_add(priority.timeout_millis());
        self.queue.borrow_mut().push(Reverse(QueuedTask {
            expires_at,
            seq,
            handle: handle.clone(),
            work,
        }));
        self.request_slice();
        handle
    }

    fn request(&self, target: &Rc<dyn RenderTarget>, kind: RequestKind) {
        if self.closed.get() {
            match kind {
                RequestKind::Flush => target.request_flush(),
                RequestKind::MarkDirty => target.request_mark_dirty(),
            }
            return;
        }
        self.requests.push(target, kind);
        self.request_slice();
    }

    /// Pops the next task, or `None` when the slice should yield.
    fn next_task(&self, budget: Option<&FrameBudget>, ran: usize) -> Option<QueuedTask> {
        let mut queue = self.queue.borrow_mut();
        let Reverse(head) = queue.peek()?;
        if let Some(budget) = budget {
            if ran > 0 && budget.exhausted() && head.expires_at > budget.now_millis() {
                return None;
            }
        }
        queue.pop().map(|Reverse(task)| task)
    }

    fn run_tasks(&self, budget: Option<&FrameBudget>) -> usize {
        let mut ran = 0;
        while let Some(task) = self.next_task(budget, ran) {
            if task.handle.run(task.work) {
                ran += 1;
            } else {
                log::trace!("discarding cancelled task #{}", task.seq);
            }
        }
        ran
    }

    fn run_slice(&self) -> usize {
        if self.running.replace(true) {
            return 0;
        }
        self.slice_requested.set(false);
        let budget = FrameBudget::start(Arc::clone(&self.clock), self.config.frame_budget_millis);
        let ran = self.run_tasks(Some(&budget));
        self.requests.perform();
        self.running.set(false);
        if self.has_pending() {
            log::debug!(
                "yielding after {ran} task(s) in {}ms, {} left",
                budget.elapsed_millis(),
                self.pending()
            );
            self.request_slice();
        }
        ran
    }

    fn drain(&self) -> usize {
        if self.running.replace(true) {
            return 0;
        }
        self.slice_requested.set(false);
        let mut ran = 0;
        loop {
            ran += self.run_tasks(None);
            if !self.requests.perform() && self.queue.borrow().is_empty() {
                break;
            }
        }
        self.running.set(false);
        ran
    }

    fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    fn has_pending(&self) -> bool {
        !self.queue.borrow().is_empty() || !self.requests.is_empty()
    }
}

/// Explicit, constructible cooperative scheduler.
#[derive(Clone)]
pub struct PriorityScheduler {
    inner: Rc<SchedulerInner>,
}

impl PriorityScheduler {
    pub fn new(clock: Arc<dyn Clock>, host: Arc<dyn HostScheduler>) -> Self {
        Self::with_config(clock, host, SchedulerConfig::default())
    }

    pub fn with_config(
        clock: Arc<dyn Clock>,
        host: Arc<dyn HostScheduler>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            inner: Rc::new(SchedulerInner {
                clock,
                host,
                config,
                queue: RefCell::new(BinaryHeap::new()),
                next_seq: Cell::new(0),
                requests: PendingRequests::default(),
                slice_requested: Cell::new(false),
                running: Cell::new(false),
                closed: Cell::new(false),
            }),
        }
    }

    pub fn handle(&self) -> SchedulerHandle {
        SchedulerHandle(Rc::downgrade(&self.inner))
    }

    pub fn config(&self) -> SchedulerConfig {
        self.inner.config
    }

    pub fn schedule(&self, priority: Priority, work: Work) -> TaskHandle {
        self.inner.schedule(priority, work)
    }

    /// Runs tasks until the frame budget is spent, then performs the pending
    /// render requests. Requests another slice if work remains.
    pub fn run_slice(&self) -> usize {
        self.inner.run_slice()
    }

    /// Runs every queued task regardless of budget.
    pub fn drain(&self) -> usize {
        self.inner.drain()
    }

    /// Drains, then closes the scheduler. Later submissions run inline.
    pub fn shutdown(&self) -> usize {
        let ran = self.inner.drain();
        self.inner.closed.set(true);
        log::debug!("priority scheduler shut down after {ran} task(s)");
        ran
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.get()
    }

    /// Number of queued tasks, cancelled ones included.
    pub fn pending(&self) -> usize {
        self.inner.pending()
    }

    pub fn has_pending(&self) -> bool {
        self.inner.has_pending()
    }

    pub fn slice_requested(&self) -> bool {
        self.inner.slice_requested.get()
    }
}

/// Weak handle held by strategies.
#[derive(Clone)]
pub struct SchedulerHandle(Weak<SchedulerInner>);

impl SchedulerHandle {
    /// Queues `work`; runs it inline when the scheduler no longer exists.
    pub fn schedule(&self, priority: Priority, work: Work) -> TaskHandle {
        match self.0.upgrade() {
            Some(inner) => inner.schedule(priority, work),
            None => {
                let handle = TaskHandle::new();
                handle.run(work);
                handle
            }
        }
    }

    pub fn request_flush(&self, target: &Rc<dyn RenderTarget>) {
        match self.0.upgrade() {
            Some(inner) => inner.request(target, RequestKind::Flush),
            None => target.request_flush(),
        }
    }

    pub fn request_mark_dirty(&self, target: &Rc<dyn RenderTarget>) {
        match self.0.upgrade() {
            Some(inner) => inner.request(target, RequestKind::MarkDirty),
            None => target.request_mark_dirty(),
        }
    }

    pub fn run_slice(&self) -> usize {
        self.0.upgrade().map(|inner| inner.run_slice()).unwrap_or(0)
    }

    pub fn drain(&self) -> usize {
        self.0.upgrade().map(|inner| inner.drain()).unwrap_or(0)
    }

    pub fn pending(&self) -> usize {
        self.0.upgrade().map(|inner| inner.pending()).unwrap_or(0)
    }

    pub fn is_alive(&self) -> bool {
        self.0.strong_count() > 0
    }
}

#[cfg(test)]
#[path = "tests/scheduler_tests.rs"]
mod tests;
