use std::rc::Rc;

use super::{RenderStrategy, TaskHandle, Work, WorkMeta};
use crate::scheduler::{Priority, SchedulerHandle};
use crate::slot::RenderTarget;

/// Cooperative strategy backed by the shared [`PriorityScheduler`].
///
/// [`PriorityScheduler`]: crate::scheduler::PriorityScheduler
#[derive(Clone)]
pub struct ConcurrentStrategy {
    priority: Priority,
    scheduler: SchedulerHandle,
}

impl ConcurrentStrategy {
    pub fn new(priority: Priority, scheduler: SchedulerHandle) -> Self {
        Self {
            priority,
            scheduler,
        }
    }

    pub fn priority(&self) -> Priority {
        self.priority
    }
}

impl RenderStrategy for ConcurrentStrategy {
    fn name(&self) -> &str {
        self.priority.name()
    }

    fn schedule(&self, work: Work, _meta: WorkMeta) -> TaskHandle {
        self.scheduler.schedule(self.priority, work)
    }

    fn flush(&self, target: &Rc<dyn RenderTarget>) {
        self.scheduler.request_flush(target);
    }

    fn mark_dirty(&self, target: &Rc<dyn RenderTarget>) {
        self.scheduler.request_mark_dirty(target);
    }
}
