use std::rc::Rc;

use super::{RenderStrategy, TaskHandle, Work, WorkMeta};
use crate::runtime::RuntimeHandle;
use crate::slot::RenderTarget;

/// Queues work on the runtime's microtask queue; render requests are
/// coalesced per target and performed once after the queue drains.
#[derive(Clone)]
pub struct DeferredStrategy {
    name: String,
    runtime: RuntimeHandle,
}

impl DeferredStrategy {
    pub fn new(name: impl Into<String>, runtime: RuntimeHandle) -> Self {
        Self {
            name: name.into(),
            runtime,
        }
    }

    pub fn local(runtime: RuntimeHandle) -> Self {
        Self::new("local", runtime)
    }
}

impl RenderStrategy for DeferredStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn schedule(&self, work: Work, _meta: WorkMeta) -> TaskHandle {
        let handle = TaskHandle::new();
        let task = handle.clone();
        self.runtime.spawn_task(Box::new(move || {
            task.run(work);
        }));
        handle
    }

    fn flush(&self, target: &Rc<dyn RenderTarget>) {
        self.runtime.request_flush(target);
    }

    fn mark_dirty(&self, target: &Rc<dyn RenderTarget>) {
        self.runtime.request_mark_dirty(target);
    }
}
