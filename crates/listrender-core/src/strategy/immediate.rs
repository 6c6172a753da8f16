use std::rc::Rc;

use super::{RenderStrategy, TaskHandle, Work, WorkMeta};
use crate::slot::RenderTarget;

/// What an immediate strategy does when asked to flush a target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImmediateNotify {
    /// Re-render synchronously.
    Flush,
    /// Leave it to the host's own cycle.
    MarkDirty,
    /// Never issue render requests.
    Nothing,
}

/// Runs work on the calling turn.
#[derive(Debug, Clone)]
pub struct ImmediateStrategy {
    name: String,
    notify: ImmediateNotify,
}

impl ImmediateStrategy {
    pub fn new(name: impl Into<String>, notify: ImmediateNotify) -> Self {
        Self {
            name: name.into(),
            notify,
        }
    }

    pub fn sync() -> Self {
        Self::new("sync", ImmediateNotify::Flush)
    }

    pub fn native() -> Self {
        Self::new("native", ImmediateNotify::MarkDirty)
    }

    pub fn noop() -> Self {
        Self::new("noop", ImmediateNotify::Nothing)
    }
}

impl RenderStrategy for ImmediateStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn schedule(&self, work: Work, _meta: WorkMeta) -> TaskHandle {
        let handle = TaskHandle::new();
        handle.run(work);
        handle
    }

    fn flush(&self, target: &Rc<dyn RenderTarget>) {
        match self.notify {
            ImmediateNotify::Flush => target.request_flush(),
            ImmediateNotify::MarkDirty => target.request_mark_dirty(),
            ImmediateNotify::Nothing => {}
        }
    }

    fn mark_dirty(&self, target: &Rc<dyn RenderTarget>) {
        if self.notify != ImmediateNotify::Nothing {
            target.request_mark_dirty();
        }
    }
}
