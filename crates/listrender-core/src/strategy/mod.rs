//! Scheduling strategies: how and when a unit of render work runs.

mod concurrent;
mod deferred;
mod immediate;

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::slot::RenderTarget;
use crate::work::WorkIndex;

pub use concurrent::ConcurrentStrategy;
pub use deferred::DeferredStrategy;
pub use immediate::{ImmediateNotify, ImmediateStrategy};

/// A unit of render work handed to a strategy.
pub type Work = Box<dyn FnOnce() + 'static>;

/// Where a unit of work belongs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkMeta {
    pub generation: u64,
    pub index: WorkIndex,
}

#[derive(Default)]
struct TaskState {
    cancelled: Cell<bool>,
    finished: Cell<bool>,
}

/// Cancellable, observable handle to scheduled work.
#[derive(Clone, Default)]
pub struct TaskHandle {
    state: Rc<TaskState>,
}

impl TaskHandle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prevents the work from running if it has not started yet.
    pub fn cancel(&self) {
        if !self.state.finished.get() {
            self.state.cancelled.set(true);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.state.cancelled.get()
    }

    pub fn is_finished(&self) -> bool {
        self.state.finished.get()
    }

    /// Runs `work` unless cancelled. Returns whether it ran.
    pub fn run(&self, work: Work) -> bool {
        if self.is_cancelled() {
            return false;
        }
        work();
        self.state.finished.set(true);
        true
    }
}

impl fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("cancelled", &self.is_cancelled())
            .field("finished", &self.is_finished())
            .finish()
    }
}

/// A named scheduling policy.
///
/// `schedule` decides when `work` runs; `flush` and `mark_dirty` decide how a
/// render target is asked to re-render under this policy.
pub trait RenderStrategy {
    fn name(&self) -> &str;

    fn schedule(&self, work: Work, meta: WorkMeta) -> TaskHandle;

    fn flush(&self, target: &Rc<dyn RenderTarget>);

    fn mark_dirty(&self, target: &Rc<dyn RenderTarget>);
}

impl fmt::Debug for dyn RenderStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("RenderStrategy").field(&self.name()).finish()
    }
}

#[cfg(test)]
#[path = "../tests/strategy_tests.rs"]
mod tests;
