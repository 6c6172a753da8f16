use std::sync::Arc;

use crate::platform::Clock;

/// Default time slice a cooperative scheduler may use before yielding.
pub const DEFAULT_FRAME_BUDGET_MILLIS: u64 = 5;

/// Time budget of one scheduler slice, measured against a [`Clock`].
#[derive(Clone)]
pub struct FrameBudget {
    clock: Arc<dyn Clock>,
    started_at: u64,
    budget_millis: u64,
}

impl FrameBudget {
    pub fn start(clock: Arc<dyn Clock>, budget_millis: u64) -> Self {
        let started_at = clock.now_millis();
        Self {
            clock,
            started_at,
            budget_millis,
        }
    }

    pub fn started_at(&self) -> u64 {
        self.started_at
    }

    pub fn now_millis(&self) -> u64 {
        self.clock.now_millis()
    }

    pub fn elapsed_millis(&self) -> u64 {
        self.clock.elapsed_millis(self.started_at)
    }

    pub fn remaining_millis(&self) -> u64 {
        self.budget_millis.saturating_sub(self.elapsed_millis())
    }

    pub fn exhausted(&self) -> bool {
        self.elapsed_millis() >= self.budget_millis
    }
}
