use crate::frame_clock::DEFAULT_FRAME_BUDGET_MILLIS;

/// Per-renderer options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderConfig {
    /// Notify the parent target after batches that insert or remove items.
    pub notify_parent: bool,
    /// Strategy selected at construction; the registry default when `None`.
    pub strategy: Option<String>,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            notify_parent: true,
            strategy: None,
        }
    }
}

impl RenderConfig {
    pub fn with_strategy(mut self, name: impl Into<String>) -> Self {
        self.strategy = Some(name.into());
        self
    }

    pub fn without_parent_notification(mut self) -> Self {
        self.notify_parent = false;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchedulerConfig {
    pub frame_budget_millis: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            frame_budget_millis: DEFAULT_FRAME_BUDGET_MILLIS,
        }
    }
}
