#![doc = r"Keyed list reconciliation with pluggable render scheduling strategies."]

pub mod collections;
pub mod config;
pub mod diff;
pub mod error;
pub mod executor;
pub mod frame_clock;
pub mod hash;
pub mod platform;
pub mod registry;
pub mod renderer;
pub mod runtime;
pub mod scheduler;
pub mod slot;
pub mod source;
pub mod strategy;
pub mod subscription;
pub mod work;

pub use config::{RenderConfig, SchedulerConfig};
pub use diff::{classify, ChangeKind, ChangeRecord, ChangeSet};
pub use error::{ClassificationError, SlotError, Snapshot, StrategyError, WorkError};
pub use executor::{BatchCompletion, BatchOutcome, BatchStatus, CompletionChannel, RenderExecutor};
pub use frame_clock::{FrameBudget, DEFAULT_FRAME_BUDGET_MILLIS};
pub use platform::{Clock, HostScheduler};
pub use registry::{NameStream, StrategyRegistry, StrategySelection, StrategyStream, DEFAULT_STRATEGY};
pub use renderer::{ListRenderer, TrackBy};
pub use runtime::{DefaultHost, Runtime, RuntimeHandle, Task};
pub use scheduler::{Priority, PriorityScheduler, SchedulerHandle};
pub use slot::{ComputedContext, RenderSlot, RenderTarget, SlotContainer};
pub use source::{ItemSource, SnapshotSubject};
pub use strategy::{
    ConcurrentStrategy, DeferredStrategy, ImmediateNotify, ImmediateStrategy, RenderStrategy,
    TaskHandle, Work, WorkMeta,
};
pub use subscription::Subscription;
pub use work::{aggregate, ParentWork, WorkEntry, WorkIndex, WorkOp, WorkPlan};
