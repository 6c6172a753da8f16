use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::rc::Rc;
use std::sync::Arc;

use listrender_core::{
    BatchCompletion, BatchOutcome, ComputedContext, ListRenderer, PriorityScheduler, RenderConfig,
    RenderTarget, Runtime, SchedulerConfig, SlotContainer, StrategyRegistry, StrategySelection,
    Subscription,
};

use super::host::{ManualClock, ManualHost, RecordingTarget};
use super::memory::{Event, EventLog, MemorySlotContainer};

/// Configures a [`Harness`].
pub struct HarnessBuilder<T, K> {
    track_by: Rc<dyn Fn(&T) -> K>,
    strategy: StrategySelection,
    config: RenderConfig,
    scheduler: SchedulerConfig,
    with_parent: bool,
}

impl<T, K> HarnessBuilder<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Hash + Eq + fmt::Debug + 'static,
{
    pub fn strategy(mut self, selection: impl Into<StrategySelection>) -> Self {
        self.strategy = selection.into();
        self
    }

    pub fn config(mut self, config: RenderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn frame_budget(mut self, millis: u64) -> Self {
        self.scheduler.frame_budget_millis = millis;
        self
    }

    /// Renders without a parent target.
    pub fn detached(mut self) -> Self {
        self.with_parent = false;
        self
    }

    pub fn build(self) -> Harness<T, K> {
        let log = EventLog::new();
        let clock = Arc::new(ManualClock::new());
        let host = Arc::new(ManualHost::new());
        let runtime = Runtime::new(host.clone());
        let scheduler = PriorityScheduler::with_config(clock.clone(), host.clone(), self.scheduler);
        let registry = Rc::new(StrategyRegistry::with_defaults(
            runtime.handle(),
            scheduler.handle(),
        ));
        let container = Rc::new(RefCell::new(MemorySlotContainer::new(log.clone())));
        let parent = Rc::new(RecordingTarget::new(log.clone()));
        let parent_target: Option<Rc<dyn RenderTarget>> = if self.with_parent {
            Some(parent.clone())
        } else {
            None
        };
        let track_by = Rc::clone(&self.track_by);
        let renderer = ListRenderer::new(
            Rc::clone(&container),
            (),
            move |item: &T| track_by(item),
            registry.resolve(self.strategy),
            parent_target,
            self.config,
        );
        let outcomes = Rc::new(RefCell::new(Vec::new()));
        let recorded = Rc::clone(&outcomes);
        let batches = renderer.on_batch(move |outcome| recorded.borrow_mut().push(outcome.clone()));
        Harness {
            runtime,
            scheduler,
            clock,
            host,
            registry,
            container,
            parent,
            log,
            renderer,
            outcomes,
            _batches: batches,
        }
    }
}

/// A renderer wired to an in-memory container, a recording parent and
/// manually driven runtime services.
pub struct Harness<T: Clone + 'static, K> {
    pub runtime: Runtime,
    pub scheduler: PriorityScheduler,
    pub clock: Arc<ManualClock>,
    pub host: Arc<ManualHost>,
    pub registry: Rc<StrategyRegistry>,
    pub container: Rc<RefCell<MemorySlotContainer<T>>>,
    pub parent: Rc<RecordingTarget>,
    pub log: EventLog,
    pub renderer: ListRenderer<MemorySlotContainer<T>, K>,
    outcomes: Rc<RefCell<Vec<BatchOutcome>>>,
    _batches: Subscription,
}

impl<T, K> Harness<T, K>
where
    T: Clone + PartialEq + 'static,
    K: Hash + Eq + fmt::Debug + 'static,
{
    pub fn builder(track_by: impl Fn(&T) -> K + 'static) -> HarnessBuilder<T, K> {
        HarnessBuilder {
            track_by: Rc::new(track_by),
            strategy: StrategySelection::from("sync"),
            config: RenderConfig::default(),
            scheduler: SchedulerConfig::default(),
            with_parent: true,
        }
    }

    /// Harness on the `sync` strategy.
    pub fn new(track_by: impl Fn(&T) -> K + 'static) -> Self {
        Self::builder(track_by).build()
    }

    pub fn render(&self, items: Vec<T>) -> BatchCompletion {
        self.renderer.render(items)
    }

    /// Renders and runs every queued turn until the batch resolves.
    pub fn render_and_settle(&self, items: Vec<T>) -> Option<BatchOutcome> {
        let completion = self.render(items);
        self.settle();
        completion.outcome()
    }

    /// Drains the runtime and the scheduler until neither has work left.
    pub fn settle(&self) {
        loop {
            let ran = self.runtime.drain() + self.scheduler.drain();
            if ran == 0 && !self.runtime.has_pending_tasks() && !self.scheduler.has_pending() {
                break;
            }
        }
    }

    pub fn items(&self) -> Vec<T> {
        self.container.borrow().items()
    }

    pub fn ids(&self) -> Vec<usize> {
        self.container.borrow().ids()
    }

    pub fn contexts(&self) -> Vec<ComputedContext> {
        self.container.borrow().contexts()
    }

    pub fn events(&self) -> Vec<Event> {
        self.log.events()
    }

    pub fn outcomes(&self) -> Vec<BatchOutcome> {
        self.outcomes.borrow().clone()
    }
}
