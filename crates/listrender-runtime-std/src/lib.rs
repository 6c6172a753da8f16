//! Standard host services backed by Rust's `std` library.
//!
//! This crate provides concrete implementations of the platform traits
//! defined in `listrender-core`. Applications construct a [`StdRuntime`],
//! resolve strategies from its registry and drive it with [`StdRuntime::turn`]
//! from their own event loop.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use futures_task::ArcWake;
use listrender_core::{
    BatchCompletion, BatchOutcome, Clock, HostScheduler, PriorityScheduler, Runtime,
    RuntimeHandle, SchedulerConfig, SchedulerHandle, StrategyRegistry, StrategySelection,
    StrategyStream,
};

type TurnWaker = Arc<dyn Fn() + Send + Sync + 'static>;

#[derive(Default)]
struct TurnState {
    requested: bool,
    requests: u64,
    waker: Option<TurnWaker>,
}

/// Host scheduler for threaded event loops.
///
/// A turn request raises a flag that the loop consumes with
/// [`take_turn_request`](Self::take_turn_request) or blocks on with
/// [`wait_for_turn`](Self::wait_for_turn). An optional waker lets loops that
/// sleep elsewhere (a window event loop, a channel) be poked as well.
pub struct StdScheduler {
    state: Mutex<TurnState>,
    signal: Condvar,
}

impl StdScheduler {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(TurnState::default()),
            signal: Condvar::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, TurnState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Consumes a pending turn request.
    pub fn take_turn_request(&self) -> bool {
        std::mem::take(&mut self.state().requested)
    }

    /// Blocks until a turn is requested or `timeout` passes, consuming the
    /// request. Returns whether a turn is due.
    pub fn wait_for_turn(&self, timeout: Duration) -> bool {
        let state = self.state();
        let (mut state, _) = self
            .signal
            .wait_timeout_while(state, timeout, |state| !state.requested)
            .unwrap_or_else(PoisonError::into_inner);
        std::mem::take(&mut state.requested)
    }

    /// Turn requests received over the scheduler's lifetime.
    pub fn requests(&self) -> u64 {
        self.state().requests
    }

    /// Registers a callback run on every turn request, after the request is
    /// recorded and outside the scheduler's lock.
    pub fn set_turn_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.state().waker = Some(Arc::new(waker));
    }

    pub fn clear_turn_waker(&self) {
        self.state().waker = None;
    }
}

impl Default for StdScheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for StdScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state();
        f.debug_struct("StdScheduler")
            .field("requested", &state.requested)
            .field("requests", &state.requests)
            .field("waker", &state.waker.is_some())
            .finish()
    }
}

impl HostScheduler for StdScheduler {
    fn request_turn(&self) {
        let waker = {
            let mut state = self.state();
            state.requested = true;
            state.requests += 1;
            state.waker.clone()
        };
        self.signal.notify_all();
        if let Some(waker) = waker {
            waker();
        }
    }
}

/// Monotonic clock counting milliseconds from its creation.
#[derive(Debug, Clone)]
pub struct StdClock {
    epoch: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }

    /// Time since the clock was created.
    pub fn elapsed(&self) -> Duration {
        self.epoch.elapsed()
    }
}

impl Default for StdClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for StdClock {
    fn now_millis(&self) -> u64 {
        u64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(u64::MAX)
    }
}

/// Flag flipped by a batch completion's waker.
#[derive(Default)]
struct CompletionFlag(AtomicBool);

impl CompletionFlag {
    fn take(&self) -> bool {
        self.0.swap(false, Ordering::SeqCst)
    }
}

impl ArcWake for CompletionFlag {
    fn wake_by_ref(arc_self: &Arc<Self>) {
        arc_self.0.store(true, Ordering::SeqCst);
    }
}

/// Bundles the microtask runtime, the cooperative scheduler and the built-in
/// strategy table on top of the standard scheduler and clock.
#[derive(Clone)]
pub struct StdRuntime {
    scheduler: Arc<StdScheduler>,
    clock: Arc<StdClock>,
    runtime: Runtime,
    priority: PriorityScheduler,
    registry: Rc<StrategyRegistry>,
}

impl StdRuntime {
    pub fn new() -> Self {
        Self::with_config(SchedulerConfig::default())
    }

    pub fn with_config(config: SchedulerConfig) -> Self {
        let scheduler = Arc::new(StdScheduler::default());
        let clock = Arc::new(StdClock::default());
        let runtime = Runtime::new(scheduler.clone());
        let priority = PriorityScheduler::with_config(clock.clone(), scheduler.clone(), config);
        let registry = Rc::new(StrategyRegistry::with_defaults(
            runtime.handle(),
            priority.handle(),
        ));
        Self {
            scheduler,
            clock,
            runtime,
            priority,
            registry,
        }
    }

    pub fn runtime(&self) -> Runtime {
        self.runtime.clone()
    }

    pub fn runtime_handle(&self) -> RuntimeHandle {
        self.runtime.handle()
    }

    pub fn priority_scheduler(&self) -> PriorityScheduler {
        self.priority.clone()
    }

    pub fn scheduler_handle(&self) -> SchedulerHandle {
        self.priority.handle()
    }

    pub fn registry(&self) -> Rc<StrategyRegistry> {
        Rc::clone(&self.registry)
    }

    /// Live strategy selection over the built-in table.
    pub fn strategies(&self, selection: impl Into<StrategySelection>) -> StrategyStream {
        self.registry.resolve(selection)
    }

    pub fn scheduler(&self) -> Arc<StdScheduler> {
        Arc::clone(&self.scheduler)
    }

    pub fn clock(&self) -> Arc<StdClock> {
        Arc::clone(&self.clock)
    }

    /// Returns whether a turn was requested since the last poll.
    pub fn take_turn_request(&self) -> bool {
        self.scheduler.take_turn_request()
    }

    pub fn set_turn_waker(&self, waker: impl Fn() + Send + Sync + 'static) {
        self.scheduler.set_turn_waker(waker);
    }

    pub fn clear_turn_waker(&self) {
        self.scheduler.clear_turn_waker();
    }

    /// One host turn: the microtask queue first, then one budgeted slice of
    /// cooperative work. Returns the number of tasks that ran.
    pub fn turn(&self) -> usize {
        self.runtime.drain() + self.priority.run_slice()
    }

    pub fn has_pending_work(&self) -> bool {
        self.runtime.has_pending_tasks() || self.priority.has_pending()
    }

    /// Turns until neither queue holds work.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        while self.has_pending_work() {
            ran += self.turn();
        }
        self.scheduler.take_turn_request();
        ran
    }

    /// Turns until `completion` resolves. Returns `None` when every queue ran
    /// dry first, which means the batch can no longer finish.
    ///
    /// The completion is polled once to register a waker, then again only
    /// after that waker fires.
    pub fn run_until_complete(&self, mut completion: BatchCompletion) -> Option<BatchOutcome> {
        let flag = Arc::new(CompletionFlag::default());
        let waker = futures_task::waker(flag.clone());
        let mut cx = Context::from_waker(&waker);
        if let Poll::Ready(outcome) = Pin::new(&mut completion).poll(&mut cx) {
            return Some(outcome);
        }
        let mut turns = 0usize;
        loop {
            if flag.take() {
                if let Poll::Ready(outcome) = Pin::new(&mut completion).poll(&mut cx) {
                    log::trace!("batch {} completed after {turns} turn(s)", outcome.generation);
                    return Some(outcome);
                }
            }
            if !self.has_pending_work() {
                log::warn!("runtime went idle before the batch completed");
                return None;
            }
            self.turn();
            turns += 1;
        }
    }

    /// Runs all remaining work and closes the cooperative scheduler; later
    /// cooperative work runs inline.
    pub fn shutdown(&self) -> usize {
        let mut ran = self.runtime.drain();
        ran += self.priority.shutdown();
        ran += self.runtime.drain();
        log::debug!("std runtime shut down after {ran} task(s)");
        ran
    }
}

impl fmt::Debug for StdRuntime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StdRuntime")
            .field("scheduler", &self.scheduler)
            .field("clock", &self.clock)
            .field("registry", &self.registry)
            .finish()
    }
}

impl Default for StdRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use listrender_core::{
        BatchStatus, Clock, HostScheduler, ListRenderer, Priority, RenderConfig, RenderTarget,
        DEFAULT_STRATEGY,
    };
    use listrender_testing::{EventLog, MemorySlotContainer, RecordingTarget};

    use super::{StdClock, StdRuntime, StdScheduler};

    fn renderer(
        runtime: &StdRuntime,
        strategy: &str,
    ) -> (ListRenderer<MemorySlotContainer<char>, char>, Rc<RecordingTarget>) {
        let log = EventLog::new();
        let parent = Rc::new(RecordingTarget::new(log.clone()));
        let target: Rc<dyn RenderTarget> = parent.clone();
        let renderer = ListRenderer::new(
            Rc::new(RefCell::new(MemorySlotContainer::new(log))),
            (),
            |item: &char| *item,
            runtime.strategies(strategy),
            Some(target),
            RenderConfig::default(),
        );
        (renderer, parent)
    }

    fn text(renderer: &ListRenderer<MemorySlotContainer<char>, char>) -> String {
        use listrender_core::SlotContainer;
        renderer.container().borrow().items().into_iter().collect()
    }

    #[test]
    fn scheduler_records_requests_and_wakes() {
        let scheduler = StdScheduler::new();
        let woken = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&woken);
        scheduler.set_turn_waker(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        scheduler.request_turn();
        scheduler.request_turn();
        assert!(scheduler.take_turn_request());
        assert!(!scheduler.take_turn_request());
        assert_eq!(scheduler.requests(), 2);
        assert_eq!(woken.load(Ordering::SeqCst), 2);

        scheduler.clear_turn_waker();
        scheduler.request_turn();
        assert_eq!(woken.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn waiting_loop_wakes_on_a_request_from_another_thread() {
        let scheduler = Arc::new(StdScheduler::new());
        assert!(!scheduler.wait_for_turn(Duration::from_millis(1)));

        let remote = Arc::clone(&scheduler);
        let requester = thread::spawn(move || remote.request_turn());
        assert!(scheduler.wait_for_turn(Duration::from_secs(5)));
        requester.join().expect("requesting thread");

        assert!(!scheduler.take_turn_request());
        assert_eq!(scheduler.requests(), 1);
    }

    #[test]
    fn waker_may_reenter_the_scheduler() {
        let scheduler = Arc::new(StdScheduler::new());
        let seen = Arc::new(AtomicUsize::new(0));
        let (inner, counter) = (Arc::downgrade(&scheduler), Arc::clone(&seen));
        scheduler.set_turn_waker(move || {
            if let Some(scheduler) = inner.upgrade() {
                if scheduler.take_turn_request() {
                    counter.fetch_add(1, Ordering::SeqCst);
                }
            }
        });

        scheduler.request_turn();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(!scheduler.take_turn_request());
    }

    #[test]
    fn clock_never_goes_backwards() {
        let clock = StdClock::new();
        let first = clock.now_millis();
        let second = clock.now_millis();
        assert!(second >= first);
        assert!(clock.elapsed_millis(first) <= clock.now_millis());
    }

    #[test]
    fn registry_holds_the_built_in_strategies() {
        let runtime = StdRuntime::new();
        let registry = runtime.registry();
        assert_eq!(registry.default_strategy().name(), DEFAULT_STRATEGY);
        for name in ["sync", "native", "noop", "local"] {
            assert!(registry.contains(name), "{name}");
        }
        for priority in Priority::ALL {
            assert!(registry.contains(priority.name()), "{priority}");
        }
    }

    #[test]
    fn cooperative_batch_completes_through_turns() {
        let runtime = StdRuntime::new();
        let (renderer, parent) = renderer(&runtime, DEFAULT_STRATEGY);

        let completion = renderer.render("abc".chars().collect());
        assert!(runtime.take_turn_request());

        let outcome = runtime.run_until_complete(completion).expect("batch finished");
        assert!(outcome.is_rendered());
        assert_eq!(text(&renderer), "abc");
        assert_eq!(parent.flushes(), 1);
    }

    #[test]
    fn local_batch_completes_through_turns() {
        let runtime = StdRuntime::new();
        let (renderer, parent) = renderer(&runtime, "local");
        renderer.render("ab".chars().collect());
        let completion = renderer.render("ba".chars().collect());

        let outcome = runtime.run_until_complete(completion).expect("batch finished");
        assert_eq!(outcome.generation, 2);
        assert_eq!(outcome.status, BatchStatus::Rendered);
        assert_eq!(text(&renderer), "ba");
        assert_eq!(parent.flushes(), 1);
    }

    #[test]
    fn resolved_batches_need_no_turns() {
        let runtime = StdRuntime::new();
        let (renderer, _parent) = renderer(&runtime, "sync");
        let completion = renderer.render(vec!['a']);

        assert!(!runtime.has_pending_work());
        assert!(runtime.run_until_complete(completion).is_some());
    }

    #[test]
    fn run_until_idle_drains_both_queues() {
        let runtime = StdRuntime::new();
        let (cooperative, _) = renderer(&runtime, "low");
        let (local, _) = renderer(&runtime, "local");
        cooperative.render("xyz".chars().collect());
        local.render("pq".chars().collect());

        assert!(runtime.run_until_idle() >= 5);
        assert!(!runtime.has_pending_work());
        assert_eq!(text(&cooperative), "xyz");
        assert_eq!(text(&local), "pq");
    }

    #[test]
    fn work_after_shutdown_runs_inline() {
        let runtime = StdRuntime::new();
        let (renderer, _) = renderer(&runtime, "normal");
        runtime.shutdown();

        let completion = renderer.render("ab".chars().collect());
        assert!(completion.is_done());
        assert_eq!(text(&renderer), "ab");
        assert!(runtime.priority_scheduler().is_closed());
    }
}
