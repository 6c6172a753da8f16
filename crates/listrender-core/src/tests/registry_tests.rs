use super::*;
use crate::runtime::Runtime;
use crate::scheduler::PriorityScheduler;
use crate::slot::RenderTarget;
use crate::strategy::{ImmediateNotify, TaskHandle, Work, WorkMeta};
use crate::work::WorkIndex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

#[derive(Default)]
struct FrozenClock {
    now: AtomicU64,
}

impl crate::platform::Clock for FrozenClock {
    fn now_millis(&self) -> u64 {
        self.now.load(Ordering::SeqCst)
    }
}

fn builtins() -> (Runtime, PriorityScheduler, Rc<StrategyRegistry>) {
    let runtime = Runtime::default();
    let scheduler = PriorityScheduler::new(
        Arc::new(FrozenClock::default()),
        Arc::new(crate::runtime::DefaultHost),
    );
    let registry = StrategyRegistry::with_defaults(runtime.handle(), scheduler.handle());
    (runtime, scheduler, Rc::new(registry))
}

fn meta() -> WorkMeta {
    WorkMeta {
        generation: 1,
        index: WorkIndex::Slot(0),
    }
}

#[test]
fn default_table_has_every_builtin_name() {
    let (_runtime, _scheduler, registry) = builtins();
    assert_eq!(
        registry.names(),
        [
            "normal",
            "sync",
            "native",
            "noop",
            "local",
            "immediate",
            "userBlocking",
            "low",
            "idle"
        ]
    );
    assert_eq!(registry.default_strategy().name(), DEFAULT_STRATEGY);
}

#[test]
fn unknown_name_is_an_error() {
    let (_runtime, _scheduler, registry) = builtins();
    assert_eq!(
        registry.get("turbo").map(|strategy| strategy.name().to_string()),
        Err(StrategyError::Unknown {
            name: "turbo".to_string()
        })
    );
}

#[test]
fn stream_falls_back_to_default_for_unknown_names() {
    let (_runtime, _scheduler, registry) = builtins();
    let stream = registry.resolve("turbo");
    assert_eq!(stream.current().name(), "normal");
    assert_eq!(stream.selected_name(), "turbo");
}

#[test]
fn name_stream_switches_on_next_read() {
    let (_runtime, _scheduler, registry) = builtins();
    let names = NameStream::new("sync");
    let stream = registry.resolve(names.clone());
    assert_eq!(stream.current().name(), "sync");

    names.emit("local");
    assert_eq!(stream.current().name(), "local");

    stream.next_strategy("idle");
    names.emit("sync");
    assert_eq!(stream.current().name(), "idle");
}

#[test]
fn merge_overrides_entries_by_name() {
    let (_runtime, _scheduler, registry) = builtins();
    let mut merged = (*registry).clone();
    let mut custom = StrategyRegistry::new(Rc::new(ImmediateStrategy::noop()));
    custom.register_as("normal", Rc::new(ImmediateStrategy::sync()));
    custom.register(Rc::new(ImmediateStrategy::new(
        "chunked",
        ImmediateNotify::MarkDirty,
    )));
    merged.merge(custom);

    assert_eq!(merged.len(), 10);
    assert!(merged.contains("chunked"));
    let normal = merged.get("normal").map(|strategy| strategy.name().to_string());
    assert_eq!(normal, Ok("sync".to_string()));
    assert_eq!(merged.default_strategy().name(), "sync");
    assert_eq!(registry.get("normal").map(|s| s.name().to_string()), Ok("normal".to_string()));
}

#[test]
fn local_strategy_defers_to_the_runtime() {
    let (runtime, _scheduler, registry) = builtins();
    let local = registry.get("local").unwrap();
    let ran = Rc::new(std::cell::Cell::new(false));
    let flag = Rc::clone(&ran);
    let handle = local.schedule(Box::new(move || flag.set(true)), meta());

    assert!(!ran.get());
    assert!(!handle.is_finished());
    runtime.drain();
    assert!(ran.get());
    assert!(handle.is_finished());
}

#[test]
fn concurrent_strategy_queues_on_the_scheduler() {
    let (_runtime, scheduler, registry) = builtins();
    let low = registry.get("low").unwrap();
    let ran = Rc::new(std::cell::Cell::new(false));
    let flag = Rc::clone(&ran);
    low.schedule(Box::new(move || flag.set(true)), meta());

    assert_eq!(scheduler.pending(), 1);
    scheduler.run_slice();
    assert!(ran.get());
}

struct Recorder(RefCell<Vec<&'static str>>);

impl RenderTarget for Recorder {
    fn request_flush(&self) {
        self.0.borrow_mut().push("flush");
    }

    fn request_mark_dirty(&self) {
        self.0.borrow_mut().push("dirty");
    }
}

#[test]
fn immediate_strategies_flush_differently() {
    let (_runtime, _scheduler, registry) = builtins();
    let recorder = Rc::new(Recorder(RefCell::new(Vec::new())));
    let target: Rc<dyn RenderTarget> = recorder.clone();
    for name in ["sync", "native", "noop"] {
        let strategy = registry.get(name).unwrap();
        strategy.flush(&target);
        let handle: TaskHandle = strategy.schedule(Box::new(|| {}) as Work, meta());
        assert!(handle.is_finished());
    }
    assert_eq!(*recorder.0.borrow(), ["flush", "dirty"]);
}
