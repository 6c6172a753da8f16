use std::cell::RefCell;
use std::rc::Rc;

use listrender_core::{
    aggregate, classify, BatchStatus, DeferredStrategy, RenderExecutor, RenderStrategy,
    RenderTarget, Runtime, SlotContainer, TaskHandle, Work, WorkMeta, WorkPlan,
};
use listrender_testing::prelude::*;

type Container = MemorySlotContainer<char>;

fn plan(container: &Rc<RefCell<Container>>, next: &str) -> WorkPlan<Container> {
    let previous = container.borrow().items();
    let next: Vec<char> = next.chars().collect();
    let set = classify(&previous, &next, |item| *item).expect("unique keys");
    aggregate(&set, &*container.borrow(), &Rc::new(()), |item| *item, None)
}

fn text(container: &Rc<RefCell<Container>>) -> String {
    container.borrow().items().into_iter().collect()
}

/// Keeps every unit it is given, ignoring cancellation, until told to run them.
#[derive(Default)]
struct Hoarding {
    queued: RefCell<Vec<Work>>,
}

impl Hoarding {
    fn run_all(&self) -> usize {
        let mut ran = 0;
        loop {
            let work = std::mem::take(&mut *self.queued.borrow_mut());
            if work.is_empty() {
                return ran;
            }
            for unit in work {
                unit();
                ran += 1;
            }
        }
    }
}

impl RenderStrategy for Hoarding {
    fn name(&self) -> &str {
        "hoarding"
    }

    fn schedule(&self, work: Work, _meta: WorkMeta) -> TaskHandle {
        self.queued.borrow_mut().push(work);
        TaskHandle::new()
    }

    fn flush(&self, _target: &Rc<dyn RenderTarget>) {}

    fn mark_dirty(&self, _target: &Rc<dyn RenderTarget>) {}
}

#[test]
fn pending_tracks_only_the_batch_in_flight() {
    let runtime = Runtime::default();
    let strategy: Rc<dyn RenderStrategy> = Rc::new(DeferredStrategy::local(runtime.handle()));
    let container = Rc::new(RefCell::new(MemorySlotContainer::new(EventLog::new())));
    let executor = RenderExecutor::new(Rc::clone(&container));

    let first = executor.execute(plan(&container, "abc"), Rc::clone(&strategy));
    assert_eq!(executor.pending(), 3);

    let second = executor.execute(plan(&container, "xy"), Rc::clone(&strategy));
    assert_eq!(executor.pending(), 2);
    assert_eq!(
        first.outcome().map(|outcome| outcome.status),
        Some(BatchStatus::Superseded)
    );

    runtime.drain();
    assert_eq!(executor.pending(), 0);
    assert!(executor.is_idle());
    assert_eq!(text(&container), "xy");
    assert!(second.outcome().is_some_and(|outcome| outcome.is_rendered()));
}

#[test]
fn stale_units_that_still_run_touch_nothing() {
    let log = EventLog::new();
    let hoarding = Rc::new(Hoarding::default());
    let strategy: Rc<dyn RenderStrategy> = hoarding.clone();
    let container = Rc::new(RefCell::new(MemorySlotContainer::new(log.clone())));
    let executor = RenderExecutor::new(Rc::clone(&container));

    let first = executor.execute(plan(&container, "abc"), Rc::clone(&strategy));
    let second = executor.execute(plan(&container, "ba"), Rc::clone(&strategy));

    // Superseded units run first, and only the claim keeps them out.
    assert_eq!(hoarding.run_all(), 5);
    assert_eq!(text(&container), "ba");
    assert_eq!(log.count(|event| matches!(event, Event::Created { .. })), 2);
    assert_eq!(
        first.outcome().map(|outcome| outcome.status),
        Some(BatchStatus::Superseded)
    );
    assert!(second.outcome().is_some_and(|outcome| outcome.is_rendered()));
    assert_eq!(executor.pending(), 0);
}
