use super::*;
use std::sync::atomic::{AtomicUsize, Ordering};

#[derive(Default)]
struct CountingHost {
    turns: AtomicUsize,
}

impl HostScheduler for CountingHost {
    fn request_turn(&self) {
        self.turns.fetch_add(1, Ordering::SeqCst);
    }
}

#[derive(Default)]
struct Target {
    log: RefCell<Vec<&'static str>>,
}

impl RenderTarget for Target {
    fn request_flush(&self) {
        self.log.borrow_mut().push("flush");
    }

    fn request_mark_dirty(&self) {
        self.log.borrow_mut().push("dirty");
    }
}

fn runtime_with_host() -> (Runtime, Arc<CountingHost>) {
    let host = Arc::new(CountingHost::default());
    (Runtime::new(host.clone()), host)
}

#[test]
fn tasks_run_fifo_on_drain() {
    let runtime = Runtime::default();
    let handle = runtime.handle();
    let order = Rc::new(RefCell::new(Vec::new()));
    for value in 0..3 {
        let order = Rc::clone(&order);
        handle.spawn_task(Box::new(move || order.borrow_mut().push(value)));
    }

    assert!(order.borrow().is_empty());
    assert!(runtime.has_pending_tasks());
    assert_eq!(runtime.drain(), 3);
    assert_eq!(*order.borrow(), vec![0, 1, 2]);
    assert!(!runtime.has_pending_tasks());
}

#[test]
fn one_turn_requested_per_turn() {
    let (runtime, host) = runtime_with_host();
    let handle = runtime.handle();
    handle.spawn_task(Box::new(|| {}));
    handle.spawn_task(Box::new(|| {}));
    assert_eq!(host.turns.load(Ordering::SeqCst), 1);
    assert!(runtime.turn_requested());

    runtime.drain();
    assert!(!runtime.turn_requested());
    handle.spawn_task(Box::new(|| {}));
    assert_eq!(host.turns.load(Ordering::SeqCst), 2);
}

#[test]
fn tasks_spawned_while_draining_run_in_the_same_drain() {
    let runtime = Runtime::default();
    let handle = runtime.handle();
    let order = Rc::new(RefCell::new(Vec::new()));
    {
        let order = Rc::clone(&order);
        let nested = handle.clone();
        handle.spawn_task(Box::new(move || {
            order.borrow_mut().push("outer");
            let order = Rc::clone(&order);
            nested.spawn_task(Box::new(move || order.borrow_mut().push("inner")));
        }));
    }

    assert_eq!(runtime.drain(), 2);
    assert_eq!(*order.borrow(), vec!["outer", "inner"]);
}

#[test]
fn target_requests_are_coalesced_after_tasks() {
    let runtime = Runtime::default();
    let handle = runtime.handle();
    let target = Rc::new(Target::default());
    let as_target: Rc<dyn RenderTarget> = target.clone();

    handle.request_mark_dirty(&as_target);
    handle.request_flush(&as_target);
    handle.request_flush(&as_target);
    {
        let target = Rc::clone(&target);
        handle.spawn_task(Box::new(move || target.log.borrow_mut().push("task")));
    }
    runtime.drain();

    assert_eq!(*target.log.borrow(), vec!["task", "flush"]);
}

#[test]
fn mark_dirty_alone_stays_mark_dirty() {
    let runtime = Runtime::default();
    let handle = runtime.handle();
    let target = Rc::new(Target::default());
    let as_target: Rc<dyn RenderTarget> = target.clone();

    handle.request_mark_dirty(&as_target);
    handle.request_mark_dirty(&as_target);
    runtime.drain();

    assert_eq!(*target.log.borrow(), vec!["dirty"]);
}

#[test]
fn dead_handle_runs_work_inline() {
    let handle = Runtime::default().handle();
    assert!(!handle.is_alive());

    let ran = Rc::new(Cell::new(false));
    {
        let ran = Rc::clone(&ran);
        handle.spawn_task(Box::new(move || ran.set(true)));
    }
    assert!(ran.get());

    let target = Rc::new(Target::default());
    let as_target: Rc<dyn RenderTarget> = target.clone();
    handle.request_flush(&as_target);
    assert_eq!(*target.log.borrow(), vec!["flush"]);
    assert_eq!(handle.drain(), 0);
}
