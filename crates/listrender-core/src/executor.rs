//! Drives an aggregated [`WorkPlan`] through a [`RenderStrategy`].
//!
//! Every slot entry becomes one unit of work. All units of a batch are handed
//! to the strategy up front; the parent notification unit is only handed over
//! once every slot unit has completed, so it runs last under any strategy.
//! Starting a batch supersedes the one in flight: its pending entries are
//! dropped and its task handles cancelled.

use std::cell::{Cell, RefCell};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::rc::{Rc, Weak};
use std::task::{Context, Poll, Waker};

use crate::collections::IdentityMap;
use crate::diff::ChangeKind;
use crate::error::{ClassificationError, WorkError};
use crate::slot::{RenderSlot, SlotContainer};
use crate::strategy::{RenderStrategy, TaskHandle, WorkMeta};
use crate::subscription::{Listeners, Subscription};
use crate::work::{ParentWork, WorkEntry, WorkIndex, WorkPlan};

#[derive(Debug, Clone, PartialEq)]
pub enum BatchStatus {
    Rendered,
    Failed(Vec<WorkError>),
    Superseded,
    Aborted(ClassificationError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub generation: u64,
    pub status: BatchStatus,
}

impl BatchOutcome {
    pub fn is_rendered(&self) -> bool {
        self.status == BatchStatus::Rendered
    }

    pub fn errors(&self) -> &[WorkError] {
        match &self.status {
            BatchStatus::Failed(errors) => errors,
            _ => &[],
        }
    }
}

#[derive(Default)]
struct CompletionState {
    outcome: RefCell<Option<BatchOutcome>>,
    waker: RefCell<Option<Waker>>,
}

/// Resolves once every entry of a batch, parent notification included, has
/// completed. Can be awaited or inspected synchronously.
#[derive(Clone, Default)]
pub struct BatchCompletion {
    state: Rc<CompletionState>,
}

impl BatchCompletion {
    pub(crate) fn pending() -> Self {
        Self::default()
    }

    pub fn resolved(outcome: BatchOutcome) -> Self {
        let completion = Self::default();
        completion.resolve(outcome);
        completion
    }

    /// First resolution wins.
    pub(crate) fn resolve(&self, outcome: BatchOutcome) -> bool {
        {
            let mut slot = self.state.outcome.borrow_mut();
            if slot.is_some() {
                return false;
            }
            *slot = Some(outcome);
        }
        if let Some(waker) = self.state.waker.borrow_mut().take() {
            waker.wake();
        }
        true
    }

    pub fn outcome(&self) -> Option<BatchOutcome> {
        self.state.outcome.borrow().clone()
    }

    pub fn is_done(&self) -> bool {
        self.state.outcome.borrow().is_some()
    }
}

impl Future for BatchCompletion {
    type Output = BatchOutcome;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        if let Some(outcome) = self.state.outcome.borrow().clone() {
            return Poll::Ready(outcome);
        }
        *self.state.waker.borrow_mut() = Some(cx.waker().clone());
        Poll::Pending
    }
}

impl fmt::Debug for BatchCompletion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchCompletion")
            .field("outcome", &self.state.outcome.borrow())
            .finish()
    }
}

/// Emits one [`BatchOutcome`] per batch.
pub struct CompletionChannel {
    listeners: Listeners<BatchOutcome>,
}

impl CompletionChannel {
    pub fn new() -> Self {
        Self {
            listeners: Listeners::new(),
        }
    }

    pub fn subscribe(&self, listener: impl FnMut(&BatchOutcome) + 'static) -> Subscription {
        self.listeners.subscribe(Box::new(listener))
    }

    pub fn emit(&self, outcome: &BatchOutcome) {
        self.listeners.emit(outcome);
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for CompletionChannel {
    fn default() -> Self {
        Self::new()
    }
}

struct BatchTracker {
    generation: u64,
    strategy: Rc<dyn RenderStrategy>,
    remaining: Cell<usize>,
    errors: RefCell<Vec<WorkError>>,
    handles: RefCell<Vec<TaskHandle>>,
    parent: RefCell<Option<ParentWork>>,
    completion: BatchCompletion,
    done: Cell<bool>,
}

impl BatchTracker {
    fn cancel(&self) {
        for handle in self.handles.borrow().iter() {
            handle.cancel();
        }
    }
}

struct ExecutorInner<C: SlotContainer> {
    container: Rc<RefCell<C>>,
    generation: Cell<u64>,
    pending: RefCell<IdentityMap<WorkIndex, u64>>,
    current: RefCell<Option<Rc<BatchTracker>>>,
    channel: CompletionChannel,
}

impl<C: SlotContainer + 'static> ExecutorInner<C> {
    fn next_generation(&self) -> u64 {
        let generation = self.generation.get() + 1;
        self.generation.set(generation);
        generation
    }

    /// Takes ownership of a pending entry if it still belongs to `generation`.
    ///
    /// Each entry records the generation that owns its slot index, so this
    /// is the only staleness check a unit needs: superseding clears the map
    /// and older units find their index gone or owned by a newer batch.
    fn claim(&self, index: WorkIndex, generation: u64) -> bool {
        let mut pending = self.pending.borrow_mut();
        if pending.get(&index) == Some(&generation) {
            pending.remove(&index);
            true
        } else {
            false
        }
    }

    fn supersede(&self) {
        let previous = self.current.borrow_mut().take();
        self.pending.borrow_mut().clear();
        let Some(previous) = previous else {
            return;
        };
        if previous.done.replace(true) {
            return;
        }
        previous.cancel();
        log::debug!("batch {} superseded", previous.generation);
        self.publish(
            &previous,
            BatchOutcome {
                generation: previous.generation,
                status: BatchStatus::Superseded,
            },
        );
    }

    fn publish(&self, tracker: &BatchTracker, outcome: BatchOutcome) {
        if tracker.completion.resolve(outcome.clone()) {
            self.channel.emit(&outcome);
        }
    }

    fn run_entry(&self, tracker: &BatchTracker, entry: WorkEntry<C>) {
        let index = entry.work_index();
        if !self.claim(index, tracker.generation) {
            log::trace!("skipping stale work for {index} of batch {}", tracker.generation);
            return;
        }

        let mut live: Option<(C::Slot, String, ChangeKind)> = None;
        {
            let mut container = self.container.borrow_mut();
            for op in entry.ops {
                let key = op.key().to_string();
                let kind = op.kind();
                match op.apply(&mut container, index) {
                    Ok(Some(slot)) => live = Some((slot, key, kind)),
                    Ok(None) => live = None,
                    Err(err) => {
                        log::error!("{err}");
                        tracker.errors.borrow_mut().push(err);
                    }
                }
            }
        }

        if let Some((slot, key, kind)) = live {
            slot.reattach();
            let rendered = slot.detect_changes();
            slot.detach();
            if let Err(source) = rendered {
                let err = WorkError {
                    key,
                    kind,
                    index,
                    source,
                };
                log::error!("{err}");
                tracker.errors.borrow_mut().push(err);
            }
        }
    }

    /// Stops `tracker` from being the batch in flight.
    fn release(&self, tracker: &Rc<BatchTracker>) {
        let mut current = self.current.borrow_mut();
        if current
            .as_ref()
            .is_some_and(|active| Rc::ptr_eq(active, tracker))
        {
            *current = None;
        }
    }

    fn finish(&self, tracker: &Rc<BatchTracker>) {
        if tracker.done.replace(true) {
            return;
        }
        let errors = std::mem::take(&mut *tracker.errors.borrow_mut());
        let status = if errors.is_empty() {
            BatchStatus::Rendered
        } else {
            BatchStatus::Failed(errors)
        };
        log::debug!("batch {} finished: {:?}", tracker.generation, status);
        self.release(tracker);
        self.publish(
            tracker,
            BatchOutcome {
                generation: tracker.generation,
                status,
            },
        );
    }
}

fn unit_done<C: SlotContainer + 'static>(inner: &Rc<ExecutorInner<C>>, tracker: &Rc<BatchTracker>) {
    if tracker.done.get() {
        return;
    }
    let remaining = tracker.remaining.get().saturating_sub(1);
    tracker.remaining.set(remaining);
    if remaining == 0 {
        slots_done(inner, tracker);
    }
}

fn slots_done<C: SlotContainer + 'static>(inner: &Rc<ExecutorInner<C>>, tracker: &Rc<BatchTracker>) {
    let Some(parent) = tracker.parent.borrow_mut().take() else {
        inner.finish(tracker);
        return;
    };
    let weak: Weak<ExecutorInner<C>> = Rc::downgrade(inner);
    let unit_tracker = Rc::clone(tracker);
    let handle = tracker.strategy.schedule(
        Box::new(move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.claim(WorkIndex::NotifyParent, unit_tracker.generation) {
                log::trace!("skipping stale parent notification of batch {}", unit_tracker.generation);
                return;
            }
            // The parent may render again from here; this batch must not be
            // superseded by it.
            inner.release(&unit_tracker);
            parent();
            inner.finish(&unit_tracker);
        }),
        WorkMeta {
            generation: tracker.generation,
            index: WorkIndex::NotifyParent,
        },
    );
    tracker.handles.borrow_mut().push(handle);
}

/// Executes work plans against one slot container.
pub struct RenderExecutor<C: SlotContainer> {
    inner: Rc<ExecutorInner<C>>,
}

impl<C: SlotContainer + 'static> RenderExecutor<C> {
    pub fn new(container: Rc<RefCell<C>>) -> Self {
        Self {
            inner: Rc::new(ExecutorInner {
                container,
                generation: Cell::new(0),
                pending: RefCell::new(IdentityMap::default()),
                current: RefCell::new(None),
                channel: CompletionChannel::new(),
            }),
        }
    }

    pub fn container(&self) -> &Rc<RefCell<C>> {
        &self.inner.container
    }

    pub fn execute(&self, plan: WorkPlan<C>, strategy: Rc<dyn RenderStrategy>) -> BatchCompletion {
        let inner = &self.inner;
        inner.supersede();
        let generation = inner.next_generation();
        let WorkPlan {
            entries, parent, ..
        } = plan;

        let tracker = Rc::new(BatchTracker {
            generation,
            strategy: Rc::clone(&strategy),
            remaining: Cell::new(entries.len()),
            errors: RefCell::new(Vec::new()),
            handles: RefCell::new(Vec::new()),
            parent: RefCell::new(parent),
            completion: BatchCompletion::pending(),
            done: Cell::new(false),
        });
        {
            let mut pending = inner.pending.borrow_mut();
            for entry in &entries {
                pending.insert(entry.work_index(), generation);
            }
            if tracker.parent.borrow().is_some() {
                pending.insert(WorkIndex::NotifyParent, generation);
            }
        }
        *inner.current.borrow_mut() = Some(Rc::clone(&tracker));
        log::debug!(
            "batch {generation}: {} slot unit(s) via `{}`",
            entries.len(),
            strategy.name()
        );

        let completion = tracker.completion.clone();
        if entries.is_empty() {
            slots_done(inner, &tracker);
            return completion;
        }

        for entry in entries {
            let meta = WorkMeta {
                generation,
                index: entry.work_index(),
            };
            let weak: Weak<ExecutorInner<C>> = Rc::downgrade(inner);
            let unit_tracker = Rc::clone(&tracker);
            let handle = strategy.schedule(
                Box::new(move || {
                    let Some(inner) = weak.upgrade() else {
                        return;
                    };
                    inner.run_entry(&unit_tracker, entry);
                    unit_done(&inner, &unit_tracker);
                }),
                meta,
            );
            tracker.handles.borrow_mut().push(handle);
        }
        completion
    }

    /// Reports a batch that failed before any work was planned.
    pub fn abort(&self, error: ClassificationError) -> BatchCompletion {
        let outcome = BatchOutcome {
            generation: self.inner.next_generation(),
            status: BatchStatus::Aborted(error),
        };
        self.inner.channel.emit(&outcome);
        BatchCompletion::resolved(outcome)
    }

    pub fn subscribe(&self, listener: impl FnMut(&BatchOutcome) + 'static) -> Subscription {
        self.inner.channel.subscribe(listener)
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.get()
    }

    /// Entries of the batch in flight that have not run yet.
    pub fn pending(&self) -> usize {
        self.inner.pending.borrow().len()
    }

    pub fn is_idle(&self) -> bool {
        self.inner.current.borrow().is_none()
    }
}
