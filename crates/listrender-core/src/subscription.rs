use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

/// Keeps a listener registered; dropping it unregisters the listener.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce()>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to cancel.
    pub fn inactive() -> Self {
        Self { cancel: None }
    }

    pub fn is_active(&self) -> bool {
        self.cancel.is_some()
    }

    pub fn cancel(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keeps the listener registered for as long as its source lives.
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

type Listener<T> = Rc<RefCell<Box<dyn FnMut(&T)>>>;

struct ListenerSet<T> {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(u64, Listener<T>)>>,
    emitting: Cell<bool>,
    queued: RefCell<VecDeque<T>>,
}

/// Listener list shared by the snapshot subject and the completion channel.
/// Emitting works from a snapshot, so listeners may subscribe or unsubscribe
/// while being notified. Values emitted from inside a listener are queued and
/// delivered, in order, once the running emission returns.
pub(crate) struct Listeners<T> {
    inner: Rc<ListenerSet<T>>,
}

impl<T: Clone + 'static> Listeners<T> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Rc::new(ListenerSet {
                next_id: Cell::new(0),
                entries: RefCell::new(Vec::new()),
                emitting: Cell::new(false),
                queued: RefCell::new(VecDeque::new()),
            }),
        }
    }

    pub(crate) fn subscribe(&self, listener: Box<dyn FnMut(&T)>) -> Subscription {
        self.register(listener).0
    }

    /// Registers `listener`, then hands it `replay` alone. Values emitted
    /// while the replay runs reach it afterwards, in order.
    pub(crate) fn subscribe_replaying(
        &self,
        listener: Box<dyn FnMut(&T)>,
        replay: Option<T>,
    ) -> Subscription {
        let (subscription, listener) = self.register(listener);
        if let Some(value) = replay {
            self.emitting(|| call(&listener, &value));
        }
        subscription
    }

    fn register(&self, listener: Box<dyn FnMut(&T)>) -> (Subscription, Listener<T>) {
        let id = self.inner.next_id.get();
        self.inner.next_id.set(id + 1);
        let listener: Listener<T> = Rc::new(RefCell::new(listener));
        self.inner
            .entries
            .borrow_mut()
            .push((id, Rc::clone(&listener)));
        let set: Weak<ListenerSet<T>> = Rc::downgrade(&self.inner);
        let subscription = Subscription::new(move || {
            if let Some(set) = set.upgrade() {
                set.entries.borrow_mut().retain(|(entry, _)| *entry != id);
            }
        });
        (subscription, listener)
    }

    pub(crate) fn emit(&self, value: &T) {
        if self.inner.emitting.get() {
            self.inner.queued.borrow_mut().push_back(value.clone());
            return;
        }
        self.emitting(|| self.deliver(value));
    }

    /// Runs `first` as the outermost emission, then drains whatever it queued.
    fn emitting(&self, first: impl FnOnce()) {
        if self.inner.emitting.replace(true) {
            first();
            return;
        }
        first();
        while let Some(next) = self.next_queued() {
            self.deliver(&next);
        }
        self.inner.emitting.set(false);
    }

    fn next_queued(&self) -> Option<T> {
        self.inner.queued.borrow_mut().pop_front()
    }

    fn deliver(&self, value: &T) {
        let snapshot: Vec<Listener<T>> = self
            .inner
            .entries
            .borrow()
            .iter()
            .map(|(_, listener)| Rc::clone(listener))
            .collect();
        for listener in snapshot {
            call(&listener, value);
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.inner.entries.borrow().len()
    }
}

fn call<T>(listener: &Listener<T>, value: &T) {
    let mut listener = listener.borrow_mut();
    let listener: &mut dyn FnMut(&T) = &mut **listener;
    listener(value);
}
