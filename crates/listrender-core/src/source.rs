use std::cell::RefCell;
use std::rc::Rc;

use crate::subscription::{Listeners, Subscription};

/// A stream of full item snapshots.
pub trait ItemSource<T> {
    fn subscribe(&self, observer: Box<dyn FnMut(Vec<T>)>) -> Subscription;
}

/// Source that replays its latest snapshot to every new subscriber.
pub struct SnapshotSubject<T> {
    latest: Rc<RefCell<Option<Vec<T>>>>,
    listeners: Listeners<Vec<T>>,
}

impl<T: Clone + 'static> SnapshotSubject<T> {
    pub fn new() -> Self {
        Self {
            latest: Rc::new(RefCell::new(None)),
            listeners: Listeners::new(),
        }
    }

    pub fn with_snapshot(snapshot: Vec<T>) -> Self {
        let subject = Self::new();
        *subject.latest.borrow_mut() = Some(snapshot);
        subject
    }

    pub fn emit(&self, snapshot: Vec<T>) {
        *self.latest.borrow_mut() = Some(snapshot.clone());
        self.listeners.emit(&snapshot);
    }

    pub fn latest(&self) -> Option<Vec<T>> {
        self.latest.borrow().clone()
    }

    pub fn subscriber_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<T: Clone + 'static> Default for SnapshotSubject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + 'static> ItemSource<T> for SnapshotSubject<T> {
    fn subscribe(&self, mut observer: Box<dyn FnMut(Vec<T>)>) -> Subscription {
        self.listeners.subscribe_replaying(
            Box::new(move |snapshot: &Vec<T>| observer(snapshot.clone())),
            self.latest(),
        )
    }
}
