use std::cell::RefCell;
use std::fmt;
use std::hash::Hash;
use std::rc::{Rc, Weak};

use crate::config::RenderConfig;
use crate::diff::{classify, ChangeKind};
use crate::executor::{BatchCompletion, BatchOutcome, RenderExecutor};
use crate::registry::{StrategySelection, StrategyStream};
use crate::slot::{RenderTarget, SlotContainer};
use crate::source::ItemSource;
use crate::strategy::RenderStrategy;
use crate::subscription::Subscription;
use crate::work::{aggregate, ParentWork};

/// Extracts the identity key of an item.
pub type TrackBy<T, K> = Rc<dyn Fn(&T) -> K>;

struct RendererInner<C: SlotContainer, K> {
    template: Rc<C::Template>,
    track_by: TrackBy<C::Item, K>,
    strategies: StrategyStream,
    parent: Option<Rc<dyn RenderTarget>>,
    config: RenderConfig,
    executor: RenderExecutor<C>,
}

impl<C, K> RendererInner<C, K>
where
    C: SlotContainer + 'static,
    C::Item: Clone + PartialEq + 'static,
    K: Hash + Eq + fmt::Debug + 'static,
{
    fn render(&self, snapshot: Vec<C::Item>) -> BatchCompletion {
        let container = self.executor.container();
        let previous = container.borrow().items();
        let track_by = &self.track_by;
        let change_set = match classify(&previous, &snapshot, |item| track_by(item)) {
            Ok(change_set) => change_set,
            Err(err) => {
                log::error!("{err}; batch aborted before any slot was touched");
                return self.executor.abort(err);
            }
        };
        log::debug!(
            "{} -> {} items: {} insert, {} remove, {} move, {} update",
            change_set.previous_count,
            change_set.count,
            change_set.count_of(ChangeKind::Insert),
            change_set.count_of(ChangeKind::Remove),
            change_set.count_of(ChangeKind::Move),
            change_set.count_of(ChangeKind::Update),
        );

        let strategy = self.strategies.current();
        let plan = aggregate(
            &change_set,
            &*container.borrow(),
            &self.template,
            |item| track_by(item),
            self.parent_work(&strategy),
        );
        self.executor.execute(plan, strategy)
    }

    fn parent_work(&self, strategy: &Rc<dyn RenderStrategy>) -> Option<ParentWork> {
        if !self.config.notify_parent {
            return None;
        }
        let parent = self.parent.clone()?;
        let strategy = Rc::clone(strategy);
        Some(Box::new(move || strategy.flush(&parent)))
    }
}

/// Reconciles item snapshots into a slot container.
pub struct ListRenderer<C: SlotContainer, K> {
    inner: Rc<RendererInner<C, K>>,
}

impl<C: SlotContainer, K> Clone for ListRenderer<C, K> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<C, K> ListRenderer<C, K>
where
    C: SlotContainer + 'static,
    C::Item: Clone + PartialEq + 'static,
    K: Hash + Eq + fmt::Debug + 'static,
{
    pub fn new(
        container: Rc<RefCell<C>>,
        template: C::Template,
        track_by: impl Fn(&C::Item) -> K + 'static,
        strategies: StrategyStream,
        parent: Option<Rc<dyn RenderTarget>>,
        config: RenderConfig,
    ) -> Self {
        if let Some(name) = &config.strategy {
            strategies.next_strategy(name.as_str());
        }
        Self {
            inner: Rc::new(RendererInner {
                template: Rc::new(template),
                track_by: Rc::new(track_by),
                strategies,
                parent,
                config,
                executor: RenderExecutor::new(container),
            }),
        }
    }

    /// Starts a batch for `snapshot`. Never fails directly: classification
    /// and work failures are reported through the returned completion and
    /// the batch listeners.
    pub fn render(&self, snapshot: Vec<C::Item>) -> BatchCompletion {
        self.inner.render(snapshot)
    }

    /// Selects the strategy for subsequent batches.
    pub fn next_strategy(&self, selection: impl Into<StrategySelection>) {
        self.inner.strategies.next_strategy(selection);
    }

    /// Name of the strategy the next batch would use.
    pub fn strategy_name(&self) -> String {
        self.inner.strategies.current().name().to_string()
    }

    pub fn on_batch(&self, listener: impl FnMut(&BatchOutcome) + 'static) -> Subscription {
        self.inner.executor.subscribe(listener)
    }

    /// Renders every snapshot `source` emits for as long as the returned
    /// subscription and this renderer live.
    pub fn connect(&self, source: &dyn ItemSource<C::Item>) -> Subscription {
        let renderer: Weak<RendererInner<C, K>> = Rc::downgrade(&self.inner);
        source.subscribe(Box::new(move |snapshot: Vec<C::Item>| {
            if let Some(renderer) = renderer.upgrade() {
                renderer.render(snapshot);
            }
        }))
    }

    pub fn container(&self) -> Rc<RefCell<C>> {
        Rc::clone(self.inner.executor.container())
    }

    pub fn generation(&self) -> u64 {
        self.inner.executor.generation()
    }

    /// `true` when no batch is in flight.
    pub fn is_idle(&self) -> bool {
        self.inner.executor.is_idle()
    }

    pub fn config(&self) -> &RenderConfig {
        &self.inner.config
    }
}
