//! Named strategy table and per-batch strategy resolution.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use indexmap::IndexMap;

use crate::error::StrategyError;
use crate::runtime::RuntimeHandle;
use crate::scheduler::{Priority, SchedulerHandle};
use crate::strategy::{ConcurrentStrategy, DeferredStrategy, ImmediateStrategy, RenderStrategy};

/// Name of the strategy [`StrategyRegistry::with_defaults`] falls back to.
pub const DEFAULT_STRATEGY: &str = "normal";

/// Strategy table. Always holds its default strategy.
#[derive(Clone)]
pub struct StrategyRegistry {
    default_name: String,
    default: Rc<dyn RenderStrategy>,
    strategies: IndexMap<String, Rc<dyn RenderStrategy>>,
}

impl StrategyRegistry {
    pub fn new(default: Rc<dyn RenderStrategy>) -> Self {
        let mut strategies = IndexMap::new();
        strategies.insert(default.name().to_string(), Rc::clone(&default));
        Self {
            default_name: default.name().to_string(),
            default,
            strategies,
        }
    }

    /// Built-in table: the immediate strategies, `local` on `runtime` and one
    /// cooperative strategy per [`Priority`] on `scheduler`.
    pub fn with_defaults(runtime: RuntimeHandle, scheduler: SchedulerHandle) -> Self {
        let default: Rc<dyn RenderStrategy> =
            Rc::new(ConcurrentStrategy::new(Priority::Normal, scheduler.clone()));
        let mut registry = Self::new(default);
        registry.register(Rc::new(ImmediateStrategy::sync()));
        registry.register(Rc::new(ImmediateStrategy::native()));
        registry.register(Rc::new(ImmediateStrategy::noop()));
        registry.register(Rc::new(DeferredStrategy::local(runtime)));
        for priority in Priority::ALL {
            if priority != Priority::Normal {
                registry.register(Rc::new(ConcurrentStrategy::new(priority, scheduler.clone())));
            }
        }
        registry
    }

    /// Registers `strategy` under its own name, replacing any previous entry.
    pub fn register(&mut self, strategy: Rc<dyn RenderStrategy>) {
        let name = strategy.name().to_string();
        self.register_as(name, strategy);
    }

    pub fn register_as(&mut self, name: impl Into<String>, strategy: Rc<dyn RenderStrategy>) {
        let name = name.into();
        if name == self.default_name {
            self.default = Rc::clone(&strategy);
        }
        self.strategies.insert(name, strategy);
    }

    pub fn get(&self, name: &str) -> Result<Rc<dyn RenderStrategy>, StrategyError> {
        self.strategies
            .get(name)
            .cloned()
            .ok_or_else(|| StrategyError::Unknown {
                name: name.to_string(),
            })
    }

    pub fn contains(&self, name: &str) -> bool {
        self.strategies.contains_key(name)
    }

    pub fn default_strategy(&self) -> Rc<dyn RenderStrategy> {
        Rc::clone(&self.default)
    }

    /// Names in registration order.
    pub fn names(&self) -> Vec<&str> {
        self.strategies.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Adds every entry of `custom`, overriding entries with the same name.
    pub fn merge(&mut self, custom: StrategyRegistry) {
        for (name, strategy) in custom.strategies {
            self.register_as(name, strategy);
        }
    }

    pub fn resolve(self: &Rc<Self>, selection: impl Into<StrategySelection>) -> StrategyStream {
        StrategyStream::new(Rc::clone(self), selection.into())
    }
}

impl fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("default", &self.default_name)
            .field("names", &self.names())
            .finish()
    }
}

/// Replaying cell of strategy names; readers always see the latest one.
#[derive(Debug, Clone)]
pub struct NameStream {
    latest: Rc<RefCell<String>>,
}

impl NameStream {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            latest: Rc::new(RefCell::new(initial.into())),
        }
    }

    pub fn emit(&self, name: impl Into<String>) {
        *self.latest.borrow_mut() = name.into();
    }

    pub fn latest(&self) -> String {
        self.latest.borrow().clone()
    }
}

#[derive(Debug, Clone)]
pub enum StrategySelection {
    Name(String),
    Stream(NameStream),
}

impl StrategySelection {
    pub fn name(&self) -> String {
        match self {
            StrategySelection::Name(name) => name.clone(),
            StrategySelection::Stream(stream) => stream.latest(),
        }
    }
}

impl From<&str> for StrategySelection {
    fn from(name: &str) -> Self {
        StrategySelection::Name(name.to_string())
    }
}

impl From<String> for StrategySelection {
    fn from(name: String) -> Self {
        StrategySelection::Name(name)
    }
}

impl From<NameStream> for StrategySelection {
    fn from(stream: NameStream) -> Self {
        StrategySelection::Stream(stream)
    }
}

/// The live strategy of one renderer.
pub struct StrategyStream {
    registry: Rc<StrategyRegistry>,
    selection: RefCell<StrategySelection>,
    active: RefCell<Option<String>>,
}

impl StrategyStream {
    fn new(registry: Rc<StrategyRegistry>, selection: StrategySelection) -> Self {
        Self {
            registry,
            selection: RefCell::new(selection),
            active: RefCell::new(None),
        }
    }

    /// Strategy for the latest selected name; the registry default when the
    /// name is unknown.
    pub fn current(&self) -> Rc<dyn RenderStrategy> {
        let name = self.selection.borrow().name();
        let strategy = match self.registry.get(&name) {
            Ok(strategy) => strategy,
            Err(err) => {
                let fallback = self.registry.default_strategy();
                log::warn!("{err}; falling back to `{}`", fallback.name());
                fallback
            }
        };
        let mut active = self.active.borrow_mut();
        if active.as_deref() != Some(strategy.name()) {
            if let Some(previous) = active.as_deref() {
                log::debug!("render strategy switched from `{previous}` to `{}`", strategy.name());
            }
            *active = Some(strategy.name().to_string());
        }
        strategy
    }

    pub fn next_strategy(&self, selection: impl Into<StrategySelection>) {
        *self.selection.borrow_mut() = selection.into();
    }

    pub fn selected_name(&self) -> String {
        self.selection.borrow().name()
    }

    pub fn registry(&self) -> &Rc<StrategyRegistry> {
        &self.registry
    }
}

#[cfg(test)]
#[path = "tests/registry_tests.rs"]
mod tests;
