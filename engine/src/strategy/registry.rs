//! Strategy Registry - manages available strategies

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::EngineError;
use crate::strategy::{MaxTrendStrategy, Strategy, StrategyMetadata};
use crate::Result;

/// Produces a fresh, uninitialized strategy instance on every call
pub type StrategyFactory = Arc<dyn Fn() -> Box<dyn Strategy> + Send + Sync>;

/// Strategy Registry - maps strategy ids to factories.
///
/// Safe to share between tasks; every lookup hands out a new instance, so
/// running instances never share mutable strategy state.
pub struct StrategyRegistry {
    factories: RwLock<HashMap<String, StrategyFactory>>,
}

impl StrategyRegistry {
    /// Empty registry
    pub fn new() -> Self {
        Self {
            factories: RwLock::new(HashMap::new()),
        }
    }

    /// Registry with the built-in strategies
    pub fn with_builtins() -> Self {
        let registry = Self::new();
        registry.register(MaxTrendStrategy::ID, || Box::new(MaxTrendStrategy::new()));
        registry
    }

    /// Register a strategy factory; an existing id is replaced
    pub fn register<F>(&self, id: &str, factory: F)
    where
        F: Fn() -> Box<dyn Strategy> + Send + Sync + 'static,
    {
        let mut factories = self.factories.write().unwrap_or_else(|e| e.into_inner());
        if factories.insert(id.to_string(), Arc::new(factory)).is_some() {
            debug!(strategy_id = id, "replaced strategy factory");
        }
    }

    /// Create a new instance of a registered strategy
    pub fn get(&self, id: &str) -> Result<Box<dyn Strategy>> {
        let factory = self
            .factory(id)
            .ok_or_else(|| EngineError::UnknownStrategy(id.to_string()))?;
        Ok(factory())
    }

    /// Metadata of a registered strategy
    pub fn metadata(&self, id: &str) -> Result<StrategyMetadata> {
        self.get(id).map(|strategy| strategy.metadata())
    }

    /// Metadata of every registered strategy, ordered by id
    pub fn list(&self) -> Vec<StrategyMetadata> {
        let mut factories: Vec<(String, StrategyFactory)> = {
            let map = self.factories.read().unwrap_or_else(|e| e.into_inner());
            map.iter().map(|(id, f)| (id.clone(), Arc::clone(f))).collect()
        };
        factories.sort_by(|a, b| a.0.cmp(&b.0));
        factories.into_iter().map(|(_, factory)| factory().metadata()).collect()
    }

    /// Check if strategy is registered
    pub fn has(&self, id: &str) -> bool {
        self.factory(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.factories.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn factory(&self, id: &str) -> Option<StrategyFactory> {
        let factories = self.factories.read().unwrap_or_else(|e| e.into_inner());
        factories.get(id).cloned()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}
