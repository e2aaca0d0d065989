//! Strategy registry: explicit key -> template registration.

use std::collections::BTreeMap;
use std::sync::Arc;

use super::{BuyAndHold, NullStrategy, SmaCross, SmaPullback, StrategyError, StrategyTemplate};

/// Lookup table of strategy templates by stable key.
///
/// The registry is a plain value owned by the caller; nothing is global.
#[derive(Clone, Default)]
pub struct StrategyRegistry {
    templates: BTreeMap<String, Arc<dyn StrategyTemplate>>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with every built-in strategy.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(SmaCross));
        registry.register(Arc::new(SmaPullback));
        registry.register(Arc::new(BuyAndHold));
        registry.register(Arc::new(NullStrategy));
        registry
    }

    /// Register a template under its own key, replacing any previous entry.
    pub fn register(&mut self, template: Arc<dyn StrategyTemplate>) {
        self.templates.insert(template.key().to_string(), template);
    }

    pub fn get(&self, key: &str) -> Result<Arc<dyn StrategyTemplate>, StrategyError> {
        self.templates
            .get(key)
            .cloned()
            .ok_or_else(|| StrategyError::UnknownStrategy(key.to_string()))
    }

    /// Registered keys in sorted order.
    pub fn keys(&self) -> Vec<&str> {
        self.templates.keys().map(|k| k.as_str()).collect()
    }
}

impl std::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StrategyRegistry")
            .field("keys", &self.keys())
            .finish()
    }
}
