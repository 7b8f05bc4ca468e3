// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tick::Clock;

use super::{BreakerConfig, CircuitBreaker};
use crate::{CircuitStore, EventSink, FaultKind, InMemoryStore, ResilienceContext, ResilienceEvent};

/// Hands out one breaker per circuit name.
///
/// The first request for a name creates its breaker and emits
/// [`ResilienceEvent::CircuitCreated`]. Later requests return a handle to the
/// same breaker, whatever configuration they pass.
///
/// Registries are explicit values rather than process globals. Share one by
/// reference or wrap it in an [`Arc`].
///
/// # Examples
///
/// ```
/// # use tick::Clock;
/// # use tripwire::{CircuitBreakerRegistry, FaultKind, InMemoryStore, ResilienceContext};
/// # #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// # enum Kind { Io }
/// # impl FaultKind for Kind { fn name(self) -> &'static str { "io" } }
/// # fn clock() -> Clock { unimplemented!() }
/// # fn _example() {
/// let context = ResilienceContext::new(clock());
/// let registry = CircuitBreakerRegistry::<Kind, _>::new(&context, InMemoryStore::new());
///
/// let first = registry.get_breaker("inventory");
/// let second = registry.get_breaker("inventory");
/// assert_eq!(first.name(), second.name());
/// # }
/// ```
#[derive(Debug)]
pub struct CircuitBreakerRegistry<K, S = InMemoryStore> {
    store: Arc<S>,
    clock: Clock,
    sink: Arc<dyn EventSink>,
    logs_enabled: bool,
    defaults: BreakerConfig<K>,
    breakers: Mutex<HashMap<String, CircuitBreaker<K, S>>>,
}

impl<K: FaultKind, S: CircuitStore> CircuitBreakerRegistry<K, S> {
    /// Creates a registry whose breakers keep their state in `store`.
    pub fn new(context: &ResilienceContext, store: S) -> Self {
        Self::with_shared_store(context, Arc::new(store))
    }

    /// Creates a registry over a store shared with other owners.
    pub fn with_shared_store(context: &ResilienceContext, store: Arc<S>) -> Self {
        Self {
            store,
            clock: context.clock().clone(),
            sink: context.create_sink(),
            logs_enabled: context.logs_enabled(),
            defaults: BreakerConfig::default(),
            breakers: Mutex::new(HashMap::new()),
        }
    }

    /// Sets the configuration used by [`get_breaker`](Self::get_breaker).
    #[must_use]
    pub fn with_defaults(mut self, config: BreakerConfig<K>) -> Self {
        self.defaults = config;
        self
    }

    /// The breaker for `name`, created with the registry defaults if new.
    pub fn get_breaker(&self, name: &str) -> CircuitBreaker<K, S> {
        self.get_breaker_with(name, &self.defaults)
    }

    /// The breaker for `name`, created with `config` if new.
    ///
    /// An existing breaker keeps the configuration it was created with.
    pub fn get_breaker_with(&self, name: &str, config: &BreakerConfig<K>) -> CircuitBreaker<K, S> {
        let mut breakers = self.breakers.lock();
        if let Some(breaker) = breakers.get(name) {
            return breaker.clone();
        }

        let breaker = CircuitBreaker {
            name: Arc::from(name),
            config: Arc::new(config.clone()),
            store: Arc::clone(&self.store),
            clock: self.clock.clone(),
            sink: Arc::clone(&self.sink),
            logs_enabled: self.logs_enabled,
        };
        breakers.insert(name.to_owned(), breaker.clone());
        drop(breakers);

        self.sink.on_event(&ResilienceEvent::CircuitCreated { name });
        breaker
    }

    /// Names of the circuits created so far, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.breakers.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// The store backing this registry.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::time::Duration;

    use futures::executor::block_on;

    use super::*;
    use crate::testing::{RecordingSink, TestKind};

    fn registry(sink: &RecordingSink) -> CircuitBreakerRegistry<TestKind> {
        let context = ResilienceContext::new(Clock::new_frozen()).event_sink(sink.clone());
        CircuitBreakerRegistry::new(&context, InMemoryStore::new())
    }

    #[test]
    fn same_name_returns_same_breaker() {
        let sink = RecordingSink::default();
        let registry = registry(&sink);

        let first = registry.get_breaker("db");
        let second = registry.get_breaker("db");

        assert!(Arc::ptr_eq(&first.config, &second.config));
        assert!(Arc::ptr_eq(&first.name, &second.name));
        assert_eq!(sink.events(), vec!["circuit_created"]);
    }

    #[test]
    fn different_names_return_different_breakers() {
        let sink = RecordingSink::default();
        let registry = registry(&sink);

        registry.get_breaker("b");
        registry.get_breaker("a");

        assert_eq!(registry.names(), vec!["a", "b"]);
        assert_eq!(sink.events(), vec!["circuit_created", "circuit_created"]);
    }

    #[test]
    fn first_configuration_wins() {
        let registry = registry(&RecordingSink::default());
        let tight = BreakerConfig::builder().threshold(1).build().unwrap();
        let loose = BreakerConfig::builder().threshold(50).build().unwrap();

        registry.get_breaker_with("db", &tight);
        let later = registry.get_breaker_with("db", &loose);

        assert_eq!(later.config().threshold(), 1);
    }

    #[test]
    fn defaults_apply_to_new_breakers() {
        let defaults = BreakerConfig::builder()
            .threshold(2)
            .ttl(Duration::from_secs(3))
            .build()
            .unwrap();
        let registry = registry(&RecordingSink::default()).with_defaults(defaults);

        let breaker = registry.get_breaker("db");
        let record = block_on(breaker.record()).unwrap();

        assert_eq!(record.threshold, 2);
        assert_eq!(record.ttl, Duration::from_secs(3));
    }

    #[test]
    fn creation_does_not_touch_the_store() {
        let registry = registry(&RecordingSink::default());
        registry.get_breaker("db");

        assert!(registry.store().is_empty());
    }

    #[test]
    fn registries_sharing_a_store_share_circuits() {
        let context = ResilienceContext::new(Clock::new_frozen());
        let store = Arc::new(InMemoryStore::new());
        let a = CircuitBreakerRegistry::<TestKind>::with_shared_store(&context, Arc::clone(&store));
        let b = CircuitBreakerRegistry::<TestKind>::with_shared_store(&context, Arc::clone(&store));

        block_on(a.get_breaker("db").record()).unwrap();
        block_on(b.get_breaker("db").record()).unwrap();

        assert_eq!(store.len(), 1);
    }

    #[test]
    fn assert_types() {
        static_assertions::assert_impl_all!(CircuitBreakerRegistry<TestKind>: Send, Sync, std::fmt::Debug);
        static_assertions::assert_impl_all!(CircuitBreaker<TestKind, InMemoryStore>: Send, Sync, Clone, std::fmt::Debug);
    }
}
