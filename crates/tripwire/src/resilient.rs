// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use crate::{
    BreakerConfig, CircuitBreakerRegistry, CircuitStore, Fault, FaultKind, InMemoryStore, OnAttemptArgs, ResilienceContext,
    ResilienceError, RetryExecutor, RetryPolicy,
};

/// Retries and circuit breaking composed behind one call.
///
/// Every attempt of a retried execution passes through the named circuit, so
/// an open circuit ends the execution at once instead of burning the remaining
/// attempts against a dependency known to be down.
///
/// # Examples
///
/// ```
/// # use tick::Clock;
/// # use tripwire::{BreakerConfig, Fault, FaultKind, Resilience, ResilienceContext, RetryPolicy};
/// # #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// # enum Kind { Io }
/// # impl FaultKind for Kind { fn name(self) -> &'static str { "io" } }
/// # #[derive(Debug, thiserror::Error)]
/// # #[error("io")]
/// # struct IoFault;
/// # impl Fault for IoFault { type Kind = Kind; fn kind(&self) -> Kind { Kind::Io } }
/// # fn clock() -> Clock { unimplemented!() }
/// # async fn charge() -> Result<&'static str, IoFault> { Ok("charged") }
/// # async fn _example() -> Result<(), tripwire::ResilienceError<IoFault>> {
/// let resilience = Resilience::in_memory(&ResilienceContext::new(clock()));
///
/// let receipt = resilience
///     .execute("payments", &RetryPolicy::default(), &BreakerConfig::default(), || charge())
///     .await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Resilience<K, S = InMemoryStore> {
    registry: CircuitBreakerRegistry<K, S>,
    executor: RetryExecutor,
}

impl<K: FaultKind> Resilience<K, InMemoryStore> {
    /// Composes retries with process-local circuits.
    #[must_use]
    pub fn in_memory(context: &ResilienceContext) -> Self {
        Self::new(context, InMemoryStore::new())
    }
}

impl<K: FaultKind, S: CircuitStore> Resilience<K, S> {
    /// Composes retries with circuits kept in `store`.
    pub fn new(context: &ResilienceContext, store: S) -> Self {
        Self::from_parts(CircuitBreakerRegistry::new(context, store), RetryExecutor::new(context))
    }

    /// Composes an existing registry and executor.
    pub const fn from_parts(registry: CircuitBreakerRegistry<K, S>, executor: RetryExecutor) -> Self {
        Self { registry, executor }
    }

    /// The registry holding this instance's circuits.
    #[must_use]
    pub const fn registry(&self) -> &CircuitBreakerRegistry<K, S> {
        &self.registry
    }

    /// The executor driving retries.
    #[must_use]
    pub const fn executor(&self) -> &RetryExecutor {
        &self.executor
    }

    /// Runs `operation` with retries, guarding every attempt with the circuit `name`.
    ///
    /// `circuit` only takes effect when this is the first use of `name`.
    ///
    /// # Errors
    ///
    /// Returns the operation's error when it is not retryable or attempts run
    /// out, [`ResilienceError::CircuitOpen`] when the circuit rejects an
    /// attempt, and [`ResilienceError::Store`] when circuit state is unavailable.
    pub async fn execute<T, E, F, Fut>(
        &self,
        name: &str,
        policy: &RetryPolicy<K>,
        circuit: &BreakerConfig<K>,
        operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        E: Fault<Kind = K>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_with(name, policy, circuit, operation, |_| {}).await
    }

    /// Like [`execute`](Self::execute), calling `on_attempt` after each
    /// retryable failure and before the wait that follows it.
    ///
    /// # Errors
    ///
    /// See [`execute`](Self::execute).
    pub async fn execute_with<T, E, F, Fut, H>(
        &self,
        name: &str,
        policy: &RetryPolicy<K>,
        circuit: &BreakerConfig<K>,
        operation: F,
        on_attempt: H,
    ) -> Result<T, ResilienceError<E>>
    where
        E: Fault<Kind = K>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        H: FnMut(&OnAttemptArgs<'_, E>),
    {
        let breaker = self.registry.get_breaker_with(name, circuit);
        self.executor.run_guarded_with(policy, &breaker, operation, on_attempt).await
    }
}
