// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::ops::ControlFlow;
use std::sync::Arc;
use std::time::Duration;

use tick::Clock;

use super::constants::DEFAULT_EXECUTOR_NAME;
use super::{OnAttemptArgs, RetryPolicy};
use crate::rnd::Rnd;
use crate::{
    Attempt, CircuitBreaker, CircuitStore, EventSink, Fault, FaultKind, ResilienceContext, ResilienceError, ResilienceEvent,
    Verdict,
};

/// Runs operations with retries, sleeping a jittered backoff between attempts.
///
/// An executor holds no per-call state and can be shared freely. Waits go
/// through the context's clock, so a controlled clock makes tests instant.
///
/// Dropping the future returned by [`run`](Self::run) cancels the execution:
/// a pending wait is abandoned and no further attempt starts.
///
/// # Examples
///
/// ```
/// # use tick::Clock;
/// # use tripwire::{Fault, FaultKind, ResilienceContext, RetryExecutor, RetryPolicy};
/// # #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// # enum Kind { Io }
/// # impl FaultKind for Kind { fn name(self) -> &'static str { "io" } }
/// # #[derive(Debug, thiserror::Error)]
/// # #[error("io")]
/// # struct IoFault;
/// # impl Fault for IoFault { type Kind = Kind; fn kind(&self) -> Kind { Kind::Io } }
/// # fn clock() -> Clock { unimplemented!() }
/// # async fn fetch() -> Result<u32, IoFault> { Ok(1) }
/// # async fn _example() -> Result<(), tripwire::ResilienceError<IoFault>> {
/// let executor = RetryExecutor::new(&ResilienceContext::new(clock())).name("fetch");
/// let value = executor.run(&RetryPolicy::default(), || fetch()).await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    clock: Clock,
    rnd: Rnd,
    sink: Arc<dyn EventSink>,
    name: Cow<'static, str>,
}

/// State carried into the next iteration of the retry loop.
struct ContinueRetry {
    attempt: Attempt,
    wait: Duration,
}

impl RetryExecutor {
    /// Creates an executor using the context's clock and telemetry.
    #[must_use]
    pub fn new(context: &ResilienceContext) -> Self {
        Self {
            clock: context.clock().clone(),
            rnd: Rnd::default(),
            sink: context.create_sink(),
            name: Cow::Borrowed(DEFAULT_EXECUTOR_NAME),
        }
    }

    /// Sets the operation name reported by [`run`](Self::run) and [`run_with`](Self::run_with).
    #[must_use]
    pub fn name(mut self, name: impl Into<Cow<'static, str>>) -> Self {
        self.name = name.into();
        self
    }

    /// Draws jitter from a generator seeded with `seed`, making waits reproducible.
    #[must_use]
    pub fn seeded(mut self, seed: u64) -> Self {
        self.rnd = Rnd::new_seeded(seed);
        self
    }

    #[cfg(test)]
    pub(crate) fn with_rnd(mut self, rnd: Rnd) -> Self {
        self.rnd = rnd;
        self
    }

    /// Runs `operation` until it succeeds, fails with a non-retryable fault, or
    /// the policy's attempts are spent.
    ///
    /// # Errors
    ///
    /// Returns the final failure. With `reraise_original` unset, exhaustion is
    /// reported as [`ResilienceError::RetriesExhausted`].
    pub async fn run<T, E, F, Fut>(&self, policy: &RetryPolicy<E::Kind>, operation: F) -> Result<T, ResilienceError<E>>
    where
        E: Fault,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_with(policy, operation, |_| {}).await
    }

    /// Like [`run`](Self::run), calling `on_attempt` after each retryable failure
    /// and before the wait that follows it.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub async fn run_with<T, E, F, Fut, H>(
        &self,
        policy: &RetryPolicy<E::Kind>,
        mut operation: F,
        mut on_attempt: H,
    ) -> Result<T, ResilienceError<E>>
    where
        E: Fault,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        H: FnMut(&OnAttemptArgs<'_, E>),
    {
        let mut attempt = Attempt::first(policy.max_attempts());

        loop {
            let outcome = operation().await.map_err(ResilienceError::Operation);

            match self.evaluate_attempt(&self.name, policy, outcome, attempt, &mut on_attempt) {
                ControlFlow::Continue(next) => {
                    self.clock.delay(next.wait).await;
                    attempt = next.attempt;
                }
                ControlFlow::Break(result) => return result,
            }
        }
    }

    /// Runs `operation` through `breaker` on every attempt.
    ///
    /// A rejection by the breaker ends the execution immediately without
    /// invoking the operation. Events are reported under the circuit's name.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run). Rejections surface as [`ResilienceError::CircuitOpen`].
    pub async fn run_guarded<T, E, K, S, F, Fut>(
        &self,
        policy: &RetryPolicy<K>,
        breaker: &CircuitBreaker<K, S>,
        operation: F,
    ) -> Result<T, ResilienceError<E>>
    where
        K: FaultKind,
        S: CircuitStore,
        E: Fault<Kind = K>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.run_guarded_with(policy, breaker, operation, |_| {}).await
    }

    /// Like [`run_guarded`](Self::run_guarded), calling `on_attempt` after each
    /// retryable failure and before the wait that follows it.
    ///
    /// # Errors
    ///
    /// See [`run_guarded`](Self::run_guarded).
    pub async fn run_guarded_with<T, E, K, S, F, Fut, H>(
        &self,
        policy: &RetryPolicy<K>,
        breaker: &CircuitBreaker<K, S>,
        mut operation: F,
        mut on_attempt: H,
    ) -> Result<T, ResilienceError<E>>
    where
        K: FaultKind,
        S: CircuitStore,
        E: Fault<Kind = K>,
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        H: FnMut(&OnAttemptArgs<'_, E>),
    {
        let mut attempt = Attempt::first(policy.max_attempts());

        loop {
            let outcome = breaker.call(&mut operation).await;

            match self.evaluate_attempt(breaker.name(), policy, outcome, attempt, &mut on_attempt) {
                ControlFlow::Continue(next) => {
                    self.clock.delay(next.wait).await;
                    attempt = next.attempt;
                }
                ControlFlow::Break(result) => return result,
            }
        }
    }

    fn evaluate_attempt<T, E: Fault>(
        &self,
        name: &str,
        policy: &RetryPolicy<E::Kind>,
        outcome: Result<T, ResilienceError<E>>,
        attempt: Attempt,
        on_attempt: &mut impl FnMut(&OnAttemptArgs<'_, E>),
    ) -> ControlFlow<Result<T, ResilienceError<E>>, ContinueRetry> {
        let error = match outcome {
            Ok(value) => return ControlFlow::Break(Ok(value)),
            Err(error) => error,
        };

        if policy.classify(&error) == Verdict::NonRetryable {
            return ControlFlow::Break(Err(error));
        }

        let Some(next_attempt) = attempt.increment(policy.max_attempts()) else {
            return ControlFlow::Break(Err(policy.exhausted(error, attempt.number())));
        };

        let wait = self.compute_wait(policy, &error, attempt);

        on_attempt(&OnAttemptArgs {
            attempt,
            error: &error,
            wait,
        });

        if let Some(kind) = error.kind() {
            self.sink.on_event(&ResilienceEvent::RetryAttempted {
                name,
                attempt: attempt.number(),
                error_kind: kind.name(),
                wait,
            });
        }

        ControlFlow::Continue(ContinueRetry {
            attempt: next_attempt,
            wait,
        })
    }

    /// A server-requested wait is honored verbatim; otherwise full jitter.
    fn compute_wait<E: Fault>(&self, policy: &RetryPolicy<E::Kind>, error: &ResilienceError<E>, attempt: Attempt) -> Duration {
        error
            .operation_error()
            .and_then(Fault::retry_after)
            .unwrap_or_else(|| policy.backoff().wait(attempt.index(), &self.rnd))
    }
}
