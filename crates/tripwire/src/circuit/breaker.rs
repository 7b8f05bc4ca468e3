// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::sync::Arc;

use tick::Clock;

use super::constants::MAX_CAS_ROUNDS;
use super::transition::{self, Entry, Exit, Mode, Outcome, Transition};
use super::{BreakerConfig, CircuitRecord, CircuitState};
use crate::{AdmissionError, CircuitOpenError, CircuitStore, EventSink, Fault, FaultKind, ResilienceError, ResilienceEvent, StoreError};

/// Guards calls to one named dependency.
///
/// A breaker is a cheap handle: the circuit's state lives in the store, so
/// every handle for the same name, in this process or another one sharing the
/// store, observes and drives the same circuit. Obtain handles from a
/// [`CircuitBreakerRegistry`](crate::CircuitBreakerRegistry).
///
/// # State machine
///
/// - `Closed`: calls run. Counted failures accumulate and a success resets
///   them. Reaching the threshold opens the circuit.
/// - `Open`: calls are rejected with [`CircuitOpenError`] until the cooldown
///   elapses. The first caller after that claims the probe lease and the
///   circuit becomes `HalfOpen`.
/// - `HalfOpen`: only the lease holder runs. Success closes the circuit and a
///   counted failure reopens it with a fresh cooldown. Everyone else is
///   rejected until the lease resolves or expires.
///
/// Results of calls admitted while closed that arrive after the circuit left
/// `Closed` are ignored.
pub struct CircuitBreaker<K, S> {
    pub(super) name: Arc<str>,
    pub(super) config: Arc<BreakerConfig<K>>,
    pub(super) store: Arc<S>,
    pub(super) clock: Clock,
    pub(super) sink: Arc<dyn EventSink>,
    pub(super) logs_enabled: bool,
}

impl<K, S> Clone for CircuitBreaker<K, S> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            config: Arc::clone(&self.config),
            store: Arc::clone(&self.store),
            clock: self.clock.clone(),
            sink: Arc::clone(&self.sink),
            logs_enabled: self.logs_enabled,
        }
    }
}

impl<K: Debug, S> Debug for CircuitBreaker<K, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CircuitBreaker")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl<K: FaultKind, S: CircuitStore> CircuitBreaker<K, S> {
    /// The circuit name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The configuration this handle was created with.
    #[must_use]
    pub fn config(&self) -> &BreakerConfig<K> {
        &self.config
    }

    /// Current state of the circuit.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the record cannot be read.
    pub async fn state(&self) -> Result<CircuitState, StoreError> {
        Ok(self.record().await?.state)
    }

    /// Snapshot of the circuit's record.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the record cannot be read.
    pub async fn record(&self) -> Result<CircuitRecord, StoreError> {
        self.store.read_or_init(&self.name, &self.config.record_defaults()).await
    }

    /// Runs `operation` under the breaker.
    ///
    /// A rejected call returns [`ResilienceError::CircuitOpen`] without invoking
    /// `operation`. Otherwise the outcome is recorded and returned; operation
    /// errors come back as [`ResilienceError::Operation`].
    ///
    /// A store failure while recording the outcome does not replace the
    /// operation's result.
    ///
    /// # Errors
    ///
    /// Returns the operation's error, a rejection, or a store failure during admission.
    pub async fn call<T, E, F, Fut>(&self, operation: F) -> Result<T, ResilienceError<E>>
    where
        E: Fault<Kind = K>,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let permit = self.acquire().await?;
        let outcome = operation().await;

        if let Err(error) = permit.complete(&outcome).await {
            self.report_record_failure(&error);
        }

        outcome.map_err(ResilienceError::Operation)
    }

    /// Asks for admission without running anything.
    ///
    /// The returned permit must be resolved with the outcome of the call it
    /// admitted. A probe permit that is dropped unresolved keeps the circuit
    /// half-open until its lease expires.
    ///
    /// # Errors
    ///
    /// Returns [`AdmissionError::Open`] when the circuit rejects the call and
    /// [`AdmissionError::Store`] when its state cannot be read or written.
    pub async fn acquire(&self) -> Result<CircuitPermit<'_, K, S>, AdmissionError> {
        if !self.config.enabled() {
            return Ok(CircuitPermit::new(self, Mode::Bypass));
        }

        for _ in 0..MAX_CAS_ROUNDS {
            let current = self.record().await?;
            let now = self.clock.system_time();

            match transition::enter(&current, now, self.config.probe_timeout(), crate::rnd::lease_token()) {
                Entry::Admit { epoch } => return Ok(CircuitPermit::new(self, Mode::Normal(epoch))),
                Entry::Reject { retry_in } => return Err(CircuitOpenError::new(self.name.as_ref(), retry_in).into()),
                Entry::Claim { updated, token } => {
                    if self.store.compare_and_swap(&self.name, &current, updated).await? {
                        self.sink.on_event(&ResilienceEvent::CircuitProbing { name: &self.name });
                        return Ok(CircuitPermit::new(self, Mode::Probe(token)));
                    }
                }
            }
        }

        Err(self.contention().into())
    }

    async fn resolve(&self, mode: Mode, outcome: Outcome) -> Result<(), StoreError> {
        if mode == Mode::Bypass || (matches!(mode, Mode::Normal(_)) && outcome == Outcome::Ignored) {
            return Ok(());
        }

        for _ in 0..MAX_CAS_ROUNDS {
            let current = self.record().await?;
            let now = self.clock.system_time();

            match transition::exit(&current, mode, outcome, now) {
                Exit::Unchanged => return Ok(()),
                Exit::Update { updated, transition } => {
                    if self.store.compare_and_swap(&self.name, &current, updated).await? {
                        if let Some(transition) = transition {
                            self.emit(transition);
                        }
                        return Ok(());
                    }
                }
            }
        }

        Err(self.contention())
    }

    fn emit(&self, transition: Transition) {
        let name = &*self.name;
        let event = match transition {
            Transition::Tripped { consecutive_failures } => ResilienceEvent::CircuitTripped {
                name,
                consecutive_failures,
            },
            Transition::Recovered { open_duration } => ResilienceEvent::CircuitRecovered { name, open_duration },
            Transition::Reopened => ResilienceEvent::CircuitReopened { name },
            Transition::Released => return,
        };

        self.sink.on_event(&event);
    }

    fn contention(&self) -> StoreError {
        StoreError::from_cause(format!(
            "circuit '{}' changed {MAX_CAS_ROUNDS} times while updating it",
            self.name
        ))
    }

    #[cfg_attr(
        not(any(feature = "logs", test)),
        expect(unused_variables, reason = "only logged when logs are compiled in")
    )]
    fn report_record_failure(&self, error: &StoreError) {
        #[cfg(any(feature = "logs", test))]
        if self.logs_enabled {
            tracing::event!(
                name: "tripwire.circuit",
                tracing::Level::ERROR,
                circuit.name = %self.name,
                circuit.event = "record_failed",
                error = %error,
            );
        }
    }
}

/// Admission to run one call under a breaker.
///
/// Resolve it with [`success`](Self::success), [`failure`](Self::failure) or
/// [`complete`](Self::complete). Each consumes the permit, so an outcome is
/// recorded at most once.
#[must_use = "a permit must be resolved with the outcome of its call"]
#[derive(Debug)]
pub struct CircuitPermit<'a, K, S> {
    breaker: &'a CircuitBreaker<K, S>,
    mode: Mode,
}

impl<'a, K: FaultKind, S: CircuitStore> CircuitPermit<'a, K, S> {
    const fn new(breaker: &'a CircuitBreaker<K, S>, mode: Mode) -> Self {
        Self { breaker, mode }
    }

    /// Returns `true` when this call is the circuit's probe.
    #[must_use]
    pub const fn is_probe(&self) -> bool {
        matches!(self.mode, Mode::Probe(_))
    }

    /// Records a success.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the circuit's state cannot be updated.
    pub async fn success(self) -> Result<(), StoreError> {
        self.breaker.resolve(self.mode, Outcome::Success).await
    }

    /// Records a failure of `kind`. Excluded kinds leave the count untouched.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the circuit's state cannot be updated.
    pub async fn failure(self, kind: K) -> Result<(), StoreError> {
        let outcome = if self.breaker.config.counts(kind) {
            Outcome::Failure
        } else {
            Outcome::Ignored
        };

        self.breaker.resolve(self.mode, outcome).await
    }

    /// Records the outcome of an operation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the circuit's state cannot be updated.
    pub async fn complete<T, E: Fault<Kind = K>>(self, outcome: &Result<T, E>) -> Result<(), StoreError> {
        match outcome {
            Ok(_) => self.success().await,
            Err(error) => self.failure(error.kind()).await,
        }
    }
}
