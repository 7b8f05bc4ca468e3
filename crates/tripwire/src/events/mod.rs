// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Lifecycle notifications emitted by circuits and retries.
//!
//! Events are delivered synchronously to an [`EventSink`] at the moment the
//! corresponding state change is committed. Sinks observe; they cannot alter
//! the outcome of the call that produced the event.
//!
//! # Telemetry
//!
//! A [`ResilienceContext`] with logs enabled emits `tracing` events named
//! `tripwire.circuit` and `tripwire.retry`. With metrics enabled every event
//! increments the `resilience.event` counter, labeled with the keys below.

mod context;
#[cfg(any(feature = "metrics", test))]
pub(crate) mod metrics;
mod telemetry;

use std::fmt::Debug;
use std::time::Duration;

pub use context::ResilienceContext;
pub(crate) use telemetry::TelemetrySink;

/// Key used to annotate the name of a resilience pipeline.
///
/// Values reported under this dimension should be short and concise, preferably in `snake_case`.
pub const PIPELINE_NAME: &str = "resilience.pipeline.name";

/// Key used to annotate the kind of strategy that emitted an event, `retry` or `circuit_breaker`.
pub const STRATEGY_NAME: &str = "resilience.strategy.name";

/// Key used to annotate the specific resilience event being emitted.
///
/// Examples: `retry`, `circuit_opened`, `circuit_closed`.
pub const EVENT_NAME: &str = "resilience.event.name";

/// Key used to annotate the circuit or operation an event concerns.
pub const OPERATION_NAME: &str = "resilience.operation.name";

/// A state change worth reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ResilienceEvent<'a> {
    /// A registry created a breaker for a new circuit name.
    CircuitCreated {
        /// Circuit name.
        name: &'a str,
    },

    /// A closed circuit reached its failure threshold and opened.
    CircuitTripped {
        /// Circuit name.
        name: &'a str,
        /// Failures counted when the circuit opened.
        consecutive_failures: u32,
    },

    /// A caller claimed the probe lease of a circuit.
    CircuitProbing {
        /// Circuit name.
        name: &'a str,
    },

    /// A probe succeeded and the circuit closed.
    CircuitRecovered {
        /// Circuit name.
        name: &'a str,
        /// How long the circuit was unavailable.
        open_duration: Duration,
    },

    /// A probe failed and the circuit opened again.
    CircuitReopened {
        /// Circuit name.
        name: &'a str,
    },

    /// A retryable failure is about to be retried.
    RetryAttempted {
        /// Name of the retried operation.
        name: &'a str,
        /// One-based number of the attempt that failed.
        attempt: u32,
        /// Kind of the failure.
        error_kind: &'a str,
        /// Sleep before the next attempt.
        wait: Duration,
    },
}

impl<'a> ResilienceEvent<'a> {
    /// The circuit or operation name the event concerns.
    #[must_use]
    pub const fn name(&self) -> &'a str {
        match *self {
            Self::CircuitCreated { name }
            | Self::CircuitTripped { name, .. }
            | Self::CircuitProbing { name }
            | Self::CircuitRecovered { name, .. }
            | Self::CircuitReopened { name }
            | Self::RetryAttempted { name, .. } => name,
        }
    }

    /// Stable `snake_case` identifier of the event.
    #[must_use]
    pub const fn event_name(&self) -> &'static str {
        match self {
            Self::CircuitCreated { .. } => "circuit_created",
            Self::CircuitTripped { .. } => "circuit_opened",
            Self::CircuitProbing { .. } => "circuit_probing",
            Self::CircuitRecovered { .. } => "circuit_closed",
            Self::CircuitReopened { .. } => "circuit_reopened",
            Self::RetryAttempted { .. } => "retry",
        }
    }

    /// The strategy that emitted the event.
    #[must_use]
    pub const fn strategy_name(&self) -> &'static str {
        match self {
            Self::RetryAttempted { .. } => "retry",
            _ => "circuit_breaker",
        }
    }
}

/// Receives resilience events.
///
/// Implementations must return quickly and must not panic; they run inline
/// with the call that triggered the event.
pub trait EventSink: Debug + Send + Sync {
    /// Handles one event.
    fn on_event(&self, event: &ResilienceEvent<'_>);
}

/// A sink that discards every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl EventSink for NoopSink {
    fn on_event(&self, _event: &ResilienceEvent<'_>) {}
}
