// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use recoverable::{Recovery, RecoveryInfo};

use crate::{Fault, StoreError};

/// The error returned by guarded and retried executions.
///
/// Operation failures are passed through unchanged. The other variants report
/// conditions produced by the resilience machinery itself.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ResilienceError<E> {
    /// The operation failed and the failure was not retried further.
    #[error(transparent)]
    Operation(E),

    /// The circuit rejected the call without invoking the operation.
    #[error(transparent)]
    CircuitOpen(#[from] CircuitOpenError),

    /// Every permitted attempt failed with a retryable fault.
    ///
    /// Only produced when the retry policy does not re-raise the original error.
    #[error("retries exhausted after {attempts} attempts")]
    RetriesExhausted {
        /// Number of attempts made.
        attempts: u32,
        /// The failure of the final attempt.
        #[source]
        last: E,
    },

    /// Circuit state could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl<E> ResilienceError<E> {
    /// Returns `true` when the circuit rejected the call.
    #[must_use]
    pub const fn is_circuit_open(&self) -> bool {
        matches!(self, Self::CircuitOpen(_))
    }

    /// The operation's own error, if the failure came from the operation.
    #[must_use]
    pub const fn operation_error(&self) -> Option<&E> {
        match self {
            Self::Operation(error) | Self::RetriesExhausted { last: error, .. } => Some(error),
            Self::CircuitOpen(_) | Self::Store(_) => None,
        }
    }

    /// Consumes the error, returning the operation's own error if there is one.
    #[must_use]
    pub fn into_operation_error(self) -> Option<E> {
        match self {
            Self::Operation(error) | Self::RetriesExhausted { last: error, .. } => Some(error),
            Self::CircuitOpen(_) | Self::Store(_) => None,
        }
    }
}

impl<E: Fault> ResilienceError<E> {
    /// The fault kind of the operation's error, if the failure came from the operation.
    #[must_use]
    pub fn kind(&self) -> Option<E::Kind> {
        self.operation_error().map(Fault::kind)
    }
}

impl<E: Fault> Recovery for ResilienceError<E> {
    fn recovery(&self) -> RecoveryInfo {
        match self {
            Self::Operation(error) => error
                .retry_after()
                .map_or_else(RecoveryInfo::unknown, |wait| RecoveryInfo::retry().delay(wait)),
            Self::CircuitOpen(open) => RecoveryInfo::unavailable().delay(open.retry_in()),
            Self::RetriesExhausted { .. } | Self::Store(_) => RecoveryInfo::never(),
        }
    }
}

/// A call was rejected because its circuit is open or a probe is already in flight.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("circuit '{name}' is open, next attempt allowed in {retry_in:?}")]
pub struct CircuitOpenError {
    name: String,
    retry_in: Duration,
}

impl CircuitOpenError {
    pub(crate) fn new(name: impl Into<String>, retry_in: Duration) -> Self {
        Self {
            name: name.into(),
            retry_in,
        }
    }

    /// Name of the circuit that rejected the call.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Time until the next call may be admitted.
    ///
    /// While open this is the remainder of the cooldown. While a probe is in
    /// flight it is the remainder of the probe lease.
    #[must_use]
    pub const fn retry_in(&self) -> Duration {
        self.retry_in
    }
}

/// Why a circuit did not admit a call.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum AdmissionError {
    /// The circuit rejected the call.
    #[error(transparent)]
    Open(#[from] CircuitOpenError),

    /// Circuit state could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl<E> From<AdmissionError> for ResilienceError<E> {
    fn from(error: AdmissionError) -> Self {
        match error {
            AdmissionError::Open(open) => Self::CircuitOpen(open),
            AdmissionError::Store(store) => Self::Store(store),
        }
    }
}

/// An invalid retry policy or breaker configuration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// `max_attempts` must be at least 1.
    #[error("max_attempts must be at least 1")]
    ZeroAttempts,

    /// `wait_min` exceeds `wait_max`.
    #[error("wait_min ({wait_min:?}) must not exceed wait_max ({wait_max:?})")]
    WaitRange {
        /// Configured lower bound.
        wait_min: Duration,
        /// Configured upper bound.
        wait_max: Duration,
    },

    /// `exp_base` must be a finite number of at least 1.
    #[error("exp_base must be finite and at least 1, got {0}")]
    ExpBase(f64),

    /// `multiplier` must be finite and non-negative.
    #[error("multiplier must be finite and non-negative, got {0}")]
    Multiplier(f64),

    /// `threshold` must be at least 1.
    #[error("threshold must be at least 1")]
    ZeroThreshold,

    /// A duration given in seconds is negative or not a number.
    #[error("{field} must be a non-negative number of seconds, got {value}")]
    Seconds {
        /// The offending field.
        field: &'static str,
        /// The offending value.
        value: f64,
    },
}
