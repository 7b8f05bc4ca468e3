// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::backoff::FullJitter;
use super::constants::{
    DEFAULT_EXP_BASE, DEFAULT_MAX_ATTEMPTS, DEFAULT_MULTIPLIER, DEFAULT_RERAISE_ORIGINAL, DEFAULT_WAIT_MAX, DEFAULT_WAIT_MIN,
};
use crate::{ConfigError, Fault, FaultKind, KindSet, ResilienceError, Verdict, classify};

/// How often and how patiently to retry a failing operation.
///
/// Policies are immutable once built. Create one with [`RetryPolicy::builder`]
/// or take the defaults: three attempts, waits between 1 and 60 seconds that
/// double per attempt, every fault kind retryable, and the final operation error
/// returned unchanged when attempts run out.
///
/// # Examples
///
/// ```
/// # use std::time::Duration;
/// # use tripwire::{FaultKind, KindSet, RetryPolicy};
/// # #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// # enum Kind { Timeout, Unauthorized }
/// # impl FaultKind for Kind {
/// #     fn name(self) -> &'static str { "kind" }
/// # }
/// let policy = RetryPolicy::builder()
///     .max_attempts(5)
///     .wait_min(Duration::from_millis(100))
///     .wait_max(Duration::from_secs(5))
///     .never_retry(KindSet::of([Kind::Unauthorized]))
///     .build()?;
///
/// assert_eq!(policy.max_attempts(), 5);
/// # Ok::<(), tripwire::ConfigError>(())
/// ```
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    any(feature = "serde", test),
    derive(serde::Serialize, serde::Deserialize),
    serde(
        try_from = "RetryPolicyConfig<K>",
        into = "RetryPolicyConfig<K>",
        bound(
            serialize = "K: FaultKind + serde::Serialize",
            deserialize = "K: FaultKind + serde::Deserialize<'de>"
        )
    )
)]
pub struct RetryPolicy<K> {
    max_attempts: u32,
    wait_min: Duration,
    wait_max: Duration,
    multiplier: f64,
    exp_base: f64,
    retryable: KindSet<K>,
    never_retry: KindSet<K>,
    reraise_original: bool,
}

impl<K: FaultKind> RetryPolicy<K> {
    /// Starts a builder seeded with the default policy.
    #[must_use]
    pub fn builder() -> RetryPolicyBuilder<K> {
        RetryPolicyBuilder { policy: Self::default() }
    }

    /// Total attempts, including the first call.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Smallest backoff ceiling.
    #[must_use]
    pub const fn wait_min(&self) -> Duration {
        self.wait_min
    }

    /// Largest backoff ceiling.
    #[must_use]
    pub const fn wait_max(&self) -> Duration {
        self.wait_max
    }

    /// Scale applied to `wait_min` before exponentiation.
    #[must_use]
    pub const fn multiplier(&self) -> f64 {
        self.multiplier
    }

    /// Growth factor of the backoff ceiling per attempt.
    #[must_use]
    pub const fn exp_base(&self) -> f64 {
        self.exp_base
    }

    /// Kinds that may be retried.
    #[must_use]
    pub const fn retryable(&self) -> &KindSet<K> {
        &self.retryable
    }

    /// Kinds that are never retried, whatever `retryable` says.
    #[must_use]
    pub const fn never_retry(&self) -> &KindSet<K> {
        &self.never_retry
    }

    /// Whether exhaustion returns the last operation error unchanged.
    ///
    /// When `false`, exhaustion is reported as [`ResilienceError::RetriesExhausted`].
    #[must_use]
    pub const fn reraise_original(&self) -> bool {
        self.reraise_original
    }

    /// Classifies a failure under this policy.
    ///
    /// Only operation errors can be retryable. Open circuits, exhausted retries
    /// and store failures are always final.
    #[must_use]
    pub fn classify<E: Fault<Kind = K>>(&self, error: &ResilienceError<E>) -> Verdict {
        match error {
            ResilienceError::Operation(fault) => classify(fault.kind(), &self.retryable, &self.never_retry),
            _ => Verdict::NonRetryable,
        }
    }

    /// The backoff ceiling for the retry that follows attempt `attempt` (zero-based).
    ///
    /// Actual waits are drawn uniformly below this value.
    #[must_use]
    pub fn max_wait(&self, attempt: u32) -> Duration {
        self.backoff().cap(attempt)
    }

    pub(crate) const fn backoff(&self) -> FullJitter {
        FullJitter {
            wait_min: self.wait_min,
            wait_max: self.wait_max,
            multiplier: self.multiplier,
            exp_base: self.exp_base,
        }
    }

    /// Shapes the error returned once no attempts remain.
    pub(crate) fn exhausted<E>(&self, error: ResilienceError<E>, attempts: u32) -> ResilienceError<E> {
        match error {
            ResilienceError::Operation(last) if !self.reraise_original => ResilienceError::RetriesExhausted { attempts, last },
            other => other,
        }
    }

    fn validate(self) -> Result<Self, ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }

        if self.wait_min > self.wait_max {
            return Err(ConfigError::WaitRange {
                wait_min: self.wait_min,
                wait_max: self.wait_max,
            });
        }

        if !self.exp_base.is_finite() || self.exp_base < 1.0 {
            return Err(ConfigError::ExpBase(self.exp_base));
        }

        if !self.multiplier.is_finite() || self.multiplier < 0.0 {
            return Err(ConfigError::Multiplier(self.multiplier));
        }

        Ok(self)
    }
}

impl<K: FaultKind> Default for RetryPolicy<K> {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            wait_min: DEFAULT_WAIT_MIN,
            wait_max: DEFAULT_WAIT_MAX,
            multiplier: DEFAULT_MULTIPLIER,
            exp_base: DEFAULT_EXP_BASE,
            retryable: KindSet::all(),
            never_retry: KindSet::none(),
            reraise_original: DEFAULT_RERAISE_ORIGINAL,
        }
    }
}

/// Builder for [`RetryPolicy`]. Values are checked by [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct RetryPolicyBuilder<K> {
    policy: RetryPolicy<K>,
}

impl<K: FaultKind> RetryPolicyBuilder<K> {
    /// Total attempts, including the first call. Must be at least 1.
    #[must_use]
    pub fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.policy.max_attempts = max_attempts;
        self
    }

    /// Smallest backoff ceiling.
    #[must_use]
    pub fn wait_min(mut self, wait_min: Duration) -> Self {
        self.policy.wait_min = wait_min;
        self
    }

    /// Largest backoff ceiling. Must not be below `wait_min`.
    #[must_use]
    pub fn wait_max(mut self, wait_max: Duration) -> Self {
        self.policy.wait_max = wait_max;
        self
    }

    /// Scale applied to `wait_min` before exponentiation.
    #[must_use]
    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.policy.multiplier = multiplier;
        self
    }

    /// Growth factor per attempt. Must be at least 1.
    #[must_use]
    pub fn exp_base(mut self, exp_base: f64) -> Self {
        self.policy.exp_base = exp_base;
        self
    }

    /// Kinds that may be retried.
    #[must_use]
    pub fn retry_on(mut self, kinds: KindSet<K>) -> Self {
        self.policy.retryable = kinds;
        self
    }

    /// Kinds that are never retried.
    #[must_use]
    pub fn never_retry(mut self, kinds: KindSet<K>) -> Self {
        self.policy.never_retry = kinds;
        self
    }

    /// Whether exhaustion returns the last operation error unchanged.
    #[must_use]
    pub fn reraise_original(mut self, reraise: bool) -> Self {
        self.policy.reraise_original = reraise;
        self
    }

    /// Validates and returns the policy.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when `max_attempts` is zero, `wait_min` exceeds
    /// `wait_max`, `exp_base` is below 1, or `multiplier` is negative.
    pub fn build(self) -> Result<RetryPolicy<K>, ConfigError> {
        self.policy.validate()
    }
}

/// Plain-data form of [`RetryPolicy`] used for configuration files.
///
/// Durations are expressed in seconds. Missing fields take their defaults.
#[cfg(any(feature = "serde", test))]
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, bound(deserialize = "K: FaultKind + serde::Deserialize<'de>"))]
pub struct RetryPolicyConfig<K> {
    /// Total attempts, including the first call.
    pub max_attempts: u32,
    /// Smallest backoff ceiling, in seconds.
    pub wait_min: f64,
    /// Largest backoff ceiling, in seconds.
    pub wait_max: f64,
    /// Scale applied to `wait_min`.
    pub multiplier: f64,
    /// Growth factor per attempt.
    pub exp_base: f64,
    /// Kinds that may be retried.
    pub retryable: KindSet<K>,
    /// Kinds that are never retried.
    pub never_retry: KindSet<K>,
    /// Whether exhaustion returns the last operation error unchanged.
    pub reraise_original: bool,
}

#[cfg(any(feature = "serde", test))]
impl<K: FaultKind> Default for RetryPolicyConfig<K> {
    fn default() -> Self {
        RetryPolicy::default().into()
    }
}

#[cfg(any(feature = "serde", test))]
impl<K: FaultKind> From<RetryPolicy<K>> for RetryPolicyConfig<K> {
    fn from(policy: RetryPolicy<K>) -> Self {
        Self {
            max_attempts: policy.max_attempts,
            wait_min: policy.wait_min.as_secs_f64(),
            wait_max: policy.wait_max.as_secs_f64(),
            multiplier: policy.multiplier,
            exp_base: policy.exp_base,
            retryable: policy.retryable,
            never_retry: policy.never_retry,
            reraise_original: policy.reraise_original,
        }
    }
}

#[cfg(any(feature = "serde", test))]
impl<K: FaultKind> TryFrom<RetryPolicyConfig<K>> for RetryPolicy<K> {
    type Error = ConfigError;

    fn try_from(config: RetryPolicyConfig<K>) -> Result<Self, Self::Error> {
        Self::builder()
            .max_attempts(config.max_attempts)
            .wait_min(crate::utils::parse_seconds("wait_min", config.wait_min)?)
            .wait_max(crate::utils::parse_seconds("wait_max", config.wait_max)?)
            .multiplier(config.multiplier)
            .exp_base(config.exp_base)
            .retry_on(config.retryable)
            .never_retry(config.never_retry)
            .reraise_original(config.reraise_original)
            .build()
    }
}
