// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use super::constants::{DEFAULT_ENABLED, DEFAULT_THRESHOLD, DEFAULT_TTL};
use super::record::RecordDefaults;
use crate::{ConfigError, FaultKind, KindSet};

/// Behavior of a circuit breaker.
///
/// Defaults: trip after 5 consecutive failures, stay open for 30 seconds,
/// count every fault kind, and give a probe as long as the cooldown to finish.
///
/// Threshold and cooldown are copied into a circuit's record when the circuit
/// is first created. Later configurations for the same name do not change an
/// existing record.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    any(feature = "serde", test),
    derive(serde::Serialize, serde::Deserialize),
    serde(
        try_from = "BreakerConfigData<K>",
        into = "BreakerConfigData<K>",
        bound(
            serialize = "K: FaultKind + serde::Serialize",
            deserialize = "K: FaultKind + serde::Deserialize<'de>"
        )
    )
)]
pub struct BreakerConfig<K> {
    threshold: u32,
    ttl: Duration,
    exclude: KindSet<K>,
    enabled: bool,
    probe_timeout: Option<Duration>,
}

impl<K: FaultKind> BreakerConfig<K> {
    /// Starts a builder seeded with the defaults.
    #[must_use]
    pub fn builder() -> BreakerConfigBuilder<K> {
        BreakerConfigBuilder { config: Self::default() }
    }

    /// Consecutive counted failures that open the circuit.
    #[must_use]
    pub const fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Cooldown before an open circuit admits a probe.
    #[must_use]
    pub const fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Kinds that neither count as failures nor reset the count.
    #[must_use]
    pub const fn exclude(&self) -> &KindSet<K> {
        &self.exclude
    }

    /// Whether the breaker guards calls at all.
    #[must_use]
    pub const fn enabled(&self) -> bool {
        self.enabled
    }

    /// How long a probe lease blocks other callers. Defaults to the cooldown.
    #[must_use]
    pub fn probe_timeout(&self) -> Duration {
        self.probe_timeout.unwrap_or(self.ttl)
    }

    /// Returns `true` when failures of `kind` count toward the threshold.
    #[must_use]
    pub fn counts(&self, kind: K) -> bool {
        !self.exclude.contains(kind)
    }

    pub(crate) const fn record_defaults(&self) -> RecordDefaults {
        RecordDefaults {
            threshold: self.threshold,
            ttl: self.ttl,
        }
    }
}

impl<K: FaultKind> Default for BreakerConfig<K> {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            ttl: DEFAULT_TTL,
            exclude: KindSet::none(),
            enabled: DEFAULT_ENABLED,
            probe_timeout: None,
        }
    }
}

/// Builder for [`BreakerConfig`].
#[derive(Debug, Clone)]
pub struct BreakerConfigBuilder<K> {
    config: BreakerConfig<K>,
}

impl<K: FaultKind> BreakerConfigBuilder<K> {
    /// Consecutive counted failures that open the circuit. Must be at least 1.
    #[must_use]
    pub fn threshold(mut self, threshold: u32) -> Self {
        self.config.threshold = threshold;
        self
    }

    /// Cooldown before an open circuit admits a probe.
    #[must_use]
    pub fn ttl(mut self, ttl: Duration) -> Self {
        self.config.ttl = ttl;
        self
    }

    /// Kinds that neither count as failures nor reset the count.
    #[must_use]
    pub fn exclude(mut self, kinds: KindSet<K>) -> Self {
        self.config.exclude = kinds;
        self
    }

    /// Turns the breaker on or off. A disabled breaker passes every call through.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.config.enabled = enabled;
        self
    }

    /// How long a probe lease blocks other callers.
    ///
    /// A probe whose caller vanished without reporting releases the circuit
    /// once this elapses.
    #[must_use]
    pub fn probe_timeout(mut self, timeout: Duration) -> Self {
        self.config.probe_timeout = Some(timeout);
        self
    }

    /// Validates and returns the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroThreshold`] when the threshold is zero.
    pub fn build(self) -> Result<BreakerConfig<K>, ConfigError> {
        if self.config.threshold == 0 {
            return Err(ConfigError::ZeroThreshold);
        }

        Ok(self.config)
    }
}

/// Plain-data form of [`BreakerConfig`] used for configuration files.
///
/// Durations are expressed in seconds. Missing fields take their defaults.
#[cfg(any(feature = "serde", test))]
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default, bound(deserialize = "K: FaultKind + serde::Deserialize<'de>"))]
pub struct BreakerConfigData<K> {
    /// Consecutive counted failures that open the circuit.
    pub threshold: u32,
    /// Cooldown, in seconds.
    pub ttl: f64,
    /// Kinds that do not count.
    pub exclude: KindSet<K>,
    /// Whether the breaker guards calls.
    pub enabled: bool,
    /// Probe lease duration in seconds. Absent means the cooldown.
    pub probe_timeout: Option<f64>,
}

#[cfg(any(feature = "serde", test))]
impl<K: FaultKind> Default for BreakerConfigData<K> {
    fn default() -> Self {
        BreakerConfig::default().into()
    }
}

#[cfg(any(feature = "serde", test))]
impl<K: FaultKind> From<BreakerConfig<K>> for BreakerConfigData<K> {
    fn from(config: BreakerConfig<K>) -> Self {
        Self {
            threshold: config.threshold,
            ttl: config.ttl.as_secs_f64(),
            exclude: config.exclude,
            enabled: config.enabled,
            probe_timeout: config.probe_timeout.map(|timeout| timeout.as_secs_f64()),
        }
    }
}

#[cfg(any(feature = "serde", test))]
impl<K: FaultKind> TryFrom<BreakerConfigData<K>> for BreakerConfig<K> {
    type Error = ConfigError;

    fn try_from(data: BreakerConfigData<K>) -> Result<Self, Self::Error> {
        let mut builder = Self::builder()
            .threshold(data.threshold)
            .ttl(crate::utils::parse_seconds("ttl", data.ttl)?)
            .exclude(data.exclude)
            .enabled(data.enabled);

        if let Some(timeout) = data.probe_timeout {
            builder = builder.probe_timeout(crate::utils::parse_seconds("probe_timeout", timeout)?);
        }

        builder.build()
    }
}
