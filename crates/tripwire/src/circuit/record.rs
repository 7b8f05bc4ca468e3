// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, SystemTime};

/// The state of a circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    any(feature = "serde", test),
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum CircuitState {
    /// Calls flow normally and failures are counted.
    Closed,
    /// Calls are rejected until the cooldown elapses.
    Open,
    /// A single probe call tests whether the dependency recovered.
    HalfOpen,
}

impl CircuitState {
    /// Short `snake_case` name of the state.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Closed => "closed",
            Self::Open => "open",
            Self::HalfOpen => "half_open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Exclusive right to run the single probe call of a half-open circuit.
///
/// The lease is identified by an opaque token so that only its holder can
/// resolve the probe. An expired lease may be reclaimed by another caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProbeLease {
    /// Opaque holder identity.
    pub token: u64,
    /// Wall-clock instant after which the lease may be reclaimed.
    pub expires_at: SystemTime,
}

impl ProbeLease {
    /// Returns `true` when the lease still blocks other callers at `now`.
    #[must_use]
    pub fn is_live(&self, now: SystemTime) -> bool {
        self.expires_at > now
    }
}

/// Parameters copied into a record when a circuit is first created.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordDefaults {
    /// Consecutive failures that trip the circuit.
    pub threshold: u32,
    /// Cooldown before an open circuit allows a probe.
    pub ttl: Duration,
}

/// Persisted state of one named circuit.
///
/// Records are owned by a [`CircuitStore`](crate::CircuitStore). Every state
/// change produces a new record with `version` incremented by one and is
/// published through compare-and-swap against the record it was derived from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CircuitRecord {
    /// Circuit name.
    pub name: String,
    /// Current state.
    pub state: CircuitState,
    /// Failures counted since the last success while closed.
    pub consecutive_failures: u32,
    /// When the circuit last entered `Open`. Absent while closed.
    pub opened_at: Option<SystemTime>,
    /// Consecutive failures that trip the circuit.
    pub threshold: u32,
    /// Cooldown before an open circuit allows a probe.
    pub ttl: Duration,
    /// The outstanding probe lease while half-open.
    pub probe: Option<ProbeLease>,
    /// Number of times the circuit has entered `Open`.
    ///
    /// Calls remember the epoch they were admitted in, so a result arriving
    /// after the circuit tripped, even one that has since recovered, is
    /// told apart from results of the current closed period.
    pub epoch: u64,
    /// Monotonic change counter.
    pub version: u64,
}

impl CircuitRecord {
    /// A fresh closed record.
    #[must_use]
    pub fn new(name: impl Into<String>, defaults: &RecordDefaults) -> Self {
        Self {
            name: name.into(),
            state: CircuitState::Closed,
            consecutive_failures: 0,
            opened_at: None,
            threshold: defaults.threshold,
            ttl: defaults.ttl,
            probe: None,
            epoch: 0,
            version: 0,
        }
    }

    /// Time the circuit has been open at `now`, or zero when it never opened.
    ///
    /// A clock that moved backwards yields zero.
    #[must_use]
    pub fn open_elapsed(&self, now: SystemTime) -> Duration {
        self.opened_at
            .map_or(Duration::ZERO, |opened_at| now.duration_since(opened_at).unwrap_or(Duration::ZERO))
    }

    /// Returns the successor of this record with `version` bumped.
    pub(crate) fn next(&self) -> Self {
        Self {
            version: self.version.saturating_add(1),
            ..self.clone()
        }
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> RecordDefaults {
        RecordDefaults {
            threshold: 5,
            ttl: Duration::from_secs(30),
        }
    }

    #[test]
    fn new_record_is_closed() {
        let record = CircuitRecord::new("payments", &defaults());

        assert_eq!(record.name, "payments");
        assert_eq!(record.state, CircuitState::Closed);
        assert_eq!(record.consecutive_failures, 0);
        assert_eq!(record.opened_at, None);
        assert_eq!(record.threshold, 5);
        assert_eq!(record.ttl, Duration::from_secs(30));
        assert_eq!(record.probe, None);
        assert_eq!(record.epoch, 0);
        assert_eq!(record.version, 0);
    }

    #[test]
    fn next_bumps_version_only() {
        let record = CircuitRecord::new("payments", &defaults());
        let next = record.next();

        assert_eq!(next.version, 1);
        assert_eq!(CircuitRecord { version: 0, ..next }, record);
    }

    #[test]
    fn open_elapsed_handles_backwards_clock() {
        let opened = SystemTime::UNIX_EPOCH + Duration::from_secs(100);
        let record = CircuitRecord {
            opened_at: Some(opened),
            ..CircuitRecord::new("x", &defaults())
        };

        assert_eq!(record.open_elapsed(opened + Duration::from_secs(7)), Duration::from_secs(7));
        assert_eq!(record.open_elapsed(opened - Duration::from_secs(7)), Duration::ZERO);
    }

    #[test]
    fn lease_liveness() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
        let lease = ProbeLease {
            token: 1,
            expires_at: now + Duration::from_secs(1),
        };

        assert!(lease.is_live(now));
        assert!(!lease.is_live(now + Duration::from_secs(1)));
    }

    #[test]
    fn state_names() {
        assert_eq!(CircuitState::Closed.to_string(), "closed");
        assert_eq!(CircuitState::Open.as_str(), "open");
        assert_eq!(CircuitState::HalfOpen.as_str(), "half_open");
    }
}
