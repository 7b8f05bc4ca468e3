// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use tripwire::{CircuitRecord, CircuitState, ProbeLease};

/// Wire layout of a circuit record.
///
/// Instants are milliseconds since the Unix epoch so that every process reads
/// the same wall-clock values. The circuit name is not stored; it is part of
/// the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedRecord {
    /// Current state.
    pub state: CircuitState,
    /// Failures counted since the last success.
    pub consecutive_failures: u32,
    /// When the circuit last opened.
    pub opened_at_ms: Option<u64>,
    /// Trip threshold.
    pub threshold: u32,
    /// Cooldown in milliseconds.
    pub ttl_ms: u64,
    /// Outstanding probe lease.
    pub probe: Option<PersistedProbe>,
    /// Number of times the circuit has opened.
    pub epoch: u64,
    /// Version token of the record.
    pub version: u64,
}

/// Wire layout of a probe lease.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistedProbe {
    /// Lease holder identity.
    pub token: u64,
    /// Lease expiry in milliseconds since the Unix epoch.
    pub expires_at_ms: u64,
}

impl PersistedRecord {
    /// Captures `record` for storage.
    #[must_use]
    pub fn from_record(record: &CircuitRecord) -> Self {
        Self {
            state: record.state,
            consecutive_failures: record.consecutive_failures,
            opened_at_ms: record.opened_at.map(to_millis),
            threshold: record.threshold,
            ttl_ms: duration_millis(record.ttl),
            probe: record.probe.map(|lease| PersistedProbe {
                token: lease.token,
                expires_at_ms: to_millis(lease.expires_at),
            }),
            epoch: record.epoch,
            version: record.version,
        }
    }

    /// Rebuilds the record of circuit `name`.
    #[must_use]
    pub fn into_record(self, name: impl Into<String>) -> CircuitRecord {
        CircuitRecord {
            name: name.into(),
            state: self.state,
            consecutive_failures: self.consecutive_failures,
            opened_at: self.opened_at_ms.map(from_millis),
            threshold: self.threshold,
            ttl: Duration::from_millis(self.ttl_ms),
            probe: self.probe.map(|probe| ProbeLease {
                token: probe.token,
                expires_at: from_millis(probe.expires_at_ms),
            }),
            epoch: self.epoch,
            version: self.version,
        }
    }
}

fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

// Instants before the epoch collapse to the epoch.
fn to_millis(instant: SystemTime) -> u64 {
    instant.duration_since(UNIX_EPOCH).map_or(0, duration_millis)
}

fn from_millis(millis: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(millis)
}
