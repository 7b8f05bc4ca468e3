// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Pure state transitions of a circuit record.
//!
//! The breaker reads a record, asks these functions what to do, and publishes
//! the resulting record through compare-and-swap. Nothing here touches a store.

use std::time::{Duration, SystemTime};

use super::record::{CircuitRecord, CircuitState, ProbeLease};

/// How a caller holds its admission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mode {
    /// The breaker is disabled; outcomes are not recorded.
    Bypass,
    /// Admitted through a closed circuit during this epoch.
    Normal(u64),
    /// Holder of the probe lease with this token.
    Probe(u64),
}

/// The result of a guarded call as seen by the circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Outcome {
    Success,
    /// A failure that counts toward the threshold.
    Failure,
    /// A failure of an excluded kind.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Entry {
    /// Run the call, recording its outcome against `epoch`.
    Admit { epoch: u64 },
    /// Publish `updated` to become the probe holder.
    Claim { updated: CircuitRecord, token: u64 },
    Reject { retry_in: Duration },
}

/// A committed state change worth reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    Tripped { consecutive_failures: u32 },
    Recovered { open_duration: Duration },
    Reopened,
    /// The probe ended with an excluded failure and gave up its lease.
    Released,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Exit {
    Unchanged,
    Update {
        updated: CircuitRecord,
        transition: Option<Transition>,
    },
}

/// Decides whether a call may start.
pub(crate) fn enter(record: &CircuitRecord, now: SystemTime, probe_timeout: Duration, token: u64) -> Entry {
    match record.state {
        CircuitState::Closed => Entry::Admit { epoch: record.epoch },
        CircuitState::Open => {
            let elapsed = record.opened_at.map_or(record.ttl, |_| record.open_elapsed(now));
            if elapsed >= record.ttl {
                claim(record, now, probe_timeout, token)
            } else {
                Entry::Reject {
                    retry_in: record.ttl.saturating_sub(elapsed),
                }
            }
        }
        CircuitState::HalfOpen => match record.probe {
            Some(lease) if lease.is_live(now) => Entry::Reject {
                retry_in: lease.expires_at.duration_since(now).unwrap_or(Duration::ZERO),
            },
            // no lease, or the holder vanished and the lease expired
            _ => claim(record, now, probe_timeout, token),
        },
    }
}

fn claim(record: &CircuitRecord, now: SystemTime, probe_timeout: Duration, token: u64) -> Entry {
    let mut updated = record.next();
    updated.state = CircuitState::HalfOpen;
    updated.probe = Some(ProbeLease {
        token,
        expires_at: now.checked_add(probe_timeout).unwrap_or(now),
    });

    Entry::Claim { updated, token }
}

/// Decides how a finished call changes the record.
pub(crate) fn exit(record: &CircuitRecord, mode: Mode, outcome: Outcome, now: SystemTime) -> Exit {
    match mode {
        Mode::Bypass => Exit::Unchanged,
        Mode::Normal(epoch) => exit_normal(record, epoch, outcome, now),
        Mode::Probe(token) => exit_probe(record, token, outcome, now),
    }
}

fn exit_normal(record: &CircuitRecord, epoch: u64, outcome: Outcome, now: SystemTime) -> Exit {
    // results of calls admitted before the circuit last opened are ignored,
    // including when it has closed again since
    if record.state != CircuitState::Closed || record.epoch != epoch {
        return Exit::Unchanged;
    }

    match outcome {
        Outcome::Ignored => Exit::Unchanged,
        Outcome::Success if record.consecutive_failures == 0 => Exit::Unchanged,
        Outcome::Success => {
            let mut updated = record.next();
            updated.consecutive_failures = 0;
            Exit::Update {
                updated,
                transition: None,
            }
        }
        Outcome::Failure => {
            let mut updated = record.next();
            updated.consecutive_failures = record.consecutive_failures.saturating_add(1);

            if updated.consecutive_failures < record.threshold {
                return Exit::Update {
                    updated,
                    transition: None,
                };
            }

            updated.state = CircuitState::Open;
            updated.opened_at = Some(now);
            updated.probe = None;
            updated.epoch = record.epoch.saturating_add(1);
            Exit::Update {
                transition: Some(Transition::Tripped {
                    consecutive_failures: updated.consecutive_failures,
                }),
                updated,
            }
        }
    }
}

fn exit_probe(record: &CircuitRecord, token: u64, outcome: Outcome, now: SystemTime) -> Exit {
    let holds_lease = record.state == CircuitState::HalfOpen && record.probe.is_some_and(|lease| lease.token == token);
    if !holds_lease {
        // the lease expired and was reclaimed, or the record moved on
        return Exit::Unchanged;
    }

    let mut updated = record.next();
    updated.probe = None;

    let transition = match outcome {
        Outcome::Success => {
            updated.state = CircuitState::Closed;
            updated.consecutive_failures = 0;
            updated.opened_at = None;
            Transition::Recovered {
                open_duration: record.open_elapsed(now),
            }
        }
        Outcome::Failure => {
            updated.state = CircuitState::Open;
            updated.opened_at = Some(now);
            updated.epoch = record.epoch.saturating_add(1);
            Transition::Reopened
        }
        Outcome::Ignored => Transition::Released,
    };

    Exit::Update {
        updated,
        transition: Some(transition),
    }
}
