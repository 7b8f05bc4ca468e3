// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Persistence of circuit records.

mod error;
mod memory;

pub use error::StoreError;
pub use memory::InMemoryStore;

use crate::circuit::{CircuitRecord, RecordDefaults};

/// Storage for circuit records with atomic conditional updates.
///
/// Implementations may be process-local or backed by a shared service. The
/// breaker relies on two guarantees:
///
/// - [`read_or_init`](Self::read_or_init) returns the stored record, creating a
///   closed one from `defaults` when none exists. Concurrent initializations of
///   the same name must converge on a single record.
/// - [`compare_and_swap`](Self::compare_and_swap) replaces the record only when
///   the stored record still equals `expected`, and reports whether it did.
pub trait CircuitStore: Send + Sync {
    /// Reads the record for `name`, creating it when absent.
    fn read_or_init(
        &self,
        name: &str,
        defaults: &RecordDefaults,
    ) -> impl Future<Output = Result<CircuitRecord, StoreError>> + Send;

    /// Replaces the record for `name` with `updated` if it still equals `expected`.
    ///
    /// Returns `Ok(false)` when another writer got there first.
    fn compare_and_swap(
        &self,
        name: &str,
        expected: &CircuitRecord,
        updated: CircuitRecord,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send;
}
