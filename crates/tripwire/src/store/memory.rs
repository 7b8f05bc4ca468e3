// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::circuit::{CircuitRecord, RecordDefaults};
use crate::store::{CircuitStore, StoreError};

/// Process-local circuit storage.
///
/// Clones share the same records, so one store can back several registries
/// inside a process.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    records: Arc<Mutex<HashMap<String, CircuitRecord>>>,
}

impl InMemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the record for `name`, if one exists.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<CircuitRecord> {
        self.records.lock().get(name).cloned()
    }

    /// Number of stored circuits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    /// Returns `true` when no circuit has been stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl CircuitStore for InMemoryStore {
    async fn read_or_init(&self, name: &str, defaults: &RecordDefaults) -> Result<CircuitRecord, StoreError> {
        let mut records = self.records.lock();
        let record = records
            .entry(name.to_owned())
            .or_insert_with(|| CircuitRecord::new(name, defaults));
        Ok(record.clone())
    }

    async fn compare_and_swap(&self, name: &str, expected: &CircuitRecord, updated: CircuitRecord) -> Result<bool, StoreError> {
        let mut records = self.records.lock();
        match records.get_mut(name) {
            Some(current) if current == expected => {
                *current = updated;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
