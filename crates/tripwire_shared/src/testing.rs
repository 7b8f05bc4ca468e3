// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! In-process backend for tests.
//!
//! [`MemoryBackend`] behaves like a remote versioned store shared by every
//! clone, records each operation and can be told to fail on demand.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

use crate::{BackendError, Versioned, VersionedBackend};

/// A recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendOp {
    /// A load of the given key.
    Load(String),
    /// A conditional write.
    StoreIf {
        /// Target key.
        key: String,
        /// Version the caller expected to replace.
        expected_version: Option<u64>,
        /// Version of the written value.
        version: u64,
    },
}

type FailPredicate = Box<dyn Fn(&BackendOp) -> bool + Send + Sync>;

#[derive(Debug, Clone)]
struct Slot {
    value: Versioned,
    ttl: Option<Duration>,
}

/// A versioned key-value map standing in for a remote store.
///
/// Clones share data, so handing clones to several [`SharedStore`](crate::SharedStore)s
/// simulates several processes talking to one server. Key expiry is recorded
/// but never enforced; use [`expire`](Self::expire) to drop a key.
///
/// # Examples
///
/// ```
/// use tripwire_shared::testing::{BackendOp, MemoryBackend};
/// use tripwire_shared::{Versioned, VersionedBackend};
///
/// # futures::executor::block_on(async {
/// let backend = MemoryBackend::new();
/// assert!(backend.store_if("k", None, Versioned::new(0, "v"), None).await.unwrap());
/// assert!(!backend.store_if("k", None, Versioned::new(0, "w"), None).await.unwrap());
///
/// backend.fail_when(|op| matches!(op, BackendOp::Load(_)));
/// assert!(backend.load("k").await.is_err());
/// # });
/// ```
#[derive(Clone, Default)]
pub struct MemoryBackend {
    data: Arc<Mutex<HashMap<String, Slot>>>,
    operations: Arc<Mutex<Vec<BackendOp>>>,
    fail_when: Arc<Mutex<Option<FailPredicate>>>,
}

impl std::fmt::Debug for MemoryBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryBackend")
            .field("data", &self.data)
            .field("operations", &self.operations)
            .field("fail_when", &self.fail_when.lock().is_some())
            .finish()
    }
}

impl MemoryBackend {
    /// Creates an empty backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.lock().len()
    }

    /// Returns `true` when nothing is stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.lock().is_empty()
    }

    /// Returns `true` if `key` is stored.
    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.lock().contains_key(key)
    }

    /// The stored value of `key`.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<Versioned> {
        self.data.lock().get(key).map(|slot| slot.value.clone())
    }

    /// The expiry requested by the last write of `key`.
    #[must_use]
    pub fn ttl(&self, key: &str) -> Option<Duration> {
        self.data.lock().get(key).and_then(|slot| slot.ttl)
    }

    /// Drops `key` as if its expiry elapsed.
    pub fn expire(&self, key: &str) {
        self.data.lock().remove(key);
    }

    /// Fails every operation matching `predicate`.
    pub fn fail_when<F>(&self, predicate: F)
    where
        F: Fn(&BackendOp) -> bool + Send + Sync + 'static,
    {
        *self.fail_when.lock() = Some(Box::new(predicate));
    }

    /// Lets all operations succeed again.
    pub fn clear_failures(&self) {
        *self.fail_when.lock() = None;
    }

    /// All recorded operations, oldest first.
    #[must_use]
    pub fn operations(&self) -> Vec<BackendOp> {
        self.operations.lock().clone()
    }

    /// Forgets recorded operations.
    pub fn clear_operations(&self) {
        self.operations.lock().clear();
    }

    fn record(&self, op: &BackendOp) -> Result<(), BackendError> {
        self.operations.lock().push(op.clone());
        if self.fail_when.lock().as_ref().is_some_and(|predicate| predicate(op)) {
            let name = match op {
                BackendOp::Load(_) => "load",
                BackendOp::StoreIf { .. } => "store_if",
            };
            return Err(BackendError::from_cause(format!("memory backend: {name} failed")));
        }
        Ok(())
    }
}

impl VersionedBackend for MemoryBackend {
    async fn load(&self, key: &str) -> Result<Option<Versioned>, BackendError> {
        self.record(&BackendOp::Load(key.to_owned()))?;
        Ok(self.get(key))
    }

    async fn store_if(
        &self,
        key: &str,
        expected_version: Option<u64>,
        value: Versioned,
        ttl: Option<Duration>,
    ) -> Result<bool, BackendError> {
        self.record(&BackendOp::StoreIf {
            key: key.to_owned(),
            expected_version,
            version: value.version,
        })?;

        let mut data = self.data.lock();
        let current = data.get(key).map(|slot| slot.value.version);
        if current != expected_version {
            return Ok(false);
        }

        data.insert(key.to_owned(), Slot { value, ttl });
        Ok(true)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use futures::executor::block_on;

    use super::*;

    #[test]
    fn conditional_writes() {
        let backend = MemoryBackend::new();

        assert!(block_on(backend.store_if("k", None, Versioned::new(1, "a"), None)).unwrap());
        assert!(!block_on(backend.store_if("k", None, Versioned::new(1, "b"), None)).unwrap());
        assert!(!block_on(backend.store_if("k", Some(0), Versioned::new(2, "b"), None)).unwrap());
        assert!(block_on(backend.store_if("k", Some(1), Versioned::new(2, "b"), None)).unwrap());

        assert_eq!(backend.get("k"), Some(Versioned::new(2, "b")));
    }

    #[test]
    fn expired_keys_can_be_recreated() {
        let backend = MemoryBackend::new();
        block_on(backend.store_if("k", None, Versioned::new(5, "a"), Some(Duration::from_secs(1)))).unwrap();
        assert_eq!(backend.ttl("k"), Some(Duration::from_secs(1)));

        backend.expire("k");

        assert!(backend.is_empty());
        assert!(block_on(backend.store_if("k", None, Versioned::new(0, "b"), None)).unwrap());
    }

    #[test]
    fn failures_are_recorded_and_cleared() {
        let backend = MemoryBackend::new();
        backend.fail_when(|op| matches!(op, BackendOp::StoreIf { .. }));

        let error = block_on(backend.store_if("k", None, Versioned::new(0, "a"), None)).unwrap_err();
        assert!(error.to_string().contains("store_if failed"));
        assert!(backend.is_empty());
        assert_eq!(backend.operations().len(), 1);

        backend.clear_failures();
        backend.clear_operations();
        assert!(block_on(backend.store_if("k", None, Versioned::new(0, "a"), None)).unwrap());
        assert_eq!(backend.operations().len(), 1);
    }
}
