// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::borrow::Cow;
use std::time::Duration;

use tripwire::{CircuitRecord, CircuitStore, RecordDefaults, StoreError};

use crate::{PersistedRecord, Versioned, VersionedBackend};

/// Default prefix of the keys holding circuit records.
pub const DEFAULT_KEY_PREFIX: &str = "tripwire:circuit:";

// An insert can only lose to a concurrent insert, after which the key exists.
const INIT_ROUNDS: usize = 3;

/// A [`CircuitStore`] shared by every process using the same backend.
///
/// Each circuit lives under `<prefix><name>` as a JSON [`PersistedRecord`].
/// The record version doubles as the backend version token, so a
/// compare-and-swap succeeds only against the exact record it was derived from.
///
/// # Examples
///
/// ```
/// # use std::time::Duration;
/// # use tripwire_shared::{SharedStore, VersionedBackend};
/// # fn example(backend: impl VersionedBackend) {
/// let store = SharedStore::new(backend)
///     .key_prefix("orders:circuit:")
///     .key_ttl(Duration::from_secs(24 * 60 * 60));
/// assert_eq!(store.key("payments"), "orders:circuit:payments");
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct SharedStore<B> {
    backend: B,
    prefix: Cow<'static, str>,
    key_ttl: Option<Duration>,
}

impl<B> SharedStore<B> {
    /// Wraps `backend` using the default key prefix and no key expiry.
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend,
            prefix: Cow::Borrowed(DEFAULT_KEY_PREFIX),
            key_ttl: None,
        }
    }

    /// Sets the prefix of record keys.
    #[must_use]
    pub fn key_prefix(mut self, prefix: impl Into<Cow<'static, str>>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Expires records that have not been written for `ttl`.
    ///
    /// An expired circuit starts over closed on its next use.
    #[must_use]
    pub fn key_ttl(mut self, ttl: Duration) -> Self {
        self.key_ttl = Some(ttl);
        self
    }

    /// The backend.
    #[must_use]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// The key holding the record of circuit `name`.
    #[must_use]
    pub fn key(&self, name: &str) -> String {
        format!("{}{name}", self.prefix)
    }
}

impl<B: VersionedBackend> SharedStore<B> {
    async fn load(&self, key: &str, name: &str) -> Result<Option<CircuitRecord>, StoreError> {
        let Some(stored) = self.backend.load(key).await.map_err(StoreError::from_cause)? else {
            return Ok(None);
        };

        let persisted: PersistedRecord = serde_json::from_slice(&stored.payload).map_err(StoreError::from_cause)?;
        let mut record = persisted.into_record(name);
        record.version = stored.version;
        Ok(Some(record))
    }

    async fn write(&self, key: &str, expected_version: Option<u64>, record: &CircuitRecord) -> Result<bool, StoreError> {
        let payload = serde_json::to_vec(&PersistedRecord::from_record(record)).map_err(StoreError::from_cause)?;
        self.backend
            .store_if(key, expected_version, Versioned::new(record.version, payload), self.key_ttl)
            .await
            .map_err(StoreError::from_cause)
    }
}

impl<B: VersionedBackend> CircuitStore for SharedStore<B> {
    async fn read_or_init(&self, name: &str, defaults: &RecordDefaults) -> Result<CircuitRecord, StoreError> {
        let key = self.key(name);

        for _ in 0..INIT_ROUNDS {
            if let Some(record) = self.load(&key, name).await? {
                return Ok(record);
            }

            let record = CircuitRecord::new(name, defaults);
            if self.write(&key, None, &record).await? {
                return Ok(record);
            }
        }

        Err(StoreError::from_cause(format!(
            "record '{key}' kept disappearing while being initialized"
        )))
    }

    async fn compare_and_swap(&self, name: &str, expected: &CircuitRecord, updated: CircuitRecord) -> Result<bool, StoreError> {
        if updated.version <= expected.version {
            return Err(StoreError::from_cause(format!(
                "update of '{name}' must advance the version past {}",
                expected.version
            )));
        }

        self.write(&self.key(name), Some(expected.version), &updated).await
    }
}
