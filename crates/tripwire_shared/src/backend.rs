// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

/// A stored value together with its version token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    /// Version token the value was written with.
    pub version: u64,
    /// Serialized value.
    pub payload: Vec<u8>,
}

impl Versioned {
    /// Creates a value with the given version token.
    #[must_use]
    pub fn new(version: u64, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            version,
            payload: payload.into(),
        }
    }
}

/// A failure talking to the backing store.
///
/// # Example
///
/// ```
/// use tripwire_shared::BackendError;
///
/// let error = BackendError::from_cause("connection refused");
/// assert!(error.to_string().contains("connection refused"));
/// ```
#[ohno::error]
pub struct BackendError {}

impl BackendError {
    /// Wraps a driver failure.
    pub fn from_cause(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(cause)
    }
}

/// A remote key-value store with optimistic concurrency.
///
/// Every value carries a version token chosen by the writer. A conditional
/// write succeeds only when the stored token still matches the expected one,
/// which lets several processes agree on a single history per key.
///
/// Implementations map this onto their store's native primitive, e.g. a
/// conditional put or a watched transaction.
pub trait VersionedBackend: Send + Sync {
    /// Loads the value stored under `key`.
    fn load(&self, key: &str) -> impl Future<Output = Result<Option<Versioned>, BackendError>> + Send;

    /// Writes `value` under `key` if the stored version equals `expected_version`.
    ///
    /// `None` means the key must be absent. Returns `Ok(false)` when the
    /// condition does not hold. A `ttl` asks the store to expire the key after
    /// that long without writes.
    fn store_if(
        &self,
        key: &str,
        expected_version: Option<u64>,
        value: Versioned,
        ttl: Option<Duration>,
    ) -> impl Future<Output = Result<bool, BackendError>> + Send;
}
