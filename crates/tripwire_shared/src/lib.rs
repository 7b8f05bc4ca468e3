// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]

//! Shared circuit state for [`tripwire`] over a versioned key-value store.
//!
//! A [`tripwire::CircuitBreakerRegistry`] keeps circuit records in a
//! [`tripwire::CircuitStore`]. The in-process store gives each process its own
//! view of a dependency's health. [`SharedStore`] instead keeps the records in
//! a remote store reachable by every instance of a service, so that failures
//! observed by one instance protect all of them and only one instance probes a
//! recovering dependency.
//!
//! The remote store is abstracted by [`VersionedBackend`]: a map from keys to
//! byte payloads where every write names the version it expects to replace.
//! Most stores offer such a primitive natively.
//!
//! # Examples
//!
//! ```
//! # use tick::Clock;
//! use tripwire::{FaultKind, Resilience, ResilienceContext};
//! use tripwire_shared::{SharedStore, VersionedBackend};
//!
//! fn instance<K: FaultKind, B: VersionedBackend>(clock: &Clock, backend: B) -> Resilience<K, SharedStore<B>> {
//!     Resilience::new(&ResilienceContext::new(clock), SharedStore::new(backend))
//! }
//! ```
//!
//! Instances built over clones of one backend client share every circuit.
//!
//! # Features
//!
//! - `test-util`: enables `testing::MemoryBackend`, an in-process backend for tests.

mod backend;
mod record;
mod store;

#[cfg(any(feature = "test-util", test))]
pub mod testing;

pub use backend::{BackendError, Versioned, VersionedBackend};
pub use record::{PersistedProbe, PersistedRecord};
pub use store::{DEFAULT_KEY_PREFIX, SharedStore};
