// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

#![cfg_attr(coverage_nightly, feature(coverage_attribute))]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![cfg_attr(
    not(all(feature = "logs", feature = "metrics")),
    expect(
        rustdoc::broken_intra_doc_links,
        reason = "telemetry switches only exist with their features enabled"
    )
)]

//! Retries and circuit breaking for calls to unreliable dependencies.
//!
//! Operations report failures as [`Fault`]s tagged with a [`FaultKind`]. A
//! [`RetryPolicy`] decides which kinds are worth another attempt and how long
//! to wait in between; a [`CircuitBreaker`] stops calling a dependency that
//! keeps failing and lets a single probe find out when it recovered.
//!
//! Circuit state lives in a [`CircuitStore`]. The bundled [`InMemoryStore`]
//! keeps it in process; the `tripwire_shared` crate keeps it in a shared
//! key-value service so that every process calling the same dependency sees
//! the same circuit.
//!
//! # Quick Start
//!
//! ```
//! # use std::time::Duration;
//! # use tick::Clock;
//! use tripwire::{BreakerConfig, Fault, FaultKind, KindSet, Resilience, ResilienceContext, RetryPolicy};
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
//! enum ApiKind {
//!     Unavailable,
//!     BadRequest,
//! }
//!
//! impl FaultKind for ApiKind {
//!     fn name(self) -> &'static str {
//!         match self {
//!             Self::Unavailable => "unavailable",
//!             Self::BadRequest => "bad_request",
//!         }
//!     }
//! }
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("api call failed: {0:?}")]
//! struct ApiError(ApiKind);
//!
//! impl Fault for ApiError {
//!     type Kind = ApiKind;
//!
//!     fn kind(&self) -> ApiKind {
//!         self.0
//!     }
//! }
//!
//! # async fn call_api() -> Result<String, ApiError> { Ok(String::new()) }
//! # async fn example(clock: Clock) -> Result<(), tripwire::ResilienceError<ApiError>> {
//! let resilience = Resilience::in_memory(&ResilienceContext::new(&clock).name("orders"));
//!
//! let policy = RetryPolicy::builder()
//!     .max_attempts(4)
//!     .wait_max(Duration::from_secs(10))
//!     .never_retry(KindSet::of([ApiKind::BadRequest]))
//!     .build()
//!     .expect("valid policy");
//! let circuit = BreakerConfig::builder()
//!     .threshold(5)
//!     .ttl(Duration::from_secs(30))
//!     .exclude(KindSet::of([ApiKind::BadRequest]))
//!     .build()
//!     .expect("valid config");
//!
//! let body = resilience.execute("inventory_api", &policy, &circuit, || call_api()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! > **Note**: Waits and circuit timestamps come from the [`Clock`][tick::Clock] passed in the
//! > [`ResilienceContext`]. Tests can drive it with `tick::ClockControl`.
//!
//! # Recovery Metadata
//!
//! [`ResilienceError`] implements [`Recovery`]: an open circuit reports itself as
//! unavailable together with the time until the next probe, and exhausted retries
//! as permanent.
//!
//! # Features
//!
//! - `logs`: Emits `tracing` events for circuit transitions and retries once
//!   [`ResilienceContext::enable_logs`] is called.
//! - `metrics`: Reports every event to the OpenTelemetry `resilience.event` counter once
//!   [`ResilienceContext::enable_metrics`] is called.
//! - `serde`: Loads [`RetryPolicy`] and [`BreakerConfig`] from configuration, with
//!   durations in seconds.

#[doc(inline)]
pub use recoverable::{Recovery, RecoveryInfo, RecoveryKind};

pub mod circuit;
pub mod events;
pub mod retry;
pub mod store;

mod error;
mod fault;
mod resilient;
mod rnd;
mod utils;

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
pub(crate) mod testing;

#[cfg(any(feature = "serde", test))]
pub use circuit::BreakerConfigData;
pub use circuit::{
    BreakerConfig, BreakerConfigBuilder, CircuitBreaker, CircuitBreakerRegistry, CircuitPermit, CircuitRecord, CircuitState, ProbeLease,
    RecordDefaults,
};
pub use error::{AdmissionError, CircuitOpenError, ConfigError, ResilienceError};
pub use events::{EventSink, NoopSink, ResilienceContext, ResilienceEvent};
pub use fault::{Fault, FaultKind, KindSet, Verdict, classify};
pub use resilient::Resilience;
#[cfg(any(feature = "serde", test))]
pub use retry::RetryPolicyConfig;
pub use retry::{Attempt, OnAttemptArgs, RetryExecutor, RetryPolicy, RetryPolicyBuilder};
pub use store::{CircuitStore, InMemoryStore, StoreError};
