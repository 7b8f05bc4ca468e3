// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Circuit breaking over a shared record store.

mod breaker;
mod config;
mod constants;
mod record;
mod registry;
mod transition;

pub use breaker::{CircuitBreaker, CircuitPermit};
#[cfg(any(feature = "serde", test))]
pub use config::BreakerConfigData;
pub use config::{BreakerConfig, BreakerConfigBuilder};
pub use record::{CircuitRecord, CircuitState, ProbeLease, RecordDefaults};
pub use registry::CircuitBreakerRegistry;
