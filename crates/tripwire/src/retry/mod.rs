// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Retries with exponential backoff and full jitter.

mod args;
mod attempt;
mod backoff;
mod constants;
mod executor;
mod policy;

pub use args::OnAttemptArgs;
pub use attempt::Attempt;
pub use executor::RetryExecutor;
#[cfg(any(feature = "serde", test))]
pub use policy::RetryPolicyConfig;
pub use policy::{RetryPolicy, RetryPolicyBuilder};
