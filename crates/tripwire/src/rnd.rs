// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;

/// Non-cryptographic random source for backoff jitter and probe lease tokens.
///
/// Nothing in this crate needs cryptographic guarantees, so the thread-local
/// `fastrand` generator backs the default variant. A seeded variant makes the
/// jitter sequence reproducible.
#[derive(Clone, Default)]
pub(crate) enum Rnd {
    #[default]
    Real,

    Seeded(Arc<Mutex<fastrand::Rng>>),

    #[cfg(test)]
    Test(Arc<dyn Fn() -> f64 + Send + Sync>),
}

impl Debug for Rnd {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Real => write!(f, "Real"),
            Self::Seeded(_) => write!(f, "Seeded"),
            #[cfg(test)]
            Self::Test(_) => write!(f, "Test"),
        }
    }
}

impl Rnd {
    pub fn new_seeded(seed: u64) -> Self {
        Self::Seeded(Arc::new(Mutex::new(fastrand::Rng::with_seed(seed))))
    }

    #[cfg(test)]
    pub fn new_fixed(value: f64) -> Self {
        Self::Test(Arc::new(move || value))
    }

    #[cfg(test)]
    pub fn new_function<F>(f: F) -> Self
    where
        F: Fn() -> f64 + Send + Sync + 'static,
    {
        Self::Test(Arc::new(f))
    }

    /// Returns a value in `[0, 1)`.
    pub fn next_f64(&self) -> f64 {
        match self {
            Self::Real => fastrand::f64(),
            Self::Seeded(rng) => rng.lock().f64(),
            #[cfg(test)]
            Self::Test(generator) => generator(),
        }
    }
}

/// Generates an opaque token identifying a probe lease holder.
pub(crate) fn lease_token() -> u64 {
    fastrand::u64(..)
}
