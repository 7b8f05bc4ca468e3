// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::cmp::min;
use std::time::Duration;

use crate::rnd::Rnd;
use crate::utils::secs_to_duration_saturating;

/// Exponential backoff with full jitter.
///
/// For the retry following attempt `n` (zero-based) the ceiling is
/// `min(wait_max, wait_min * multiplier * exp_base^n)` and the wait is drawn
/// uniformly from `[0, ceiling)`. Drawing from the whole range spreads the
/// retries of many callers that failed together.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FullJitter {
    pub wait_min: Duration,
    pub wait_max: Duration,
    pub multiplier: f64,
    pub exp_base: f64,
}

impl FullJitter {
    pub fn cap(&self, attempt: u32) -> Duration {
        // zero base => always zero
        if self.wait_min.is_zero() || self.multiplier <= 0.0 {
            return Duration::ZERO;
        }

        let factor = self.exp_base.powi(i32::try_from(attempt).unwrap_or(i32::MAX));
        let secs = self.wait_min.as_secs_f64() * self.multiplier * factor;
        min(self.wait_max, secs_to_duration_saturating(secs))
    }

    pub fn wait(&self, attempt: u32, rnd: &Rnd) -> Duration {
        let cap = self.cap(attempt);
        min(cap, secs_to_duration_saturating(cap.as_secs_f64() * rnd.next_f64()))
    }
}
