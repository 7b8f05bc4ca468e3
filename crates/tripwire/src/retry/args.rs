// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

use crate::{Attempt, ResilienceError};

/// Arguments passed to the attempt hook of [`RetryExecutor::run_with`][super::RetryExecutor::run_with].
///
/// The hook runs after a retryable failure and before the executor sleeps.
#[derive(Debug)]
pub struct OnAttemptArgs<'a, E> {
    pub(super) attempt: Attempt,
    pub(super) error: &'a ResilienceError<E>,
    pub(super) wait: Duration,
}

impl<E> OnAttemptArgs<'_, E> {
    /// The attempt that just failed.
    #[must_use]
    pub fn attempt(&self) -> Attempt {
        self.attempt
    }

    /// The failure, already classified as retryable.
    #[must_use]
    pub fn error(&self) -> &ResilienceError<E> {
        self.error
    }

    /// How long the executor will sleep before the next attempt.
    #[must_use]
    pub fn wait(&self) -> Duration {
        self.wait
    }
}
