// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::fmt::Display;

/// Position of one call within a retried execution.
///
/// Indices are zero-based: the first call is attempt 0.
///
/// # Examples
///
/// ```
/// use tripwire::Attempt;
///
/// let attempt = Attempt::new(0, false);
/// assert!(attempt.is_first());
/// assert_eq!(attempt.number(), 1);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Attempt {
    index: u32,
    is_last: bool,
}

impl Attempt {
    /// Creates an attempt at `index`.
    #[must_use]
    pub const fn new(index: u32, is_last: bool) -> Self {
        Self { index, is_last }
    }

    pub(crate) const fn first(max_attempts: u32) -> Self {
        Self::new(0, max_attempts <= 1)
    }

    /// Zero-based index.
    #[must_use]
    pub const fn index(self) -> u32 {
        self.index
    }

    /// One-based attempt number.
    #[must_use]
    pub const fn number(self) -> u32 {
        self.index.saturating_add(1)
    }

    /// Returns `true` for the initial call.
    #[must_use]
    pub const fn is_first(self) -> bool {
        self.index == 0
    }

    /// Returns `true` when no further attempt is permitted after this one.
    #[must_use]
    pub const fn is_last(self) -> bool {
        self.is_last
    }

    /// The following attempt, or `None` once `max_attempts` calls have been made.
    pub(crate) const fn increment(self, max_attempts: u32) -> Option<Self> {
        if self.is_last {
            return None;
        }

        let next = self.index.saturating_add(1);
        Some(Self::new(next, next.saturating_add(1) >= max_attempts))
    }
}

impl Display for Attempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.index.fmt(f)
    }
}
