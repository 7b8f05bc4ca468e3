// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Fault kinds and the rules that decide whether a fault is worth retrying.
//!
//! Operations report failures through the [`Fault`] trait. Every fault carries a
//! [`FaultKind`], a small copyable tag that may declare a parent kind. Kind sets
//! match a kind when it equals one of their members or descends from one, so a
//! policy that retries `Transient` also retries `Timeout` when `Timeout` names
//! `Transient` as its parent.

use std::fmt::Debug;
use std::hash::Hash;
use std::time::Duration;

/// A tag classifying the failures an operation can produce.
///
/// Kinds form a forest through [`FaultKind::parent`]. The relation must be acyclic.
///
/// # Examples
///
/// ```
/// use tripwire::FaultKind;
///
/// #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
/// enum HttpKind {
///     Transient,
///     Timeout,
///     Unauthorized,
/// }
///
/// impl FaultKind for HttpKind {
///     fn name(self) -> &'static str {
///         match self {
///             Self::Transient => "transient",
///             Self::Timeout => "timeout",
///             Self::Unauthorized => "unauthorized",
///         }
///     }
///
///     fn parent(self) -> Option<Self> {
///         match self {
///             Self::Timeout => Some(Self::Transient),
///             _ => None,
///         }
///     }
/// }
///
/// assert!(HttpKind::Timeout.is_a(HttpKind::Transient));
/// assert!(!HttpKind::Transient.is_a(HttpKind::Timeout));
/// ```
pub trait FaultKind: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Short `snake_case` name reported in events and logs.
    fn name(self) -> &'static str;

    /// The kind this kind specializes, if any.
    fn parent(self) -> Option<Self> {
        None
    }

    /// Returns `true` when `self` equals `ancestor` or descends from it.
    #[cfg_attr(test, mutants::skip)] // causes test timeout
    fn is_a(self, ancestor: Self) -> bool {
        let mut current = Some(self);
        while let Some(kind) = current {
            if kind == ancestor {
                return true;
            }
            current = kind.parent();
        }
        false
    }
}

/// An error produced by a guarded operation.
pub trait Fault: std::error::Error + Send + Sync + 'static {
    /// The kind vocabulary of this fault.
    type Kind: FaultKind;

    /// The kind of this particular failure.
    fn kind(&self) -> Self::Kind;

    /// A wait requested by the failing dependency, such as an HTTP `Retry-After`.
    ///
    /// When present, the retry executor sleeps exactly this long before the next
    /// attempt instead of drawing a jittered backoff.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

/// A set of fault kinds, or the wildcard matching every kind.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(
    any(feature = "serde", test),
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum KindSet<K> {
    /// Matches any kind.
    All,
    /// Matches the listed kinds and their descendants.
    Only(Vec<K>),
}

impl<K: FaultKind> KindSet<K> {
    /// The wildcard set.
    #[must_use]
    pub const fn all() -> Self {
        Self::All
    }

    /// The empty set.
    #[must_use]
    pub const fn none() -> Self {
        Self::Only(Vec::new())
    }

    /// A set holding the given kinds.
    #[must_use]
    pub fn of(kinds: impl IntoIterator<Item = K>) -> Self {
        let mut set = Self::none();
        for kind in kinds {
            set.insert(kind);
        }
        set
    }

    /// Adds a kind. Adding to the wildcard is a no-op.
    pub fn insert(&mut self, kind: K) {
        if let Self::Only(kinds) = self
            && !kinds.contains(&kind)
        {
            kinds.push(kind);
        }
    }

    /// Returns `true` when `kind` or one of its ancestors is in the set.
    #[must_use]
    pub fn contains(&self, kind: K) -> bool {
        match self {
            Self::All => true,
            Self::Only(kinds) => kinds.iter().any(|member| kind.is_a(*member)),
        }
    }

    /// Returns `true` for the empty set.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Only(kinds) if kinds.is_empty())
    }
}

impl<K: FaultKind> Default for KindSet<K> {
    fn default() -> Self {
        Self::none()
    }
}

impl<K: FaultKind> FromIterator<K> for KindSet<K> {
    fn from_iter<I: IntoIterator<Item = K>>(iter: I) -> Self {
        Self::of(iter)
    }
}

/// Whether a failure may be retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verdict {
    /// Another attempt may succeed.
    Retryable,
    /// Retrying cannot help; the failure is returned immediately.
    NonRetryable,
}

/// Classifies a fault kind against a retry allow-list and a deny-list.
///
/// The deny-list always wins, including over the wildcard allow-list.
#[must_use]
pub fn classify<K: FaultKind>(kind: K, retryable: &KindSet<K>, never_retry: &KindSet<K>) -> Verdict {
    if never_retry.contains(kind) {
        return Verdict::NonRetryable;
    }

    if retryable.contains(kind) {
        Verdict::Retryable
    } else {
        Verdict::NonRetryable
    }
}
