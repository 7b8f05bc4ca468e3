// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

/// A failure reading or writing circuit state.
///
/// Opaque over the underlying cause. Use [`std::error::Error::source()`] to
/// reach the backend error.
///
/// # Example
///
/// ```
/// use tripwire::StoreError;
///
/// let error = StoreError::from_cause("connection reset");
/// assert!(error.to_string().contains("connection reset"));
/// ```
#[ohno::error]
pub struct StoreError {}

impl StoreError {
    /// Wraps a backend failure.
    pub fn from_cause(cause: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::caused_by(cause)
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_contains_cause() {
        let error = StoreError::from_cause("redis timed out");
        assert!(format!("{error}").contains("redis timed out"));
        assert!(format!("{error:?}").contains("redis timed out"));
    }

    #[test]
    fn wraps_typed_errors() {
        let io = std::io::Error::other("disk gone");
        let error = StoreError::from_cause(io);
        assert!(error.to_string().contains("disk gone"));
    }
}
