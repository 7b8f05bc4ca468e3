// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

#[cfg(any(feature = "serde", test))]
use crate::ConfigError;

/// Converts seconds to a duration, clamping negatives to zero and saturating on overflow.
pub(crate) fn secs_to_duration_saturating(secs: f64) -> Duration {
    if secs <= 0.0 {
        return Duration::ZERO;
    }

    Duration::try_from_secs_f64(secs).unwrap_or(Duration::MAX)
}

/// Parses a configured number of seconds.
#[cfg(any(feature = "serde", test))]
pub(crate) fn parse_seconds(field: &'static str, value: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(value).map_err(|_| ConfigError::Seconds { field, value })
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturating_conversion() {
        assert_eq!(secs_to_duration_saturating(-1.0), Duration::ZERO);
        assert_eq!(secs_to_duration_saturating(0.0), Duration::ZERO);
        assert_eq!(secs_to_duration_saturating(1.5), Duration::from_millis(1500));
        assert_eq!(secs_to_duration_saturating(f64::INFINITY), Duration::MAX);
        assert_eq!(secs_to_duration_saturating(f64::MAX), Duration::MAX);
    }

    #[test]
    fn parse_seconds_rejects_invalid_values() {
        assert_eq!(parse_seconds("ttl", 2.5), Ok(Duration::from_millis(2500)));
        assert!(matches!(parse_seconds("ttl", -1.0), Err(ConfigError::Seconds { field: "ttl", .. })));
        assert!(parse_seconds("ttl", f64::NAN).is_err());
    }
}
