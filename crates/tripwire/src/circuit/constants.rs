// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

pub(super) const DEFAULT_THRESHOLD: u32 = 5;
pub(super) const DEFAULT_TTL: Duration = Duration::from_secs(30);
pub(super) const DEFAULT_ENABLED: bool = true;

/// Upper bound on read/compare-and-swap rounds for a single state change.
pub(super) const MAX_CAS_ROUNDS: u32 = 32;
