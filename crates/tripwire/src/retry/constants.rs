// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

use std::time::Duration;

pub(super) const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub(super) const DEFAULT_WAIT_MIN: Duration = Duration::from_secs(1);
pub(super) const DEFAULT_WAIT_MAX: Duration = Duration::from_secs(60);
pub(super) const DEFAULT_MULTIPLIER: f64 = 1.0;
pub(super) const DEFAULT_EXP_BASE: f64 = 2.0;
pub(super) const DEFAULT_RERAISE_ORIGINAL: bool = true;

pub(super) const DEFAULT_EXECUTOR_NAME: &str = "retry";
