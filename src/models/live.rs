// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Live position updates for an in-progress v2 run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

/// A single timestamped coordinate appended to a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_finite"))]
pub struct LivePing {
    #[serde(with = "crate::time_utils::utc_rfc3339")]
    pub timestamp: DateTime<Utc>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub lat: f64,
    #[validate(range(min = -180.0, max = 180.0))]
    pub lon: f64,
}

impl LivePing {
    pub fn new(timestamp: DateTime<Utc>, lat: f64, lon: f64) -> Self {
        Self { timestamp, lat, lon }
    }
}

// NaN slips through range checks and serializes as `null`.
fn validate_finite(ping: &LivePing) -> std::result::Result<(), ValidationError> {
    if !ping.lat.is_finite() || !ping.lon.is_finite() {
        return Err(ValidationError::new("non_finite_coordinate")
            .with_message("coordinates must be finite numbers".into()));
    }
    Ok(())
}
