// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Run, vehicle leg and identifier models.

use crate::error::{Result, TrekkieError};
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use validator::{Validate, ValidationError};

/// Server-assigned identifier of an uploaded GPX file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GpxId(String);

/// Server-assigned identifier of a run (`trekkie_run`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RunId(String);

macro_rules! string_id {
    ($name:ident) => {
        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn is_empty(&self) -> bool {
                self.0.trim().is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }
    };
}

string_id!(GpxId);
string_id!(RunId);

/// One timed segment of a run on a specific transit line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_interval"))]
pub struct VehicleLeg {
    /// Boarding time (local, nanosecond precision)
    #[serde(with = "crate::time_utils::naive_nanos")]
    pub start: NaiveDateTime,
    /// Alighting time, never before `start`
    #[serde(with = "crate::time_utils::naive_nanos")]
    pub stop: NaiveDateTime,
    /// Transit line number
    pub line: u32,
    /// Run (trip) number on the line
    pub run: u32,
    /// Region code
    pub region: u32,
}

fn validate_interval(leg: &VehicleLeg) -> std::result::Result<(), ValidationError> {
    if leg.stop < leg.start {
        return Err(ValidationError::new("inverted_interval")
            .with_message("stop precedes start".into()));
    }
    Ok(())
}

/// A submitted run: its legs plus the identifiers binding them together.
///
/// Doubles as the v1 submission payload (`{gpx_id, vehicles}`) and as the
/// element type of the run listing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunSubmission {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trekkie_run: Option<RunId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpx_id: Option<GpxId>,
    #[serde(default)]
    pub vehicles: Vec<VehicleLeg>,
}

/// Metadata sent when creating a v2 run resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct RunMetadata {
    pub line: u32,
    pub run: u32,
    pub region: u32,
    /// Commit of the app build submitting the run
    #[validate(length(min = 1))]
    pub app_commit: String,
    /// Name of the submitting app
    #[validate(length(min = 1))]
    pub app_name: String,
}

/// Lifecycle of a v2 run as seen by the submitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Created,
    GpxAttached,
    LiveStreaming,
    Deleted,
}

/// Local progress of one v2 run.
///
/// The `ensure_*` checks run before a request is sent, the `record_*`
/// updates only after the server accepted it.
#[derive(Debug, Clone)]
pub struct RunProgress {
    state: RunState,
    gpx_attached: bool,
    last_ping: Option<DateTime<Utc>>,
    pings: usize,
}

impl Default for RunProgress {
    fn default() -> Self {
        Self {
            state: RunState::Created,
            gpx_attached: false,
            last_ping: None,
            pings: 0,
        }
    }
}

impl RunProgress {
    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn gpx_attached(&self) -> bool {
        self.gpx_attached
    }

    pub fn pings(&self) -> usize {
        self.pings
    }

    /// Fails once the run has been deleted.
    pub fn ensure_active(&self, run_id: &RunId) -> Result<()> {
        if self.state == RunState::Deleted {
            return Err(TrekkieError::NotFound(format!(
                "run {} has already been deleted",
                run_id
            )));
        }
        Ok(())
    }

    pub fn ensure_can_attach(&self, run_id: &RunId) -> Result<()> {
        self.ensure_active(run_id)?;
        if self.gpx_attached {
            return Err(TrekkieError::Validation(format!(
                "run {} already has a GPX track",
                run_id
            )));
        }
        Ok(())
    }

    pub fn ensure_can_push(&self, run_id: &RunId, at: DateTime<Utc>) -> Result<()> {
        self.ensure_active(run_id)?;
        if let Some(last) = self.last_ping {
            if at < last {
                return Err(TrekkieError::Validation(format!(
                    "live ping at {} for run {} precedes previous ping at {}",
                    at, run_id, last
                )));
            }
        }
        Ok(())
    }

    pub fn record_attach(&mut self) {
        self.gpx_attached = true;
        if self.state == RunState::Created {
            self.state = RunState::GpxAttached;
        }
    }

    pub fn record_ping(&mut self, at: DateTime<Utc>) {
        self.last_ping = Some(at);
        self.pings += 1;
        self.state = RunState::LiveStreaming;
    }

    pub fn record_delete(&mut self) {
        self.state = RunState::Deleted;
    }
}

/// Response of the v1 GPX upload.
#[derive(Debug, Deserialize)]
pub(crate) struct GpxUploadResponse {
    #[serde(default)]
    pub gpx_id: Option<GpxId>,
}

/// Response of the run creating endpoints.
#[derive(Debug, Deserialize)]
pub(crate) struct RunCreatedResponse {
    #[serde(default)]
    pub trekkie_run: Option<RunId>,
}
