// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models exchanged with the trekkie API.

pub mod correlate;
pub mod live;
pub mod run;
pub mod user;

pub use correlate::{CorrelateRequest, CorrelationReport};
pub use live::LivePing;
pub use run::{GpxId, RunId, RunMetadata, RunProgress, RunState, RunSubmission, VehicleLeg};
pub use user::{LoginResponse, UserAccount};
