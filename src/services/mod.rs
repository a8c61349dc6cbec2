// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - trekkie API workflow steps.

pub mod client;
pub mod correlate;
pub mod query;
pub mod session;
pub mod submitter;
pub mod workflow;

pub use client::{Step, TrekkieClient};
pub use correlate::CorrelationClient;
pub use query::RunQueryClient;
pub use session::{Session, SessionManager};
pub use submitter::RunSubmitter;
pub use workflow::{Workflow, WorkflowPlan, WorkflowReport};
