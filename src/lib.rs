// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! trekkie-client: drive the trekkie run-tracking API
//!
//! This crate provides a typed async client for creating sessions,
//! uploading GPX tracks, submitting runs and streaming live positions to a
//! trekkie server, for both the v1 (GPX-first) and v2 (run-first) API.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;

pub use config::{Config, ProtocolVersion, V1StepOrder};
pub use error::{Result, TrekkieError};
pub use services::{
    CorrelationClient, RunQueryClient, RunSubmitter, Session, SessionManager, TrekkieClient,
    Workflow, WorkflowPlan, WorkflowReport,
};
