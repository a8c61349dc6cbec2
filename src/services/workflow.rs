// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! End-to-end submission workflow, parameterized by protocol and host.
//!
//! Every step awaits the previous one; the first failure aborts the
//! workflow and leaves whatever the server already created untouched.

use crate::config::{Config, ProtocolVersion, V1StepOrder};
use crate::error::{Result, TrekkieError};
use crate::models::{GpxId, LivePing, RunId, RunMetadata, RunState, RunSubmission, VehicleLeg};
use crate::services::{RunQueryClient, RunSubmitter, Session, SessionManager, TrekkieClient};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// What to submit in one workflow pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowPlan {
    /// Vehicle legs (v1)
    #[serde(default)]
    pub legs: Vec<VehicleLeg>,
    /// Run metadata (v2)
    pub metadata: Option<RunMetadata>,
    /// Live pings pushed in order after the run is created (v2)
    #[serde(default)]
    pub pings: Vec<LivePing>,
    /// Replay the create-user body against the login endpoint
    #[serde(default)]
    pub login: bool,
    /// Delete the run at the end (v2)
    #[serde(default)]
    pub delete_after: bool,
}

impl WorkflowPlan {
    /// The payloads the original probe scripts submitted.
    pub fn sample() -> Self {
        Self {
            legs: vec![
                VehicleLeg {
                    start: naive(2022, 9, 10, 14, 46, 30, 290_072_949),
                    stop: naive(2022, 9, 10, 15, 16, 25, 754_147_203),
                    line: 63,
                    run: 8,
                    region: 0,
                },
                VehicleLeg {
                    start: naive(2022, 9, 10, 15, 22, 30, 290_072_949),
                    stop: naive(2022, 9, 10, 15, 29, 25, 754_147_203),
                    line: 7,
                    run: 27,
                    region: 0,
                },
            ],
            metadata: Some(RunMetadata {
                line: 63,
                run: 8,
                region: 0,
                app_commit: "EEEEE".to_string(),
                app_name: "test".to_string(),
            }),
            pings: vec![LivePing::new(
                DateTime::<Utc>::from_naive_utc_and_offset(naive(2023, 7, 21, 14, 34, 5, 0), Utc),
                0.0,
                0.0,
            )],
            login: false,
            delete_after: false,
        }
    }
}

fn naive(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32, nanos: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(y, mo, d)
        .and_then(|date| date.and_hms_nano_opt(h, mi, s, nanos))
        .unwrap_or_default()
}

/// Identifiers and results gathered by a completed workflow.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowReport {
    pub host: String,
    pub protocol: ProtocolVersion,
    pub user_id: Option<String>,
    pub gpx_id: Option<GpxId>,
    /// Whether the run submission references `gpx_id` (v1)
    pub gpx_bound: bool,
    pub run_id: RunId,
    /// Final local state of the run (v2)
    pub run_state: Option<RunState>,
    pub pings_sent: usize,
    /// Runs listed after submission (v1)
    pub runs: Option<Vec<RunSubmission>>,
}

/// Single configurable driver for both protocol generations.
pub struct Workflow {
    config: Config,
    sessions: SessionManager,
    submitter: RunSubmitter,
    query: RunQueryClient,
}

impl Workflow {
    pub fn new(config: Config) -> Result<Self> {
        let client = TrekkieClient::new(&config)?;
        Ok(Self {
            sessions: SessionManager::new(client.clone()),
            submitter: RunSubmitter::new(client.clone()),
            query: RunQueryClient::new(client),
            config,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run one pass of the configured protocol.
    pub async fn run(&mut self, plan: &WorkflowPlan, gpx_file: Option<&Path>) -> Result<WorkflowReport> {
        tracing::info!(
            host = %self.config.host,
            protocol = %self.config.protocol_version,
            "Starting workflow"
        );

        let mut session = self.sessions.create_session().await?;
        if plan.login {
            let prior = session.creation_body().clone();
            session = self.sessions.login(session, &prior).await?;
        }

        match self.config.protocol_version {
            ProtocolVersion::V1 => self.run_v1(&session, plan, gpx_file).await,
            ProtocolVersion::V2 => self.run_v2(&session, plan, gpx_file).await,
        }
    }

    async fn run_v1(
        &mut self,
        session: &Session,
        plan: &WorkflowPlan,
        gpx_file: Option<&Path>,
    ) -> Result<WorkflowReport> {
        let gpx_file = gpx_file.ok_or_else(|| {
            TrekkieError::Validation("the v1 protocol requires a GPX file".to_string())
        })?;

        let (gpx_id, run_id, gpx_bound) = match self.config.v1_order {
            V1StepOrder::GpxFirst => {
                let gpx_id = self.submitter.submit_gpx(session, gpx_file).await?;
                let run_id = self.submitter.submit_run(session, &gpx_id, &plan.legs).await?;
                (gpx_id, run_id, true)
            }
            V1StepOrder::RunFirst => {
                let run_id = self.submitter.submit_run_unbound(session, &plan.legs).await?;
                let gpx_id = self.submitter.submit_gpx(session, gpx_file).await?;
                tracing::warn!(
                    run_id = %run_id,
                    gpx_id = %gpx_id,
                    "v1 run-first order leaves the GPX file unlinked from the run"
                );
                (gpx_id, run_id, false)
            }
        };

        let runs = self.query.list_runs(session).await?;

        Ok(WorkflowReport {
            host: session.host().to_string(),
            protocol: ProtocolVersion::V1,
            user_id: session.user_id().map(str::to_string),
            gpx_id: Some(gpx_id),
            gpx_bound,
            run_id,
            run_state: None,
            pings_sent: 0,
            runs: Some(runs),
        })
    }

    async fn run_v2(
        &mut self,
        session: &Session,
        plan: &WorkflowPlan,
        gpx_file: Option<&Path>,
    ) -> Result<WorkflowReport> {
        let metadata = plan.metadata.as_ref().ok_or_else(|| {
            TrekkieError::Validation("the v2 protocol requires run metadata".to_string())
        })?;

        let run_id = self.submitter.create_run(session, metadata).await?;

        if let Some(gpx_file) = gpx_file {
            self.submitter.attach_gpx(session, &run_id, gpx_file).await?;
        }

        for ping in &plan.pings {
            self.submitter.push_live(session, &run_id, ping).await?;
        }

        if plan.delete_after {
            self.submitter.delete_run(session, &run_id).await?;
        }

        let progress = self.submitter.progress(&run_id);
        Ok(WorkflowReport {
            host: session.host().to_string(),
            protocol: ProtocolVersion::V2,
            user_id: session.user_id().map(str::to_string),
            gpx_id: None,
            gpx_bound: false,
            run_state: progress.map(|p| p.state()),
            pings_sent: progress.map(|p| p.pings()).unwrap_or_default(),
            run_id,
            runs: None,
        })
    }
}
