// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Read access to previously submitted runs.

use crate::config::ProtocolVersion;
use crate::error::Result;
use crate::models::RunSubmission;
use crate::services::client::{Step, TrekkieClient};
use crate::services::session::Session;
use reqwest::Method;

/// Lists the runs visible to a session. Read-only and safe to retry.
#[derive(Clone)]
pub struct RunQueryClient {
    client: TrekkieClient,
}

impl RunQueryClient {
    pub fn new(client: TrekkieClient) -> Self {
        Self { client }
    }

    /// All runs owned by the session's user.
    pub async fn list_runs(&self, session: &Session) -> Result<Vec<RunSubmission>> {
        session.ensure_protocol(ProtocolVersion::V1, "list_runs")?;

        let request = self
            .client
            .request(Method::GET, Some(session), "/travel/submit/list");
        let runs: Vec<RunSubmission> = self.client.send_json(Step::ListRuns, request).await?;

        tracing::debug!(count = runs.len(), "Runs listed");
        Ok(runs)
    }
}
