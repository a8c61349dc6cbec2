// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Server-side correlation of a finished run with received telegrams.

use crate::error::{Result, TrekkieError};
use crate::models::{CorrelateRequest, CorrelationReport, RunId};
use crate::services::client::{Step, TrekkieClient};
use crate::services::session::Session;
use reqwest::Method;

#[derive(Clone)]
pub struct CorrelationClient {
    client: TrekkieClient,
}

impl CorrelationClient {
    pub fn new(client: TrekkieClient) -> Self {
        Self { client }
    }

    /// Ask the server to correlate `run_id`. A run that is already correlated
    /// reports zero new locations.
    pub async fn correlate_run(
        &self,
        session: &Session,
        run_id: &RunId,
        corr_window: Option<i64>,
    ) -> Result<CorrelationReport> {
        if corr_window.is_some_and(|w| w <= 0) {
            return Err(TrekkieError::Validation(
                "correlation window must be positive".to_string(),
            ));
        }

        let body = CorrelateRequest {
            run_id: run_id.clone(),
            corr_window,
        };
        let request = self
            .client
            .request(Method::POST, Some(session), "/run/correlate")
            .json(&body);

        let report: CorrelationReport = self.client.send_json(Step::Correlate, request).await?;
        if !report.success {
            return Err(TrekkieError::Submission(format!(
                "server could not correlate run {}",
                run_id
            )));
        }

        tracing::info!(
            run_id = %run_id,
            new_locations = report.new_raw_transmission_locations,
            "Run correlated"
        );
        Ok(report)
    }
}
