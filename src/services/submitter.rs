// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Ordered run submission for both protocol generations.
//!
//! v1 uploads the GPX file first and threads its `gpx_id` into the run
//! submission. v2 creates the run resource first and attaches GPX data and
//! live pings to it by run id. No step is retried here.

use crate::config::ProtocolVersion;
use crate::error::{Result, TrekkieError};
use crate::models::run::{GpxUploadResponse, RunCreatedResponse};
use crate::models::{
    GpxId, LivePing, RunId, RunMetadata, RunProgress, RunState, RunSubmission, VehicleLeg,
};
use crate::services::client::{Step, TrekkieClient};
use crate::services::session::Session;
use reqwest::multipart::{Form, Part};
use reqwest::Method;
use std::collections::HashMap;
use std::path::Path;
use validator::Validate;

const GPX_FIELD: &str = "upload_file";
const GPX_MIME: &str = "application/gpx+xml";

/// Drives the multi-step submission of runs.
pub struct RunSubmitter {
    client: TrekkieClient,
    /// v2 runs created by this submitter. Deleted runs stay as tombstones
    /// so `run_state` still reports them, until `prune_deleted`.
    runs: HashMap<RunId, RunProgress>,
}

impl RunSubmitter {
    pub fn new(client: TrekkieClient) -> Self {
        Self {
            client,
            runs: HashMap::new(),
        }
    }

    /// Local state of a v2 run created by this submitter.
    pub fn run_state(&self, run_id: &RunId) -> Option<RunState> {
        self.runs.get(run_id).map(RunProgress::state)
    }

    pub fn progress(&self, run_id: &RunId) -> Option<&RunProgress> {
        self.runs.get(run_id)
    }

    /// Forget deleted runs and return how many were dropped.
    ///
    /// Later calls for a pruned id still fail with `NotFound`, as for any id
    /// this submitter never created.
    pub fn prune_deleted(&mut self) -> usize {
        let before = self.runs.len();
        self.runs
            .retain(|_, progress| progress.state() != RunState::Deleted);
        before - self.runs.len()
    }

    // ─── v1 ──────────────────────────────────────────────────────────────────

    /// Upload a GPX track and return the id the server assigned to it.
    pub async fn submit_gpx(&self, session: &Session, gpx_file: impl AsRef<Path>) -> Result<GpxId> {
        session.ensure_protocol(ProtocolVersion::V1, "submit_gpx")?;
        let step = Step::UploadGpx;

        let form = gpx_form(gpx_file.as_ref()).await?;
        let request = self
            .client
            .request(Method::POST, Some(session), "/travel/submit/gpx")
            .multipart(form);

        let body: GpxUploadResponse = self.client.send_json(step, request).await?;
        let gpx_id = body
            .gpx_id
            .filter(|id| !id.is_empty())
            .ok_or_else(|| TrekkieError::Upload("response carried no gpx_id".to_string()))?;

        tracing::info!(gpx_id = %gpx_id, "GPX file uploaded");
        Ok(gpx_id)
    }

    /// Submit the legs of a run bound to a previously uploaded GPX file.
    ///
    /// All legs are validated before anything is sent.
    pub async fn submit_run(
        &self,
        session: &Session,
        gpx_id: &GpxId,
        legs: &[VehicleLeg],
    ) -> Result<RunId> {
        self.post_run(session, Some(gpx_id.clone()), legs).await
    }

    /// Submit the legs of a run before its GPX file is uploaded.
    ///
    /// v1 has no call to bind a GPX file to an existing run, so a track
    /// uploaded afterwards stays unlinked.
    pub async fn submit_run_unbound(&self, session: &Session, legs: &[VehicleLeg]) -> Result<RunId> {
        self.post_run(session, None, legs).await
    }

    async fn post_run(
        &self,
        session: &Session,
        gpx_id: Option<GpxId>,
        legs: &[VehicleLeg],
    ) -> Result<RunId> {
        session.ensure_protocol(ProtocolVersion::V1, "submit_run")?;
        validate_legs(legs)?;

        let payload = RunSubmission {
            trekkie_run: None,
            gpx_id,
            vehicles: legs.to_vec(),
        };
        let request = self
            .client
            .request(Method::POST, Some(session), "/travel/submit/run")
            .json(&payload);

        let body: RunCreatedResponse = self.client.send_json(Step::SubmitRun, request).await?;
        let run_id = created_run_id(body, Step::SubmitRun)?;

        tracing::info!(
            run_id = %run_id,
            gpx_id = ?payload.gpx_id.as_ref().map(GpxId::as_str),
            legs = legs.len(),
            "Run submitted"
        );
        Ok(run_id)
    }

    // ─── v2 ──────────────────────────────────────────────────────────────────

    /// Create a run resource; its id is required by every later v2 call.
    pub async fn create_run(&mut self, session: &Session, metadata: &RunMetadata) -> Result<RunId> {
        session.ensure_protocol(ProtocolVersion::V2, "create_run")?;
        metadata.validate()?;

        let request = self
            .client
            .request(Method::POST, Some(session), "/trekkie")
            .json(metadata);

        let body: RunCreatedResponse = self.client.send_json(Step::CreateRun, request).await?;
        let run_id = created_run_id(body, Step::CreateRun)?;

        self.runs.insert(run_id.clone(), RunProgress::default());
        tracing::info!(
            run_id = %run_id,
            line = metadata.line,
            run = metadata.run,
            "Run created"
        );
        Ok(run_id)
    }

    /// Upload the GPX track of an existing run.
    pub async fn attach_gpx(
        &mut self,
        session: &Session,
        run_id: &RunId,
        gpx_file: impl AsRef<Path>,
    ) -> Result<()> {
        session.ensure_protocol(ProtocolVersion::V2, "attach_gpx")?;
        self.tracked(run_id)?.ensure_can_attach(run_id)?;

        let form = gpx_form(gpx_file.as_ref()).await?;
        let path = format!("/trekkie/{}/gpx", urlencoding::encode(run_id.as_str()));
        let request = self
            .client
            .request(Method::POST, Some(session), &path)
            .multipart(form);

        self.client.send(Step::AttachGpx, request).await?;
        self.tracked_mut(run_id)?.record_attach();

        tracing::info!(run_id = %run_id, "GPX file attached");
        Ok(())
    }

    /// Append a live coordinate; pings of one run must be chronological.
    pub async fn push_live(&mut self, session: &Session, run_id: &RunId, ping: &LivePing) -> Result<()> {
        session.ensure_protocol(ProtocolVersion::V2, "push_live")?;
        self.tracked(run_id)?.ensure_can_push(run_id, ping.timestamp)?;
        ping.validate()?;

        let path = format!("/trekkie/{}/live", urlencoding::encode(run_id.as_str()));
        let request = self
            .client
            .request(Method::POST, Some(session), &path)
            .json(ping);

        self.client.send(Step::PushLive, request).await?;
        self.tracked_mut(run_id)?.record_ping(ping.timestamp);

        tracing::debug!(run_id = %run_id, lat = ping.lat, lon = ping.lon, "Live ping sent");
        Ok(())
    }

    /// Finalize a run. Terminal: later calls for this run fail with `NotFound`.
    pub async fn delete_run(&mut self, session: &Session, run_id: &RunId) -> Result<()> {
        session.ensure_protocol(ProtocolVersion::V2, "delete_run")?;
        self.tracked(run_id)?.ensure_active(run_id)?;

        let path = format!("/trekkie/{}", urlencoding::encode(run_id.as_str()));
        let request = self.client.request(Method::DELETE, Some(session), &path);

        self.client.send(Step::DeleteRun, request).await?;
        self.tracked_mut(run_id)?.record_delete();

        tracing::info!(run_id = %run_id, "Run deleted");
        Ok(())
    }

    fn tracked(&self, run_id: &RunId) -> Result<&RunProgress> {
        self.runs.get(run_id).ok_or_else(|| unknown_run(run_id))
    }

    fn tracked_mut(&mut self, run_id: &RunId) -> Result<&mut RunProgress> {
        self.runs.get_mut(run_id).ok_or_else(|| unknown_run(run_id))
    }
}

fn unknown_run(run_id: &RunId) -> TrekkieError {
    TrekkieError::NotFound(format!("run {} was never created by this client", run_id))
}

fn created_run_id(body: RunCreatedResponse, step: Step) -> Result<RunId> {
    body.trekkie_run
        .filter(|id| !id.is_empty())
        .ok_or_else(|| step.rejected("response carried no trekkie_run".to_string()))
}

fn validate_legs(legs: &[VehicleLeg]) -> Result<()> {
    if legs.is_empty() {
        return Err(TrekkieError::Validation(
            "a run needs at least one vehicle leg".to_string(),
        ));
    }

    for (index, leg) in legs.iter().enumerate() {
        leg.validate()
            .map_err(|e| TrekkieError::Validation(format!("leg {}: {}", index, e)))?;
    }
    Ok(())
}

/// Read the whole track and build the multipart form.
///
/// The file is closed again before the request is sent.
async fn gpx_form(path: &Path) -> Result<Form> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| TrekkieError::Upload(format!("cannot read {}: {}", path.display(), e)))?;

    if bytes.is_empty() {
        return Err(TrekkieError::Upload(format!(
            "{} is empty",
            path.display()
        )));
    }

    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("track.gpx")
        .to_string();

    let part = Part::bytes(bytes)
        .file_name(file_name)
        .mime_str(GPX_MIME)
        .map_err(|e| TrekkieError::Upload(e.to_string()))?;

    Ok(Form::new().part(GPX_FIELD, part))
}
