// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Low-level trekkie API client.
//!
//! Handles:
//! - URL construction per protocol generation
//! - Session cookie propagation
//! - Per-request timeout
//! - Mapping HTTP status codes to the error of the failing step

use crate::config::{Config, ProtocolVersion};
use crate::error::{Result, TrekkieError};
use crate::services::session::Session;
use anyhow::Context;
use cookie::Cookie;
use reqwest::header::{HeaderMap, COOKIE, SET_COOKIE};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use time::OffsetDateTime;

/// One request of the submission workflow, used to classify its failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    CreateUser,
    Login,
    UploadGpx,
    SubmitRun,
    CreateRun,
    AttachGpx,
    PushLive,
    DeleteRun,
    ListRuns,
    Correlate,
}

impl Step {
    pub fn describe(self) -> &'static str {
        match self {
            Step::CreateUser => "create a user",
            Step::Login => "log in",
            Step::UploadGpx => "upload a GPX file",
            Step::SubmitRun => "submit a run",
            Step::CreateRun => "create a run",
            Step::AttachGpx => "attach a GPX file",
            Step::PushLive => "push a live ping",
            Step::DeleteRun => "delete a run",
            Step::ListRuns => "list runs",
            Step::Correlate => "correlate a run",
        }
    }

    /// Steps addressing an existing run, where 404 means an unknown run id.
    fn is_run_bound(self) -> bool {
        matches!(
            self,
            Step::AttachGpx | Step::PushLive | Step::DeleteRun | Step::Correlate
        )
    }

    /// Error for a request the server refused or answered unusably.
    pub(crate) fn rejected(self, detail: String) -> TrekkieError {
        match self {
            Step::CreateUser | Step::Login => TrekkieError::Auth(detail),
            Step::UploadGpx | Step::AttachGpx => TrekkieError::Upload(detail),
            Step::SubmitRun
            | Step::CreateRun
            | Step::PushLive
            | Step::DeleteRun
            | Step::Correlate => TrekkieError::Submission(detail),
            Step::ListRuns => TrekkieError::Internal(anyhow::anyhow!(detail)),
        }
    }
}

/// trekkie API client.
#[derive(Clone)]
pub struct TrekkieClient {
    http: reqwest::Client,
    base_url: String,
    protocol: ProtocolVersion,
    timeout: Duration,
}

impl TrekkieClient {
    /// Create a client for the configured host and protocol.
    pub fn new(config: &Config) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .connection_verbose(config.verbose_logging)
            .build()
            .context("failed building trekkie HTTP client")?;

        Ok(Self {
            http,
            base_url: config.host.trim_end_matches('/').to_string(),
            protocol: config.protocol_version,
            timeout: config.timeout,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Build a request against `path` below the protocol prefix.
    ///
    /// With a session, its host and protocol win over the client's and its
    /// cookie is attached.
    pub(crate) fn request(
        &self,
        method: Method,
        session: Option<&Session>,
        path: &str,
    ) -> RequestBuilder {
        let (host, protocol) = match session {
            Some(s) => (s.host(), s.protocol_version()),
            None => (self.base_url.as_str(), self.protocol),
        };
        let url = format!("{}{}{}", host, protocol.prefix(), path);

        let builder = self.http.request(method, url);
        match session.and_then(Session::cookie) {
            Some(cookie) => builder.header(COOKIE, cookie),
            None => builder,
        }
    }

    /// Send a request and require a successful status.
    pub(crate) async fn send(&self, step: Step, request: RequestBuilder) -> Result<Response> {
        let response = request
            .send()
            .await
            .map_err(|e| self.transport_error(step, e))?;

        tracing::debug!(
            step = step.describe(),
            status = %response.status(),
            "trekkie response"
        );

        self.check_response(step, response).await
    }

    /// Send a request and parse the JSON body of the successful response.
    pub(crate) async fn send_json<T: for<'de> Deserialize<'de>>(
        &self,
        step: Step,
        request: RequestBuilder,
    ) -> Result<T> {
        let response = self.send(step, request).await?;
        self.read_json(step, response).await
    }

    /// Parse a JSON body, classifying failures by step.
    pub(crate) async fn read_json<T: for<'de> Deserialize<'de>>(
        &self,
        step: Step,
        response: Response,
    ) -> Result<T> {
        response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.timeout_error(step)
            } else {
                step.rejected(format!("JSON parse error: {}", e))
            }
        })
    }

    /// Read a body that may legitimately be empty; empty or non-JSON yields `Null`.
    pub(crate) async fn read_json_lenient(
        &self,
        step: Step,
        response: Response,
    ) -> Result<serde_json::Value> {
        let text = response
            .text()
            .await
            .map_err(|e| self.transport_error(step, e))?;

        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }

        Ok(serde_json::from_str(&text).unwrap_or_else(|e| {
            tracing::warn!(step = step.describe(), error = %e, "Response body is not JSON");
            serde_json::Value::Null
        }))
    }

    /// Check response status and return error if not successful.
    async fn check_response(&self, step: Step, response: Response) -> Result<Response> {
        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = format!("HTTP {}: {}", status, body);

        tracing::warn!(step = step.describe(), status = %status, "trekkie rejected request");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(TrekkieError::Auth(detail));
        }

        if status == StatusCode::NOT_FOUND && step.is_run_bound() {
            return Err(TrekkieError::NotFound(detail));
        }

        Err(step.rejected(detail))
    }

    fn transport_error(&self, step: Step, err: reqwest::Error) -> TrekkieError {
        if err.is_timeout() {
            return self.timeout_error(step);
        }
        step.rejected(format!("request failed: {}", err))
    }

    fn timeout_error(&self, step: Step) -> TrekkieError {
        tracing::warn!(step = step.describe(), timeout = ?self.timeout, "trekkie request timed out");
        TrekkieError::Timeout {
            step: step.describe(),
            timeout: self.timeout,
        }
    }
}

/// Cookie changes carried by the `Set-Cookie` headers of one response.
#[derive(Debug, Default, PartialEq)]
pub(crate) struct CookieUpdate {
    /// Live cookies, as `(name, value)`
    pub set: Vec<(String, String)>,
    /// Names of cookies the server cleared or expired
    pub removed: Vec<String>,
}

/// Parse every `Set-Cookie` header of a response.
///
/// A cookie with an empty value, a non-positive `Max-Age` or an `Expires`
/// in the past is a removal. `Max-Age` wins over `Expires`.
pub(crate) fn cookie_update(headers: &HeaderMap) -> CookieUpdate {
    let now = OffsetDateTime::now_utc();
    let mut update = CookieUpdate::default();

    for raw in headers.get_all(SET_COOKIE).iter().filter_map(|v| v.to_str().ok()) {
        let cookie = match Cookie::parse(raw) {
            Ok(cookie) => cookie,
            Err(e) => {
                tracing::warn!(error = %e, "Ignoring malformed Set-Cookie header");
                continue;
            }
        };

        let expired = match cookie.max_age() {
            Some(age) => age <= time::Duration::ZERO,
            None => cookie.expires_datetime().is_some_and(|at| at <= now),
        };

        if expired || cookie.value().is_empty() {
            update.removed.push(cookie.name().to_string());
        } else {
            update
                .set
                .push((cookie.name().to_string(), cookie.value().to_string()));
        }
    }

    update
}
