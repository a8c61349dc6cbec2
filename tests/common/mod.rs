// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process mock trekkie server shared by the integration tests.

#![allow(dead_code)]

use axum::{
    extract::{Multipart, Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower_http::trace::TraceLayer;
use trekkie_client::models::{LivePing, RunMetadata, RunSubmission, VehicleLeg};
use trekkie_client::{Config, ProtocolVersion};

const SESSION_COOKIE: &str = "id";

/// Knobs for misbehaving servers.
#[derive(Debug, Clone, Default)]
pub struct MockOptions {
    /// gpx_id handed out for the first upload
    pub gpx_id: Option<String>,
    /// trekkie_run handed out for the first created run
    pub run_id: Option<String>,
    /// Delay before answering create-user
    pub create_delay: Option<Duration>,
    /// Do not set a session cookie on create-user
    pub omit_cookie: bool,
    /// Answer GPX uploads without a gpx_id
    pub omit_gpx_id: bool,
    /// Also set a `region` cookie on create-user
    pub region_cookie: bool,
    /// Answer a successful login by expiring the session cookie
    pub expire_cookie_on_login: bool,
}

#[derive(Debug, Default)]
struct V2Run {
    owner: String,
    metadata: Option<RunMetadata>,
    gpx_bytes: usize,
    pings: Vec<LivePing>,
    correlated: bool,
}

#[derive(Debug, Default)]
struct Inner {
    next_id: u64,
    /// user id -> password
    users: HashMap<String, String>,
    /// cookie token -> user id
    sessions: HashMap<String, String>,
    /// gpx id -> (owner, size)
    gpx: HashMap<String, (String, usize)>,
    /// v1 runs with their owner
    v1_runs: Vec<(String, RunSubmission)>,
    v2_runs: HashMap<String, V2Run>,
}

impl Inner {
    fn next(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{}-{}", prefix, self.next_id)
    }
}

/// Shared mock server state.
#[derive(Default)]
pub struct MockState {
    options: Mutex<MockOptions>,
    inner: Mutex<Inner>,
    requests: AtomicUsize,
}

impl MockState {
    /// Number of requests received so far.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Invalidate every issued session cookie.
    pub fn expire_sessions(&self) {
        self.inner.lock().unwrap().sessions.clear();
    }

    /// Drop all v2 runs, as if another client had deleted them.
    pub fn forget_runs(&self) {
        self.inner.lock().unwrap().v2_runs.clear();
    }

    pub fn user_count(&self) -> usize {
        self.inner.lock().unwrap().users.len()
    }

    pub fn v2_pings(&self, run_id: &str) -> Vec<LivePing> {
        self.inner
            .lock()
            .unwrap()
            .v2_runs
            .get(run_id)
            .map(|r| r.pings.clone())
            .unwrap_or_default()
    }

    pub fn v2_gpx_bytes(&self, run_id: &str) -> usize {
        self.inner
            .lock()
            .unwrap()
            .v2_runs
            .get(run_id)
            .map(|r| r.gpx_bytes)
            .unwrap_or_default()
    }

    pub fn v2_metadata(&self, run_id: &str) -> Option<RunMetadata> {
        self.inner
            .lock()
            .unwrap()
            .v2_runs
            .get(run_id)
            .and_then(|r| r.metadata.clone())
    }
}

/// A running mock server.
pub struct MockTrekkie {
    pub base_url: String,
    pub state: Arc<MockState>,
}

impl MockTrekkie {
    pub async fn start() -> Self {
        Self::start_with(MockOptions::default()).await
    }

    pub async fn start_with(options: MockOptions) -> Self {
        let state = Arc::new(MockState {
            options: Mutex::new(options),
            ..MockState::default()
        });

        let app = router(state.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");

        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("mock server");
        });

        Self {
            base_url: format!("http://{}", addr),
            state,
        }
    }

    /// Client config pointing at this server.
    pub fn config(&self, protocol: ProtocolVersion) -> Config {
        let mut config = Config::for_host(&self.base_url, protocol);
        config.timeout = Duration::from_secs(5);
        config
    }
}

fn router(state: Arc<MockState>) -> Router {
    let user_routes = Router::new()
        .route("/user/create", post(create_user))
        .route("/user/login", post(login));

    let v1 = Router::new()
        .route("/travel/submit/gpx", post(upload_gpx))
        .route("/travel/submit/run", post(submit_run))
        .route("/travel/submit/list", get(list_runs))
        .route("/run/correlate", post(correlate));

    let v2 = Router::new()
        .route("/v2/user", post(create_user))
        .route("/v2/user/login", post(login))
        .route("/v2/trekkie", post(create_run))
        .route("/v2/trekkie/{run_id}", delete(delete_run))
        .route("/v2/trekkie/{run_id}/gpx", post(attach_gpx))
        .route("/v2/trekkie/{run_id}/live", post(push_live))
        .route("/v2/run/correlate", post(correlate));

    Router::new()
        .merge(user_routes)
        .merge(v1)
        .merge(v2)
        .layer(middleware::from_fn_with_state(state.clone(), count_requests))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn count_requests(State(state): State<Arc<MockState>>, request: Request, next: Next) -> Response {
    state.requests.fetch_add(1, Ordering::SeqCst);
    next.run(request).await
}

fn authorize(state: &MockState, jar: &CookieJar) -> Result<String, StatusCode> {
    let token = jar
        .get(SESSION_COOKIE)
        .map(|c| c.value().to_string())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    state
        .inner
        .lock()
        .unwrap()
        .sessions
        .get(&token)
        .cloned()
        .ok_or(StatusCode::UNAUTHORIZED)
}

fn issue_session(inner: &mut Inner, jar: CookieJar, user_id: &str) -> CookieJar {
    let token = inner.next("token");
    inner.sessions.insert(token.clone(), user_id.to_string());
    let mut cookie = Cookie::new(SESSION_COOKIE, token);
    cookie.set_path("/");
    cookie.set_http_only(true);
    jar.add(cookie)
}

async fn read_upload(mut multipart: Multipart) -> Result<usize, StatusCode> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        if field.name() == Some("upload_file") {
            let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
            return Ok(data.len());
        }
    }
    Err(StatusCode::BAD_REQUEST)
}

// ─── Users ───────────────────────────────────────────────────

async fn create_user(State(state): State<Arc<MockState>>, jar: CookieJar) -> Response {
    let options = state.options.lock().unwrap().clone();
    if let Some(delay) = options.create_delay {
        tokio::time::sleep(delay).await;
    }

    let mut inner = state.inner.lock().unwrap();
    let user_id = inner.next("user");
    let password = format!("pw-{}", user_id);
    inner.users.insert(user_id.clone(), password.clone());

    let body = Json(json!({
        "success": true,
        "user_id": user_id,
        "password": password,
    }));

    if options.omit_cookie {
        return body.into_response();
    }

    let mut jar = issue_session(&mut inner, jar, &user_id);
    if options.region_cookie {
        jar = jar.add(Cookie::new("region", "dresden"));
    }
    (jar, body).into_response()
}

#[derive(Deserialize)]
struct LoginBody {
    user_id: String,
    password: String,
}

async fn login(
    State(state): State<Arc<MockState>>,
    jar: CookieJar,
    Json(body): Json<LoginBody>,
) -> Response {
    let expire_cookie = state.options.lock().unwrap().expire_cookie_on_login;
    let mut inner = state.inner.lock().unwrap();
    let Some(expected) = inner.users.get(&body.user_id).cloned() else {
        return StatusCode::BAD_REQUEST.into_response();
    };

    if expected != body.password {
        return Json(json!({ "success": false })).into_response();
    }

    let jar = if expire_cookie {
        let expired = Cookie::build((SESSION_COOKIE, "deleted"))
            .path("/")
            .max_age(time::Duration::ZERO);
        jar.add(expired)
    } else {
        issue_session(&mut inner, jar, &body.user_id)
    };
    (jar, Json(json!({ "success": true }))).into_response()
}

// ─── v1 ──────────────────────────────────────────────────────

async fn upload_gpx(
    State(state): State<Arc<MockState>>,
    jar: CookieJar,
    multipart: Multipart,
) -> Result<Response, StatusCode> {
    let owner = authorize(&state, &jar)?;
    let size = read_upload(multipart).await?;

    let mut options = state.options.lock().unwrap();
    if options.omit_gpx_id {
        return Ok(Json(json!({ "success": true })).into_response());
    }

    let mut inner = state.inner.lock().unwrap();
    let gpx_id = options.gpx_id.take().unwrap_or_else(|| inner.next("gpx"));
    inner.gpx.insert(gpx_id.clone(), (owner, size));

    Ok(Json(json!({ "success": true, "gpx_id": gpx_id })).into_response())
}

async fn submit_run(
    State(state): State<Arc<MockState>>,
    jar: CookieJar,
    Json(mut submission): Json<RunSubmission>,
) -> Result<Response, StatusCode> {
    let owner = authorize(&state, &jar)?;

    if submission.vehicles.iter().any(|leg: &VehicleLeg| leg.stop < leg.start) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut options = state.options.lock().unwrap();
    let mut inner = state.inner.lock().unwrap();
    if let Some(gpx_id) = &submission.gpx_id {
        if !inner.gpx.contains_key(gpx_id.as_str()) {
            return Err(StatusCode::BAD_REQUEST);
        }
    }

    let run_id = options.run_id.take().unwrap_or_else(|| inner.next("run"));
    submission.trekkie_run = Some(run_id.as_str().into());
    inner.v1_runs.push((owner, submission));

    Ok(Json(json!({ "trekkie_run": run_id })).into_response())
}

async fn list_runs(
    State(state): State<Arc<MockState>>,
    jar: CookieJar,
) -> Result<Json<Vec<RunSubmission>>, StatusCode> {
    let owner = authorize(&state, &jar)?;
    let inner = state.inner.lock().unwrap();
    let runs = inner
        .v1_runs
        .iter()
        .filter(|(o, _)| *o == owner)
        .map(|(_, run)| run.clone())
        .collect();
    Ok(Json(runs))
}

#[derive(Deserialize)]
struct CorrelateBody {
    run_id: String,
    corr_window: Option<i64>,
}

async fn correlate(
    State(state): State<Arc<MockState>>,
    jar: CookieJar,
    Json(body): Json<CorrelateBody>,
) -> Result<Response, StatusCode> {
    let owner = authorize(&state, &jar)?;
    if body.corr_window.is_some_and(|w| w <= 0) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let mut inner = state.inner.lock().unwrap();

    if let Some(run) = inner.v2_runs.get_mut(&body.run_id) {
        if run.owner != owner {
            return Err(StatusCode::FORBIDDEN);
        }
        let new = if run.correlated { 0 } else { run.pings.len() };
        run.correlated = true;
        return Ok(Json(json!({ "success": true, "new_raw_transmission_locations": new }))
            .into_response());
    }

    let legs = inner
        .v1_runs
        .iter()
        .find(|(_, r)| r.trekkie_run.as_ref().map(|id| id.as_str()) == Some(body.run_id.as_str()))
        .map(|(o, r)| (o.clone(), r.vehicles.len()));

    match legs {
        Some((o, _)) if o != owner => Err(StatusCode::FORBIDDEN),
        Some((_, count)) => Ok(Json(json!({
            "success": true,
            "new_raw_transmission_locations": count,
        }))
        .into_response()),
        None => Err(StatusCode::NOT_FOUND),
    }
}

// ─── v2 ──────────────────────────────────────────────────────

async fn create_run(
    State(state): State<Arc<MockState>>,
    jar: CookieJar,
    Json(metadata): Json<RunMetadata>,
) -> Result<Response, StatusCode> {
    let owner = authorize(&state, &jar)?;

    let mut options = state.options.lock().unwrap();
    let mut inner = state.inner.lock().unwrap();
    let run_id = options.run_id.take().unwrap_or_else(|| inner.next("run"));
    inner.v2_runs.insert(
        run_id.clone(),
        V2Run {
            owner,
            metadata: Some(metadata),
            ..V2Run::default()
        },
    );

    Ok(Json(json!({ "trekkie_run": run_id })).into_response())
}

fn owned_run<'a>(inner: &'a mut Inner, run_id: &str, owner: &str) -> Result<&'a mut V2Run, StatusCode> {
    let run = inner.v2_runs.get_mut(run_id).ok_or(StatusCode::NOT_FOUND)?;
    if run.owner != owner {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(run)
}

async fn attach_gpx(
    State(state): State<Arc<MockState>>,
    jar: CookieJar,
    Path(run_id): Path<String>,
    multipart: Multipart,
) -> Result<StatusCode, StatusCode> {
    let owner = authorize(&state, &jar)?;
    // Check existence before consuming the body.
    owned_run(&mut state.inner.lock().unwrap(), &run_id, &owner)?;

    let size = read_upload(multipart).await?;
    let mut inner = state.inner.lock().unwrap();
    owned_run(&mut inner, &run_id, &owner)?.gpx_bytes = size;
    Ok(StatusCode::OK)
}

async fn push_live(
    State(state): State<Arc<MockState>>,
    jar: CookieJar,
    Path(run_id): Path<String>,
    Json(ping): Json<LivePing>,
) -> Result<StatusCode, StatusCode> {
    let owner = authorize(&state, &jar)?;
    let mut inner = state.inner.lock().unwrap();
    owned_run(&mut inner, &run_id, &owner)?.pings.push(ping);
    Ok(StatusCode::OK)
}

async fn delete_run(
    State(state): State<Arc<MockState>>,
    jar: CookieJar,
    Path(run_id): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let owner = authorize(&state, &jar)?;
    let mut inner = state.inner.lock().unwrap();
    owned_run(&mut inner, &run_id, &owner)?;
    inner.v2_runs.remove(&run_id);
    Ok(StatusCode::NO_CONTENT)
}

// ─── Fixtures ────────────────────────────────────────────────

pub const SAMPLE_GPX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<gpx version="1.1" creator="trekkie-tests" xmlns="http://www.topografix.com/GPX/1/1">
  <trk><trkseg>
    <trkpt lat="51.0504" lon="13.7373"><time>2022-09-10T14:46:30Z</time></trkpt>
    <trkpt lat="51.0510" lon="13.7400"><time>2022-09-10T14:47:30Z</time></trkpt>
  </trkseg></trk>
</gpx>
"#;

/// Write a small GPX track named `test.gpx` into a fresh temp dir.
pub fn write_gpx() -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("test.gpx");
    let mut file = std::fs::File::create(&path).expect("create gpx");
    file.write_all(SAMPLE_GPX.as_bytes()).expect("write gpx");
    (dir, path)
}
