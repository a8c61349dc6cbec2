// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Session establishment against a trekkie host.

use crate::config::ProtocolVersion;
use crate::error::{Result, TrekkieError};
use crate::models::{LoginResponse, UserAccount};
use crate::services::client::{cookie_update, CookieUpdate, Step, TrekkieClient};
use reqwest::Method;
use std::collections::BTreeMap;
use std::fmt;

/// Authenticated context held for the lifetime of one workflow.
#[derive(Clone)]
pub struct Session {
    host: String,
    protocol_version: ProtocolVersion,
    /// Live cookies captured from the server, by name
    cookies: BTreeMap<String, String>,
    /// `Cookie` header value built from `cookies`
    cookie: Option<String>,
    account: UserAccount,
    /// Raw create-user body, replayed by login
    creation: serde_json::Value,
}

impl Session {
    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref()
    }

    pub fn account(&self) -> &UserAccount {
        &self.account
    }

    pub fn user_id(&self) -> Option<&str> {
        self.account.user_id.as_deref()
    }

    /// Body of the create-user response this session was built from.
    pub fn creation_body(&self) -> &serde_json::Value {
        &self.creation
    }

    /// Merge a response's cookie changes into the held ones, by name.
    fn apply_cookies(&mut self, update: CookieUpdate) {
        for name in &update.removed {
            self.cookies.remove(name);
        }
        self.cookies.extend(update.set);

        self.cookie = if self.cookies.is_empty() {
            None
        } else {
            Some(
                self.cookies
                    .iter()
                    .map(|(name, value)| format!("{}={}", name, value))
                    .collect::<Vec<_>>()
                    .join("; "),
            )
        };
    }

    pub(crate) fn ensure_protocol(&self, expected: ProtocolVersion, operation: &str) -> Result<()> {
        if self.protocol_version != expected {
            return Err(TrekkieError::Validation(format!(
                "{} is a {} operation but the session speaks {}",
                operation, expected, self.protocol_version
            )));
        }
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("host", &self.host)
            .field("protocol_version", &self.protocol_version)
            .field("cookie", &self.cookie.as_ref().map(|_| "<redacted>"))
            .field("user_id", &self.account.user_id)
            .finish()
    }
}

/// Creates sessions and replays logins.
#[derive(Clone)]
pub struct SessionManager {
    client: TrekkieClient,
}

impl SessionManager {
    pub fn new(client: TrekkieClient) -> Self {
        Self { client }
    }

    /// Create a new user on the server and capture its credential.
    ///
    /// Not idempotent: every call creates a distinct user.
    pub async fn create_session(&self) -> Result<Session> {
        let step = Step::CreateUser;
        let protocol_version = self.client.protocol();
        let path = match protocol_version {
            ProtocolVersion::V1 => "/user/create",
            ProtocolVersion::V2 => "/user",
        };

        let response = self
            .client
            .send(step, self.client.request(Method::POST, None, path))
            .await?;

        let cookies = cookie_update(response.headers());
        let creation = self.client.read_json_lenient(step, response).await?;
        let account: UserAccount = serde_json::from_value(creation.clone()).unwrap_or_default();

        if account.success == Some(false) {
            return Err(TrekkieError::Auth(
                "server reported an unsuccessful user creation".to_string(),
            ));
        }

        let mut session = Session {
            host: self.client.base_url().to_string(),
            protocol_version,
            cookies: BTreeMap::new(),
            cookie: None,
            account,
            creation,
        };
        session.apply_cookies(cookies);

        match protocol_version {
            ProtocolVersion::V1 if session.cookie.is_none() => {
                return Err(TrekkieError::Auth(
                    "create-user response carried no session cookie".to_string(),
                ));
            }
            ProtocolVersion::V2 if session.cookie.is_none() && session.user_id().is_none() => {
                return Err(TrekkieError::Auth(
                    "create-user response carried neither a cookie nor a user id".to_string(),
                ));
            }
            _ => {}
        }

        tracing::info!(
            host = %self.client.base_url(),
            protocol = %protocol_version,
            user_id = ?session.user_id(),
            "Session created"
        );

        Ok(session)
    }

    /// Re-assert the session identity by replaying a prior create-user body.
    ///
    /// Cookies set by the login response are merged into the held ones by
    /// name; cookies it clears or expires are dropped.
    pub async fn login(&self, mut session: Session, prior_body: &serde_json::Value) -> Result<Session> {
        let step = Step::Login;
        let request = self
            .client
            .request(Method::POST, Some(&session), "/user/login")
            .json(prior_body);

        let response = self.client.send(step, request).await?;
        let cookies = cookie_update(response.headers());
        let body: LoginResponse = self.client.read_json(step, response).await?;

        if !body.success {
            return Err(TrekkieError::Auth(
                "server rejected the login replay".to_string(),
            ));
        }

        if !cookies.set.is_empty() || !cookies.removed.is_empty() {
            tracing::debug!(
                set = cookies.set.len(),
                removed = cookies.removed.len(),
                "Session cookies updated by login"
            );
            session.apply_cookies(cookies);
            if session.cookie.is_none() {
                tracing::warn!("Login cleared every session cookie");
            }
        }

        tracing::info!(user_id = ?session.user_id(), "Session login replayed");
        Ok(session)
    }
}
