// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Client configuration loaded from environment variables.
//!
//! A `.env` file in the working directory is honored for local runs.

use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Host used when running against a locally started trekkie server.
pub const OFFLINE_HOST: &str = "http://localhost:8060";
/// Host of the staging deployment.
pub const STAGING_HOST: &str = "https://trekkie.staging.dvb.solutions";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// API generation spoken by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProtocolVersion {
    /// Cookie session, GPX uploaded before the run is submitted.
    V1,
    /// Run resource created first, GPX and live pings attached by run id.
    V2,
}

impl ProtocolVersion {
    /// Path prefix every endpoint of this generation lives under.
    pub fn prefix(self) -> &'static str {
        match self {
            ProtocolVersion::V1 => "",
            ProtocolVersion::V2 => "/v2",
        }
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::V1 => f.write_str("v1"),
            ProtocolVersion::V2 => f.write_str("v2"),
        }
    }
}

impl FromStr for ProtocolVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "v1" | "1" => Ok(ProtocolVersion::V1),
            "v2" | "2" => Ok(ProtocolVersion::V2),
            other => Err(ConfigError::Invalid {
                key: "TREKKIE_PROTOCOL",
                value: other.to_string(),
            }),
        }
    }
}

/// Order of the two v1 submission steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum V1StepOrder {
    /// Upload the GPX file, then submit the run referencing its `gpx_id`.
    #[default]
    GpxFirst,
    /// Submit the run without a `gpx_id`, then upload the GPX file.
    RunFirst,
}

impl FromStr for V1StepOrder {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gpx-first" | "gpx_first" => Ok(V1StepOrder::GpxFirst),
            "run-first" | "run_first" => Ok(V1StepOrder::RunFirst),
            other => Err(ConfigError::Invalid {
                key: "TREKKIE_V1_ORDER",
                value: other.to_string(),
            }),
        }
    }
}

/// Client configuration, built once per workflow.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the trekkie server, without trailing slash
    pub host: String,
    /// API generation to speak
    pub protocol_version: ProtocolVersion,
    /// Upper bound for each individual request
    pub timeout: Duration,
    /// Log transport-level details of every connection
    pub verbose_logging: bool,
    /// Step order for the v1 protocol
    pub v1_order: V1StepOrder,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: OFFLINE_HOST.to_string(),
            protocol_version: ProtocolVersion::V1,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            verbose_logging: false,
            v1_order: V1StepOrder::GpxFirst,
        }
    }
}

impl Config {
    /// Config pointing at an explicit host, everything else default.
    pub fn for_host(host: impl Into<String>, protocol_version: ProtocolVersion) -> Self {
        Self {
            host: normalize_host(&host.into()),
            protocol_version,
            ..Self::default()
        }
    }

    /// Load configuration from environment variables.
    ///
    /// `TREKKIE_HOST` wins over the `TREKKIE_OFFLINE` toggle.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let offline = match env::var("TREKKIE_OFFLINE") {
            Ok(v) => parse_bool("TREKKIE_OFFLINE", &v)?,
            Err(_) => true,
        };

        let host = match env::var("TREKKIE_HOST") {
            Ok(h) if !h.trim().is_empty() => normalize_host(&h),
            _ if offline => OFFLINE_HOST.to_string(),
            _ => STAGING_HOST.to_string(),
        };

        let protocol_version = env::var("TREKKIE_PROTOCOL")
            .map(|v| v.parse())
            .unwrap_or(Ok(ProtocolVersion::V1))?;

        let timeout_secs = match env::var("TREKKIE_TIMEOUT_SECS") {
            Ok(v) => v.trim().parse::<u64>().map_err(|_| ConfigError::Invalid {
                key: "TREKKIE_TIMEOUT_SECS",
                value: v.clone(),
            })?,
            Err(_) => DEFAULT_TIMEOUT_SECS,
        };
        if timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                key: "TREKKIE_TIMEOUT_SECS",
                value: "0".to_string(),
            });
        }

        let verbose_logging = match env::var("TREKKIE_VERBOSE") {
            Ok(v) => parse_bool("TREKKIE_VERBOSE", &v)?,
            Err(_) => false,
        };

        let v1_order = env::var("TREKKIE_V1_ORDER")
            .map(|v| v.parse())
            .unwrap_or(Ok(V1StepOrder::GpxFirst))?;

        Ok(Self {
            host,
            protocol_version,
            timeout: Duration::from_secs(timeout_secs),
            verbose_logging,
            v1_order,
        })
    }
}

fn normalize_host(host: &str) -> String {
    host.trim().trim_end_matches('/').to_string()
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            key,
            value: value.to_string(),
        }),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value {value:?} for {key}")]
    Invalid { key: &'static str, value: String },
}
