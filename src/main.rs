// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! trekkie-client CLI
//!
//! Runs one full submission workflow against a trekkie server and prints the
//! resulting identifiers as JSON.

use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trekkie_client::{Config, ProtocolVersion, Workflow, WorkflowPlan};

#[derive(Debug, Parser)]
#[command(
    name = "trekkie-client",
    version,
    about = "Submit runs and GPX tracks to a trekkie server"
)]
struct Cli {
    /// GPX track to upload (required for v1)
    #[arg(long)]
    gpx: Option<PathBuf>,

    /// JSON workflow plan; defaults to the built-in sample run
    #[arg(long)]
    plan: Option<PathBuf>,

    /// Base URL of the trekkie server (overrides TREKKIE_HOST)
    #[arg(long)]
    host: Option<String>,

    /// API generation: v1 or v2 (overrides TREKKIE_PROTOCOL)
    #[arg(long)]
    protocol: Option<ProtocolVersion>,

    /// Per-request timeout in seconds (overrides TREKKIE_TIMEOUT_SECS)
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Replay the create-user response against the login endpoint
    #[arg(long)]
    login: bool,

    /// Delete the run at the end (v2)
    #[arg(long)]
    delete: bool,

    /// Log transport-level details of every request
    #[arg(long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env().context("Failed to load configuration")?;
    if let Some(host) = cli.host {
        config.host = host.trim_end_matches('/').to_string();
    }
    if let Some(protocol) = cli.protocol {
        config.protocol_version = protocol;
    }
    if let Some(secs) = cli.timeout_secs.filter(|s| *s > 0) {
        config.timeout = std::time::Duration::from_secs(secs);
    }
    config.verbose_logging |= cli.verbose;

    init_logging(config.verbose_logging);

    let mut plan = match &cli.plan {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read plan {}", path.display()))?;
            serde_json::from_str::<WorkflowPlan>(&raw)
                .with_context(|| format!("Invalid plan {}", path.display()))?
        }
        None => WorkflowPlan::sample(),
    };
    plan.login |= cli.login;
    plan.delete_after |= cli.delete;

    let mut workflow = Workflow::new(config)?;
    let report = workflow.run(&plan, cli.gpx.as_deref()).await?;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Initialize structured JSON logging.
fn init_logging(verbose: bool) {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true)
        .with_writer(std::io::stderr);

    let mut filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive("trekkie_client=debug".parse().expect("static directive"))
        .add_directive("info".parse().expect("static directive"));
    if verbose {
        filter = filter.add_directive("reqwest=trace".parse().expect("static directive"));
    }

    tracing_subscriber::registry().with(filter).with(format).init();
}
