// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

use chatprobe::client::{build_headers, AgentClient, ReqwestAgentClient};
use chatprobe::config::{self, Config};
use chatprobe::probe::{self, ProbeStatus};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "chatprobe",
    about = "Resume an agent conversation while its chat stream is still running"
)]
struct Cli {
    /// Path to the chatprobe.yaml config file
    #[arg(long, default_value = "chatprobe.yaml", env = "CHATPROBE_CONFIG")]
    config: PathBuf,

    /// Override agent.id from the config
    #[arg(long, env = "CHATPROBE_AGENT_ID")]
    agent_id: Option<String>,

    /// Treat an inconclusive (skipped) probe as exit code 2
    #[arg(long)]
    strict: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let source = config::FileSource {
        path: cli.config.clone(),
    };
    let mut config = match config::load_config(&source) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(path = %cli.config.display(), "failed to load config: {e}");
            return ExitCode::from(1);
        }
    };
    if let Some(agent_id) = cli.agent_id.filter(|id| !id.trim().is_empty()) {
        config.agent.id = agent_id;
    }

    tracing::info!(
        base_url = %config.service.base_url,
        agent_id = %config.agent.id,
        config_hash = %config.config_hash,
        "config loaded"
    );

    let client = match build_client(&config) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!("failed to build HTTP client: {e}");
            return ExitCode::from(1);
        }
    };

    let verdict = probe::run_chat_probe(&config, client).await;

    match serde_json::to_string_pretty(&verdict) {
        Ok(json) => println!("{json}"),
        Err(e) => tracing::error!("failed to serialize verdict: {e}"),
    }

    match verdict.status {
        ProbeStatus::Pass => ExitCode::SUCCESS,
        ProbeStatus::Fail => ExitCode::from(1),
        ProbeStatus::Skip if cli.strict => ExitCode::from(2),
        ProbeStatus::Skip => ExitCode::SUCCESS,
    }
}

fn build_client(config: &Config) -> Result<Arc<dyn AgentClient>, Box<dyn std::error::Error>> {
    let http = reqwest::Client::builder()
        .danger_accept_invalid_certs(config.service.accept_invalid_certs)
        .build()?;
    let headers = build_headers(&config.service.headers)?;

    let client = ReqwestAgentClient::new(http, config.service.base_url.clone())
        .with_headers(headers)
        .with_stream_timeout(config.timings.stream_timeout);
    Ok(Arc::new(client))
}
