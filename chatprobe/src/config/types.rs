// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::time::Duration;

use crate::probe::ProbeTimings;

pub const DEFAULT_AGENT_VERSION: &str = "v0";
pub const DEFAULT_EXECUTOR_VERSION: &str = "v2";
pub const DEFAULT_QUERY: &str =
    "Write a detailed, multi-section report on the history of distributed systems.";

/// Validated probe configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub service: ServiceConfig,
    pub agent: AgentConfig,
    pub control: ControlConfig,
    pub timings: TimingConfig,
    /// `sha256:<hex>` of the raw YAML, logged for correlation.
    pub config_hash: String,
}

#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub base_url: String,
    pub headers: HashMap<String, String>,
    /// Test deployments commonly run with self-signed certificates.
    pub accept_invalid_certs: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    pub id: String,
    pub version: String,
    pub executor_version: String,
    /// Prompt sent on the streaming call. Should be long enough that the
    /// stream is still running when the resume call lands.
    pub query: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlConfig {
    pub key: String,
    pub not_found_marker: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimingConfig {
    pub stagger: Duration,
    pub producer_join_timeout: Duration,
    pub consumer_join_timeout: Duration,
    pub value_wait_timeout: Duration,
    pub stream_timeout: Duration,
    pub resume_timeout: Duration,
}

impl Default for TimingConfig {
    fn default() -> Self {
        let probe = ProbeTimings::default();
        Self {
            stagger: probe.stagger,
            producer_join_timeout: probe.producer_join_timeout,
            consumer_join_timeout: probe.consumer_join_timeout,
            value_wait_timeout: probe.value_wait_timeout,
            stream_timeout: Duration::from_secs(300),
            resume_timeout: Duration::from_secs(300),
        }
    }
}

impl TimingConfig {
    /// The resume call's own timeout cannot fire before the consumer join
    /// gives up on it; the runner's abandon signal ends the call instead.
    pub fn resume_outlives_consumer_join(&self) -> bool {
        self.resume_timeout >= self.consumer_join_timeout
    }

    /// The subset the runner itself enforces.
    pub fn probe_timings(&self) -> ProbeTimings {
        ProbeTimings {
            stagger: self.stagger,
            producer_join_timeout: self.producer_join_timeout,
            consumer_join_timeout: self.consumer_join_timeout,
            value_wait_timeout: self.value_wait_timeout,
        }
    }
}
