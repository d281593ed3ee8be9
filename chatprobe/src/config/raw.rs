// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

// Raw YAML deserialization types (internal)
// Kept apart from the public Config structs: variables are resolved and
// defaults applied between raw and typed.

use serde::Deserialize;
use std::collections::HashMap;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfig {
    pub chatprobe: String,
    pub service: RawServiceConfig,
    pub agent: RawAgentConfig,
    pub control: Option<RawControlConfig>,
    pub timings: Option<RawTimingConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawServiceConfig {
    pub base_url: String,
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub accept_invalid_certs: Option<bool>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawAgentConfig {
    pub id: String,
    pub version: Option<String>,
    pub executor_version: Option<String>,
    pub query: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawControlConfig {
    pub key: Option<String>,
    pub not_found_marker: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawTimingConfig {
    pub stagger_ms: Option<u64>,
    pub producer_join_timeout_ms: Option<u64>,
    pub consumer_join_timeout_ms: Option<u64>,
    pub value_wait_timeout_ms: Option<u64>,
    pub stream_timeout_ms: Option<u64>,
    pub resume_timeout_ms: Option<u64>,
}
