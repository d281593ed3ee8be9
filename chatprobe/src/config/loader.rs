// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::time::Duration;

use sha2::{Digest, Sha256};

use crate::classifier::DEFAULT_NOT_FOUND_MARKER;
use crate::stream::DEFAULT_CONTROL_KEY;

use super::error::ConfigError;
use super::interpolation::resolve_variables;
use super::raw;
use super::source::ConfigSource;
use super::types::*;

/// Load and validate a chatprobe config from the given source.
///
/// Steps:
/// 1. Read raw YAML from source
/// 2. Compute SHA256 config hash
/// 3. Parse YAML into raw deserialization types
/// 4. Validate version
/// 5. Resolve `${VAR}` references in string fields
/// 6. Validate values and apply defaults
pub fn load_config(source: &dyn ConfigSource) -> Result<Config, ConfigError> {
    let raw_yaml = source.load()?;
    let config_hash = compute_hash(&raw_yaml);

    let raw: raw::RawConfig = serde_yaml::from_str(&raw_yaml)?;

    if raw.chatprobe != "v1" {
        return Err(ConfigError::Validation(format!(
            "unsupported config version \"{}\", expected \"v1\"",
            raw.chatprobe
        )));
    }

    let service = build_service_config(raw.service)?;
    let agent = build_agent_config(raw.agent)?;
    let control = build_control_config(raw.control)?;
    let timings = build_timing_config(raw.timings.unwrap_or_default())?;

    Ok(Config {
        service,
        agent,
        control,
        timings,
        config_hash,
    })
}

pub(super) fn compute_hash(content: &str) -> String {
    let digest = Sha256::digest(content.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("sha256:{hex}")
}

fn build_service_config(raw: raw::RawServiceConfig) -> Result<ServiceConfig, ConfigError> {
    let base_url = resolve_variables(raw.base_url.trim())?;
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::Validation(format!(
            "service.base_url \"{base_url}\" must start with http:// or https://"
        )));
    }

    let mut headers = HashMap::with_capacity(raw.headers.len());
    for (name, value) in raw.headers {
        if name.trim().is_empty() {
            return Err(ConfigError::Validation(
                "service.headers contains an empty header name".to_string(),
            ));
        }
        headers.insert(name, resolve_variables(&value)?);
    }

    Ok(ServiceConfig {
        base_url: base_url.trim_end_matches('/').to_string(),
        headers,
        accept_invalid_certs: raw.accept_invalid_certs.unwrap_or(false),
    })
}

fn build_agent_config(raw: raw::RawAgentConfig) -> Result<AgentConfig, ConfigError> {
    let id = resolve_variables(raw.id.trim())?;
    if id.is_empty() {
        return Err(ConfigError::Validation(
            "agent.id must not be empty".to_string(),
        ));
    }

    let query = match raw.query {
        Some(q) => resolve_variables(&q)?,
        None => DEFAULT_QUERY.to_string(),
    };
    if query.trim().is_empty() {
        return Err(ConfigError::Validation(
            "agent.query must not be blank".to_string(),
        ));
    }

    Ok(AgentConfig {
        id,
        version: raw
            .version
            .unwrap_or_else(|| DEFAULT_AGENT_VERSION.to_string()),
        executor_version: raw
            .executor_version
            .unwrap_or_else(|| DEFAULT_EXECUTOR_VERSION.to_string()),
        query,
    })
}

fn build_control_config(raw: Option<raw::RawControlConfig>) -> Result<ControlConfig, ConfigError> {
    let (key, marker) = match raw {
        Some(c) => (c.key, c.not_found_marker),
        None => (None, None),
    };

    let key = key.unwrap_or_else(|| DEFAULT_CONTROL_KEY.to_string());
    if key.trim().is_empty() {
        return Err(ConfigError::Validation(
            "control.key must not be empty".to_string(),
        ));
    }
    let not_found_marker = marker.unwrap_or_else(|| DEFAULT_NOT_FOUND_MARKER.to_string());
    if not_found_marker.is_empty() {
        return Err(ConfigError::Validation(
            "control.not_found_marker must not be empty".to_string(),
        ));
    }

    Ok(ControlConfig {
        key,
        not_found_marker,
    })
}

fn build_timing_config(raw: raw::RawTimingConfig) -> Result<TimingConfig, ConfigError> {
    let defaults = TimingConfig::default();
    let timings = TimingConfig {
        stagger: millis("timings.stagger_ms", raw.stagger_ms, defaults.stagger)?,
        producer_join_timeout: millis(
            "timings.producer_join_timeout_ms",
            raw.producer_join_timeout_ms,
            defaults.producer_join_timeout,
        )?,
        consumer_join_timeout: millis(
            "timings.consumer_join_timeout_ms",
            raw.consumer_join_timeout_ms,
            defaults.consumer_join_timeout,
        )?,
        value_wait_timeout: millis(
            "timings.value_wait_timeout_ms",
            raw.value_wait_timeout_ms,
            defaults.value_wait_timeout,
        )?,
        stream_timeout: millis(
            "timings.stream_timeout_ms",
            raw.stream_timeout_ms,
            defaults.stream_timeout,
        )?,
        resume_timeout: millis(
            "timings.resume_timeout_ms",
            raw.resume_timeout_ms,
            defaults.resume_timeout,
        )?,
    };

    let explicit = raw.resume_timeout_ms.is_some() || raw.consumer_join_timeout_ms.is_some();
    if explicit && timings.resume_outlives_consumer_join() {
        tracing::warn!(
            resume_timeout_ms = timings.resume_timeout.as_millis() as u64,
            consumer_join_timeout_ms = timings.consumer_join_timeout.as_millis() as u64,
            "resume timeout is not below the consumer join timeout; \
             a slow resume ends as a join timeout"
        );
    }
    Ok(timings)
}

fn millis(field: &str, value: Option<u64>, default: Duration) -> Result<Duration, ConfigError> {
    match value {
        None => Ok(default),
        Some(0) => Err(ConfigError::Validation(format!("{field} must be > 0"))),
        Some(ms) => Ok(Duration::from_millis(ms)),
    }
}
