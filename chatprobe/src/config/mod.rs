// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

mod error;
mod interpolation;
mod loader;
mod raw;
mod source;
mod types;

pub use error::ConfigError;
pub use interpolation::resolve_variables;
pub use loader::load_config;
pub use source::{ConfigSource, FileSource, StringSource};
pub use types::{
    AgentConfig, Config, ControlConfig, ServiceConfig, TimingConfig, DEFAULT_AGENT_VERSION,
    DEFAULT_EXECUTOR_VERSION, DEFAULT_QUERY,
};
