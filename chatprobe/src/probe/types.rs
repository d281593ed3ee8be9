// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

// Probe types
//
// Actor outcomes, the aggregate verdict, timing knobs, and the error
// taxonomy every task failure is converted into.

use crate::classifier::{Classification, ResumePayload};
use crate::client::{ClientError, ResumeResponse};
use crate::stream::FrameCounts;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};
use std::time::Duration;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why an actor did not succeed.
///
/// Every failure inside a task ends up as one of these at the task
/// boundary; none of them escape the runner.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProbeError {
    /// Gateway or service error status (502/503/504). Environment problem,
    /// not a defect.
    #[error("upstream service unavailable (HTTP {status})")]
    TransportUnavailable { status: u16 },

    #[error("unexpected HTTP status {status}")]
    UnexpectedStatus { status: u16 },

    #[error(transparent)]
    Client(#[from] ClientError),

    #[error("dependency value never observed")]
    DependencyNeverObserved,

    #[error("join timeout")]
    JoinTimeout,

    #[error("task panicked: {0}")]
    TaskPanicked(String),
}

impl ProbeError {
    pub fn is_transport_unavailable(&self) -> bool {
        matches!(self, ProbeError::TransportUnavailable { .. })
    }
}

/// Reject gateway/service error statuses.
pub fn check_available(status: StatusCode) -> Result<(), ProbeError> {
    match status.as_u16() {
        502..=504 => Err(ProbeError::TransportUnavailable {
            status: status.as_u16(),
        }),
        _ => Ok(()),
    }
}

// ---------------------------------------------------------------------------
// Timing
// ---------------------------------------------------------------------------

/// Delays and bounded waits of one probe run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeTimings {
    /// Pause between starting the producer and starting the consumer.
    pub stagger: Duration,
    pub producer_join_timeout: Duration,
    pub consumer_join_timeout: Duration,
    /// How long the consumer waits for the control value.
    pub value_wait_timeout: Duration,
}

impl Default for ProbeTimings {
    fn default() -> Self {
        Self {
            stagger: Duration::from_secs(1),
            producer_join_timeout: Duration::from_secs(180),
            consumer_join_timeout: Duration::from_secs(180),
            value_wait_timeout: Duration::from_secs(60),
        }
    }
}

// ---------------------------------------------------------------------------
// Task reports
// ---------------------------------------------------------------------------

/// What the producer saw while consuming the chat stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProducerReport {
    pub control_value: Option<String>,
    pub frames: FrameCounts,
    /// The runner stopped waiting and the stream was dropped early.
    pub abandoned: bool,
}

/// The consumer's dependent call and the value it used.
#[derive(Debug, Clone, PartialEq)]
pub struct ConsumerReport {
    pub conversation_id: String,
    pub response: ResumeResponse,
}

// ---------------------------------------------------------------------------
// Actor outcomes
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    Producer,
    Consumer,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActorStatus {
    Success,
    Failed(ProbeError),
    Skipped(ProbeError),
}

impl Serialize for ActorStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let (status, reason) = match self {
            ActorStatus::Success => ("success", None),
            ActorStatus::Failed(e) => ("failed", Some(e.to_string())),
            ActorStatus::Skipped(e) => ("skipped", Some(e.to_string())),
        };
        let mut s = serializer.serialize_struct("ActorStatus", 2)?;
        s.serialize_field("status", status)?;
        s.serialize_field("reason", &reason)?;
        s.end()
    }
}

/// Terminal result of one concurrent unit of work.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActorOutcome {
    pub role: ActorRole,
    #[serde(flatten)]
    pub status: ActorStatus,
    /// Extracted control value (producer) or value used (consumer).
    pub value: Option<String>,
    #[serde(rename = "elapsed_ms", serialize_with = "serialize_millis")]
    pub elapsed: Duration,
}

impl ActorOutcome {
    pub fn is_success(&self) -> bool {
        self.status == ActorStatus::Success
    }
}

fn serialize_millis<S: Serializer>(d: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(d.as_millis().min(u128::from(u64::MAX)) as u64)
}

// ---------------------------------------------------------------------------
// Verdict
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProbeStatus {
    Pass,
    Fail,
    /// Inconclusive: environment unavailable or the race was never set up.
    Skip,
}

/// Aggregate result of one probe run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProbeVerdict {
    pub probe_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub status: ProbeStatus,
    pub diagnostic: String,
    /// The control value exchanged through the coordinator, if any.
    pub control_value: Option<String>,
    pub producer: ActorOutcome,
    pub consumer: ActorOutcome,
    pub classification: Option<Classification>,
    pub response_status: Option<u16>,
    pub response_payload: Option<ResumePayload>,
    pub frames: Option<FrameCounts>,
}
