// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

// Producer and consumer tasks
//
// The runner only knows the `Producer` and `Consumer` traits. The default
// implementations drive the agent service: the producer consumes the chat
// stream and publishes the conversation id; the consumer waits for it and
// calls resume while the stream is still running.

use super::abandon::AbandonSignal;
use super::types::{check_available, ConsumerReport, ProbeError, ProducerReport};
use crate::client::{AgentClient, ChatRequest, ResumeRequest};
use crate::coordinator::SessionCoordinator;
use crate::stream::{split_lines, StreamDecoder};
use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// What a producer gets from the runner.
pub struct ProducerContext {
    pub coordinator: Arc<SessionCoordinator>,
    pub abandon: AbandonSignal,
}

/// Long-running unit of work that discovers and publishes the control value.
#[async_trait]
pub trait Producer: Send + Sync + 'static {
    async fn produce(&self, ctx: ProducerContext) -> Result<ProducerReport, ProbeError>;
}

/// What a consumer gets from the runner.
pub struct ConsumerContext {
    pub coordinator: Arc<SessionCoordinator>,
    pub abandon: AbandonSignal,
    /// How long to wait for the control value.
    pub wait: Duration,
}

/// Dependent unit of work that acts on the published control value.
///
/// Implementations return `ProbeError::DependencyNeverObserved` when the
/// value does not arrive within `ctx.wait`.
#[async_trait]
pub trait Consumer: Send + Sync + 'static {
    async fn consume(&self, ctx: ConsumerContext) -> Result<ConsumerReport, ProbeError>;
}

// ---------------------------------------------------------------------------
// ChatStreamProducer
// ---------------------------------------------------------------------------

/// Opens the streaming chat, publishes the first control frame, then keeps
/// draining so the conversation stays live server-side.
pub struct ChatStreamProducer {
    client: Arc<dyn AgentClient>,
    request: ChatRequest,
    decoder: StreamDecoder,
}

impl ChatStreamProducer {
    pub fn new(client: Arc<dyn AgentClient>, request: ChatRequest, decoder: StreamDecoder) -> Self {
        Self {
            client,
            request,
            decoder,
        }
    }
}

#[async_trait]
impl Producer for ChatStreamProducer {
    async fn produce(&self, ctx: ProducerContext) -> Result<ProducerReport, ProbeError> {
        let mut report = ProducerReport::default();

        let opened = tokio::select! {
            opened = self.client.open_chat_stream(self.request.clone()) => opened?,
            _ = ctx.abandon.wait() => {
                report.abandoned = true;
                return Ok(report);
            }
        };

        check_available(opened.status)?;
        if opened.status != StatusCode::OK {
            return Err(ProbeError::UnexpectedStatus {
                status: opened.status.as_u16(),
            });
        }

        let frames = self.decoder.frames(split_lines(opened.body));
        tokio::pin!(frames);

        loop {
            let next = tokio::select! {
                next = frames.next() => next,
                _ = ctx.abandon.wait() => {
                    report.abandoned = true;
                    break;
                }
            };
            let frame = match next {
                Some(frame) => frame?,
                None => break,
            };

            report.frames.record(&frame.kind);
            match frame.control_value() {
                Some(value) if report.control_value.is_none() => {
                    if ctx.coordinator.publish(value) {
                        tracing::info!(
                            conversation_id = %value,
                            frames_seen = report.frames.total(),
                            "control value extracted from stream"
                        );
                    }
                    report.control_value = Some(value.to_string());
                }
                Some(value) => {
                    tracing::debug!(conversation_id = %value, "repeated control frame ignored");
                }
                None => {
                    tracing::trace!(kind = ?frame.kind, "frame");
                }
            }
        }

        tracing::debug!(
            control = report.frames.control,
            content = report.frames.content,
            unrecognized = report.frames.unrecognized,
            abandoned = report.abandoned,
            "chat stream finished"
        );
        Ok(report)
    }
}

// ---------------------------------------------------------------------------
// ResumeConsumer
// ---------------------------------------------------------------------------

/// Waits for the conversation id and resumes the conversation with it.
pub struct ResumeConsumer {
    client: Arc<dyn AgentClient>,
    agent_id: String,
    resume_timeout: Duration,
}

impl ResumeConsumer {
    pub fn new(
        client: Arc<dyn AgentClient>,
        agent_id: impl Into<String>,
        resume_timeout: Duration,
    ) -> Self {
        Self {
            client,
            agent_id: agent_id.into(),
            resume_timeout,
        }
    }
}

#[async_trait]
impl Consumer for ResumeConsumer {
    async fn consume(&self, ctx: ConsumerContext) -> Result<ConsumerReport, ProbeError> {
        let conversation_id = tokio::select! {
            value = ctx.coordinator.await_value(ctx.wait) => {
                value.ok_or(ProbeError::DependencyNeverObserved)?
            }
            _ = ctx.abandon.wait() => return Err(ProbeError::JoinTimeout),
        };

        tracing::info!(%conversation_id, "resuming conversation while stream is in flight");

        let request = ResumeRequest {
            agent_id: self.agent_id.clone(),
            conversation_id: conversation_id.clone(),
        };
        let response = tokio::select! {
            response = self.client.resume_chat(request, self.resume_timeout) => response?,
            _ = ctx.abandon.wait() => {
                tracing::debug!(%conversation_id, "resume call dropped after join timeout");
                return Err(ProbeError::JoinTimeout);
            }
        };
        check_available(response.status)?;

        Ok(ConsumerReport {
            conversation_id,
            response,
        })
    }
}
