// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

// Agent service client
//
// Responsibilities:
// - Open the streaming chat completion and hand back the raw byte stream
// - Issue the resume call and decode its body at the boundary
// - Attach configured headers (auth) to both calls
//
// The probe only sees the `AgentClient` trait; tests inject their own.

use crate::classifier::ResumePayload;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::{Stream, TryStreamExt};
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::StatusCode;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::time::Duration;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// Body of the streaming chat completion call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatRequest {
    pub agent_id: String,
    pub agent_version: String,
    pub query: String,
    pub stream: bool,
    pub inc_stream: bool,
    pub executor_version: String,
}

impl ChatRequest {
    /// An incremental streaming request, the only mode the probe uses.
    pub fn streaming(
        agent_id: impl Into<String>,
        agent_version: impl Into<String>,
        query: impl Into<String>,
        executor_version: impl Into<String>,
    ) -> Self {
        Self {
            agent_id: agent_id.into(),
            agent_version: agent_version.into(),
            query: query.into(),
            stream: true,
            inc_stream: true,
            executor_version: executor_version.into(),
        }
    }
}

/// Body of the resume call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResumeRequest {
    pub agent_id: String,
    pub conversation_id: String,
}

pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// An opened streaming response. The body is only meaningful for 200.
pub struct ChatStream {
    pub status: StatusCode,
    pub body: ByteStream,
}

impl fmt::Debug for ChatStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChatStream")
            .field("status", &self.status)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ResumeResponse {
    pub status: StatusCode,
    pub payload: ResumePayload,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ClientError {
    #[error("request failed: {0}")]
    Transport(String),
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("failed to read response body: {0}")]
    Body(String),
    #[error("invalid header \"{name}\"")]
    InvalidHeader { name: String },
}

impl From<reqwest::Error> for ClientError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ClientError::Timeout(e.to_string())
        } else if e.is_body() || e.is_decode() {
            ClientError::Body(e.to_string())
        } else {
            ClientError::Transport(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// Trait: AgentClient (dependency injection point)
// ---------------------------------------------------------------------------

/// The two remote calls the probe depends on.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Start a streaming chat. Returns as soon as the response head arrives.
    async fn open_chat_stream(&self, request: ChatRequest) -> Result<ChatStream, ClientError>;

    /// Resume a conversation, bounded by `timeout`.
    async fn resume_chat(
        &self,
        request: ResumeRequest,
        timeout: Duration,
    ) -> Result<ResumeResponse, ClientError>;
}

// ---------------------------------------------------------------------------
// Reqwest implementation
// ---------------------------------------------------------------------------

pub fn chat_completion_url(base_url: &str, agent_id: &str) -> String {
    format!(
        "{}/api/agent-app/v1/app/{agent_id}/chat/completion",
        base_url.trim_end_matches('/')
    )
}

pub fn resume_url(base_url: &str, agent_id: &str) -> String {
    format!(
        "{}/api/agent-app/v1/app/{agent_id}/chat/resume",
        base_url.trim_end_matches('/')
    )
}

/// Convert configured header pairs into a `HeaderMap`.
pub fn build_headers(pairs: &HashMap<String, String>) -> Result<HeaderMap, ClientError> {
    let mut headers = HeaderMap::with_capacity(pairs.len());
    for (name, value) in pairs {
        let invalid = || ClientError::InvalidHeader { name: name.clone() };
        let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|_| invalid())?;
        let header_value = HeaderValue::from_str(value).map_err(|_| invalid())?;
        headers.insert(header_name, header_value);
    }
    Ok(headers)
}

pub struct ReqwestAgentClient {
    client: reqwest::Client,
    base_url: String,
    headers: HeaderMap,
    stream_timeout: Option<Duration>,
}

impl ReqwestAgentClient {
    pub fn new(client: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into(),
            headers: HeaderMap::new(),
            stream_timeout: None,
        }
    }

    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.headers = headers;
        self
    }

    /// Upper bound on the whole streaming call, body included.
    pub fn with_stream_timeout(mut self, timeout: Duration) -> Self {
        self.stream_timeout = Some(timeout);
        self
    }
}

#[async_trait]
impl AgentClient for ReqwestAgentClient {
    async fn open_chat_stream(&self, request: ChatRequest) -> Result<ChatStream, ClientError> {
        let url = chat_completion_url(&self.base_url, &request.agent_id);

        let mut req = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .json(&request);
        if let Some(timeout) = self.stream_timeout {
            req = req.timeout(timeout);
        }

        let resp = req.send().await?;
        let status = resp.status();
        tracing::debug!(%url, status = status.as_u16(), "chat stream opened");

        let body = resp.bytes_stream().map_err(ClientError::from);
        Ok(ChatStream {
            status,
            body: Box::pin(body),
        })
    }

    async fn resume_chat(
        &self,
        request: ResumeRequest,
        timeout: Duration,
    ) -> Result<ResumeResponse, ClientError> {
        let url = resume_url(&self.base_url, &request.agent_id);

        let resp = self
            .client
            .post(&url)
            .headers(self.headers.clone())
            .json(&request)
            .timeout(timeout)
            .send()
            .await?;

        let status = resp.status();
        let body = resp.bytes().await?;
        tracing::debug!(%url, status = status.as_u16(), bytes = body.len(), "resume answered");

        Ok(ResumeResponse {
            status,
            payload: ResumePayload::from_body(&body),
        })
    }
}
