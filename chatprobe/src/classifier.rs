// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

// Resume response classification
//
// The resume endpoint answers with objects, bare strings, or occasionally
// something else entirely. The body is decoded once at the boundary into a
// tagged `ResumePayload`; judgement then only looks at the variant.

use reqwest::StatusCode;
use serde::Serialize;

/// Marker the service puts in `error_details` when the conversation cannot
/// be resumed for this agent configuration.
pub const DEFAULT_NOT_FOUND_MARKER: &str = "conversation_id not found";

// ---------------------------------------------------------------------------
// Boundary decoding
// ---------------------------------------------------------------------------

/// Shape of a decoded resume response body.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "shape", content = "value", rename_all = "snake_case")]
pub enum ResumePayload {
    Object(serde_json::Map<String, serde_json::Value>),
    Text(String),
    Other(serde_json::Value),
    Empty,
}

impl ResumePayload {
    /// Decode a raw response body.
    ///
    /// An empty body or JSON `null` is `Empty`. A body that is not JSON at
    /// all is treated as plain text.
    pub fn from_body(body: &[u8]) -> Self {
        if body.iter().all(u8::is_ascii_whitespace) {
            return ResumePayload::Empty;
        }
        match serde_json::from_slice::<serde_json::Value>(body) {
            Ok(value) => Self::from_value(value),
            Err(_) => ResumePayload::Text(String::from_utf8_lossy(body).into_owned()),
        }
    }

    pub fn from_value(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ResumePayload::Empty,
            serde_json::Value::Object(map) => ResumePayload::Object(map),
            serde_json::Value::String(s) => ResumePayload::Text(s),
            other => ResumePayload::Other(other),
        }
    }

    /// Render the payload for diagnostics.
    pub fn to_display_string(&self) -> String {
        match self {
            ResumePayload::Object(map) => {
                serde_json::to_string(map).unwrap_or_else(|_| "<unserializable object>".into())
            }
            ResumePayload::Text(s) => s.clone(),
            ResumePayload::Other(v) => v.to_string(),
            ResumePayload::Empty => "<empty>".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Judgement
// ---------------------------------------------------------------------------

/// Three-way judgement of a resume response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Classification {
    /// The service resumed the conversation.
    Valid,
    /// The call reached the service mid-stream, but this agent configuration
    /// does not support resuming.
    ExpectedUnsupported,
    Invalid,
}

/// Judges resume responses. Never panics; missing or wrong-typed fields
/// make a response `Invalid`.
#[derive(Debug, Clone)]
pub struct ResponseClassifier {
    id_field: String,
    not_found_marker: String,
}

impl Default for ResponseClassifier {
    fn default() -> Self {
        Self::new(crate::stream::DEFAULT_CONTROL_KEY, DEFAULT_NOT_FOUND_MARKER)
    }
}

impl ResponseClassifier {
    pub fn new(id_field: impl Into<String>, not_found_marker: impl Into<String>) -> Self {
        Self {
            id_field: id_field.into(),
            not_found_marker: not_found_marker.into(),
        }
    }

    pub fn classify(
        &self,
        status: StatusCode,
        payload: &ResumePayload,
        expected_id: &str,
    ) -> Classification {
        if status == StatusCode::OK {
            return if self.is_valid_success(payload, expected_id) {
                Classification::Valid
            } else {
                Classification::Invalid
            };
        }

        if status == StatusCode::INTERNAL_SERVER_ERROR && self.is_not_found(payload) {
            return Classification::ExpectedUnsupported;
        }

        Classification::Invalid
    }

    fn is_valid_success(&self, payload: &ResumePayload, expected_id: &str) -> bool {
        match payload {
            ResumePayload::Object(map) => {
                let id_matches = map
                    .get(&self.id_field)
                    .and_then(|v| v.as_str())
                    .map(|id| id == expected_id)
                    .unwrap_or(false);
                let has_content = ["content", "data"]
                    .iter()
                    .any(|field| map.get(*field).map(is_truthy).unwrap_or(false));
                id_matches || has_content
            }
            ResumePayload::Text(s) => !s.trim().is_empty(),
            ResumePayload::Other(v) => is_truthy(v),
            ResumePayload::Empty => false,
        }
    }

    fn is_not_found(&self, payload: &ResumePayload) -> bool {
        match payload {
            ResumePayload::Object(map) => map
                .get("error_details")
                .and_then(|d| d.as_str())
                .map(|d| d.contains(self.not_found_marker.as_str()))
                .unwrap_or(false),
            _ => false,
        }
    }
}

/// Whether a JSON value carries anything: non-empty strings and
/// collections, `true`, and non-zero numbers.
fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(true),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
