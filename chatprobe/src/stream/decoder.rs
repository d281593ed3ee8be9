// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

// Frame decoder
//
// Classifies each stream line as a control event, a content delta, or
// unrecognized. Malformed input degrades to `Unrecognized`; decoding never
// fails and never stops the sequence.

use super::types::{FrameKind, StreamFrame, DATA_PREFIX, DEFAULT_CONTROL_KEY, UPSERT_ACTION};
use futures_util::future;
use futures_util::stream::{Stream, StreamExt};

/// Decodes `data: <json>` lines and picks out the control frame for one key.
///
/// Control frames look like:
///
/// ```text
/// data: {"key":["conversation_id"],"action":"upsert","content":"cid-123"}
/// ```
///
/// Every other parseable data line is a content delta.
#[derive(Debug, Clone)]
pub struct StreamDecoder {
    control_key: String,
}

impl Default for StreamDecoder {
    fn default() -> Self {
        Self::new(DEFAULT_CONTROL_KEY)
    }
}

impl StreamDecoder {
    pub fn new(control_key: impl Into<String>) -> Self {
        Self {
            control_key: control_key.into(),
        }
    }

    /// Decode a single line.
    pub fn decode_line(&self, line: &str) -> StreamFrame {
        let trimmed = line.trim();

        let body = match trimmed.strip_prefix(DATA_PREFIX) {
            Some(b) => b,
            None => return unrecognized(line),
        };

        let payload: serde_json::Value = match serde_json::from_str(body) {
            Ok(v) => v,
            Err(_) => return unrecognized(line),
        };

        let kind = match self.control_value(&payload) {
            Some(value) => FrameKind::Control { value },
            None => FrameKind::ContentDelta,
        };

        StreamFrame {
            raw: line.to_string(),
            payload: Some(payload),
            kind,
        }
    }

    /// Lazily decode a line stream into frames.
    ///
    /// Blank lines are skipped. Upstream errors are passed through untouched
    /// so the caller decides whether they end the stream.
    pub fn frames<S, E>(&self, lines: S) -> impl Stream<Item = Result<StreamFrame, E>>
    where
        S: Stream<Item = Result<String, E>>,
    {
        let decoder = self.clone();
        lines.filter_map(move |item| {
            let frame = match item {
                Ok(line) if line.trim().is_empty() => None,
                Ok(line) => Some(Ok(decoder.decode_line(&line))),
                Err(e) => Some(Err(e)),
            };
            future::ready(frame)
        })
    }

    /// Extract the control value if the payload is an upsert of our key.
    ///
    /// All three conditions must hold: `key` is exactly `[control_key]`,
    /// `action` is `"upsert"`, and `content` is a non-empty string.
    fn control_value(&self, payload: &serde_json::Value) -> Option<String> {
        let key_matches = payload
            .get("key")
            .and_then(|k| k.as_array())
            .map(|path| path.len() == 1 && path[0].as_str() == Some(self.control_key.as_str()))
            .unwrap_or(false);
        if !key_matches {
            return None;
        }

        if payload.get("action").and_then(|a| a.as_str()) != Some(UPSERT_ACTION) {
            return None;
        }

        payload
            .get("content")
            .and_then(|c| c.as_str())
            .filter(|c| !c.is_empty())
            .map(str::to_string)
    }
}

fn unrecognized(line: &str) -> StreamFrame {
    StreamFrame {
        raw: line.to_string(),
        payload: None,
        kind: FrameKind::Unrecognized,
    }
}
