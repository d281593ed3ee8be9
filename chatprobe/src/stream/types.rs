// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

// Stream types
//
// Decoded frames from an incremental `data: <json>` chat stream and the
// counters the producer keeps while draining one.

use serde::Serialize;

// ---------------------------------------------------------------------------
// Frame representation
// ---------------------------------------------------------------------------

/// Literal prefix of a data line in the chat stream.
pub const DATA_PREFIX: &str = "data: ";

/// Action tag a control frame must carry to qualify.
pub const UPSERT_ACTION: &str = "upsert";

/// Default control key extracted from the stream.
pub const DEFAULT_CONTROL_KEY: &str = "conversation_id";

/// Classification of a single stream line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameKind {
    /// Session metadata upsert for the configured key. Carries the content.
    Control { value: String },
    /// Any other well-formed data frame (incremental generated output).
    ContentDelta,
    /// Not a data line, or the payload is not valid JSON.
    Unrecognized,
}

/// One decoded line from the stream.
///
/// Frames are created per input line and dropped after the producer has
/// acted on them.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamFrame {
    /// The line as received, before trimming.
    pub raw: String,
    /// Parsed JSON payload. `None` for non-data lines and malformed JSON.
    pub payload: Option<serde_json::Value>,
    pub kind: FrameKind,
}

impl StreamFrame {
    /// The extracted control value, if this frame is a control event.
    pub fn control_value(&self) -> Option<&str> {
        match &self.kind {
            FrameKind::Control { value } => Some(value),
            _ => None,
        }
    }

    pub fn is_control(&self) -> bool {
        matches!(self.kind, FrameKind::Control { .. })
    }
}

// ---------------------------------------------------------------------------
// Drain statistics
// ---------------------------------------------------------------------------

/// Per-kind frame counts observed while consuming one stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FrameCounts {
    pub control: u64,
    pub content: u64,
    pub unrecognized: u64,
}

impl FrameCounts {
    pub fn record(&mut self, kind: &FrameKind) {
        match kind {
            FrameKind::Control { .. } => self.control += 1,
            FrameKind::ContentDelta => self.content += 1,
            FrameKind::Unrecognized => self.unrecognized += 1,
        }
    }

    pub fn total(&self) -> u64 {
        self.control + self.content + self.unrecognized
    }
}
