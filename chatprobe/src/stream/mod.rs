// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

// Chat stream decoding
//
// Responsibilities:
// - Split the streaming response body into lines, one line buffered at a time
// - Parse `data: <json>` lines into typed frames
// - Recognize the single control frame carrying the conversation id
// - Absorb blank lines and malformed JSON as `Unrecognized` frames

mod decoder;
mod lines;
mod types;

pub use decoder::StreamDecoder;
pub use lines::split_lines;
pub use types::{
    FrameCounts, FrameKind, StreamFrame, DATA_PREFIX, DEFAULT_CONTROL_KEY, UPSERT_ACTION,
};

#[cfg(test)]
mod tests;
