// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

// Tests for chat stream decoding
//
// Tests cover:
//  1. Control frame recognized, content extracted
//  2. Wrong key path, wrong action, empty content -> content delta
//  3. Non-data lines and malformed JSON -> unrecognized
//  4. Exactly one control event regardless of its position
//  5. Line splitting across chunk boundaries, CRLF, trailing line, long lines
//  6. Upstream errors forwarded and terminate the line stream
//  7. Blank lines skipped by the frame stream

use super::*;
use bytes::Bytes;
use tokio_stream::StreamExt;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const CONTROL_LINE: &str =
    r#"data: {"key":["conversation_id"],"action":"upsert","content":"cid-123"}"#;

fn delta_line(i: usize) -> String {
    format!(r#"data: {{"key":["answer","text"],"action":"append","content":"tok{i}"}}"#)
}

/// Byte stream where each element becomes one chunk.
fn chunk_stream(
    chunks: Vec<&str>,
) -> impl tokio_stream::Stream<Item = Result<Bytes, String>> + Unpin + Send {
    let chunks: Vec<Result<Bytes, String>> = chunks
        .into_iter()
        .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
        .collect();
    tokio_stream::iter(chunks)
}

async fn collect_lines(
    input: impl tokio_stream::Stream<Item = Result<Bytes, String>> + Unpin,
) -> Vec<Result<String, String>> {
    let lines = split_lines(input);
    tokio::pin!(lines);
    let mut out = Vec::new();
    while let Some(line) = lines.next().await {
        out.push(line);
    }
    out
}

async fn collect_frames(decoder: &StreamDecoder, lines: Vec<String>) -> Vec<StreamFrame> {
    let input = tokio_stream::iter(lines.into_iter().map(Ok::<_, String>));
    let frames = decoder.frames(input);
    tokio::pin!(frames);
    let mut out = Vec::new();
    while let Some(frame) = frames.next().await {
        out.push(frame.expect("no upstream errors in this input"));
    }
    out
}

// ---------------------------------------------------------------------------
// Test 1: control frame recognized
// ---------------------------------------------------------------------------

#[test]
fn control_frame_yields_content_value() {
    let decoder = StreamDecoder::default();
    let frame = decoder.decode_line(CONTROL_LINE);

    assert_eq!(
        frame.kind,
        FrameKind::Control {
            value: "cid-123".into()
        }
    );
    assert_eq!(frame.control_value(), Some("cid-123"));
    assert!(frame.payload.is_some());
    assert_eq!(frame.raw, CONTROL_LINE);
}

#[test]
fn surrounding_whitespace_is_trimmed_before_matching() {
    let decoder = StreamDecoder::default();
    let frame = decoder.decode_line(&format!("   {CONTROL_LINE}  \r"));
    assert!(frame.is_control());
}

#[test]
fn custom_control_key_is_honored() {
    let decoder = StreamDecoder::new("session_id");
    let frame = decoder
        .decode_line(r#"data: {"key":["session_id"],"action":"upsert","content":"s-9"}"#);
    assert_eq!(frame.control_value(), Some("s-9"));

    // The default key no longer qualifies.
    assert_eq!(decoder.decode_line(CONTROL_LINE).kind, FrameKind::ContentDelta);
}

// ---------------------------------------------------------------------------
// Test 2: near-miss control frames are content deltas
// ---------------------------------------------------------------------------

#[test]
fn wrong_key_path_is_content_delta() {
    let decoder = StreamDecoder::default();
    for line in [
        r#"data: {"key":["x"],"action":"upsert","content":"ignored"}"#,
        r#"data: {"key":["conversation_id","nested"],"action":"upsert","content":"v"}"#,
        r#"data: {"key":"conversation_id","action":"upsert","content":"v"}"#,
        r#"data: {"action":"upsert","content":"v"}"#,
    ] {
        assert_eq!(decoder.decode_line(line).kind, FrameKind::ContentDelta, "{line}");
    }
}

#[test]
fn non_upsert_action_is_content_delta() {
    let decoder = StreamDecoder::default();
    let frame = decoder
        .decode_line(r#"data: {"key":["conversation_id"],"action":"remove","content":"v"}"#);
    assert_eq!(frame.kind, FrameKind::ContentDelta);
}

#[test]
fn empty_or_non_string_content_is_content_delta() {
    let decoder = StreamDecoder::default();
    for line in [
        r#"data: {"key":["conversation_id"],"action":"upsert","content":""}"#,
        r#"data: {"key":["conversation_id"],"action":"upsert","content":null}"#,
        r#"data: {"key":["conversation_id"],"action":"upsert"}"#,
        r#"data: {"key":["conversation_id"],"action":"upsert","content":42}"#,
    ] {
        assert_eq!(decoder.decode_line(line).kind, FrameKind::ContentDelta, "{line}");
    }
}

// ---------------------------------------------------------------------------
// Test 3: unrecognized input never raises
// ---------------------------------------------------------------------------

#[test]
fn non_data_lines_are_unrecognized() {
    let decoder = StreamDecoder::default();
    for line in ["", "   ", "event: message", ": keep-alive", "data:{}", "id: 7"] {
        let frame = decoder.decode_line(line);
        assert_eq!(frame.kind, FrameKind::Unrecognized, "{line:?}");
        assert!(frame.payload.is_none());
    }
}

#[test]
fn malformed_json_is_unrecognized() {
    let decoder = StreamDecoder::default();
    for line in ["data: [DONE]", "data: {\"key\":", "data: not json", "data: "] {
        let frame = decoder.decode_line(line);
        assert_eq!(frame.kind, FrameKind::Unrecognized, "{line:?}");
        assert!(frame.payload.is_none());
    }
}

// ---------------------------------------------------------------------------
// Test 4: exactly one control event regardless of position
// ---------------------------------------------------------------------------

#[tokio::test]
async fn single_control_frame_found_at_any_position() {
    let decoder = StreamDecoder::default();
    let n = 12;

    for k in 0..n {
        let lines: Vec<String> = (0..n)
            .map(|i| {
                if i == k {
                    CONTROL_LINE.to_string()
                } else {
                    delta_line(i)
                }
            })
            .collect();

        let frames = collect_frames(&decoder, lines).await;
        let controls: Vec<&str> = frames.iter().filter_map(|f| f.control_value()).collect();

        assert_eq!(frames.len(), n);
        assert_eq!(controls, vec!["cid-123"], "control at position {k}");
    }
}

#[tokio::test]
async fn decoy_key_before_real_control_frame_is_ignored() {
    let decoder = StreamDecoder::default();
    let mut lines =
        vec![r#"data: {"key":["x"],"action":"upsert","content":"ignored"}"#.to_string()];
    lines.extend((0..40).map(delta_line));
    lines.push(CONTROL_LINE.to_string());
    lines.extend((40..45).map(delta_line));

    let frames = collect_frames(&decoder, lines).await;
    let controls: Vec<&str> = frames.iter().filter_map(|f| f.control_value()).collect();
    assert_eq!(controls, vec!["cid-123"]);

    let mut counts = FrameCounts::default();
    for frame in &frames {
        counts.record(&frame.kind);
    }
    assert_eq!(counts.control, 1);
    assert_eq!(counts.content, 46);
    assert_eq!(counts.unrecognized, 0);
    assert_eq!(counts.total(), 47);
}

// ---------------------------------------------------------------------------
// Test 5: line splitting
// ---------------------------------------------------------------------------

#[tokio::test]
async fn lines_reassembled_across_chunk_boundaries() {
    let input = chunk_stream(vec!["data: {\"a\"", ":1}\ndata: {\"b\":2}\n", "\n", "tail"]);
    let lines: Vec<String> = collect_lines(input)
        .await
        .into_iter()
        .map(|l| l.unwrap())
        .collect();

    assert_eq!(
        lines,
        vec![
            "data: {\"a\":1}".to_string(),
            "data: {\"b\":2}".to_string(),
            String::new(),
            "tail".to_string(),
        ]
    );
}

#[tokio::test]
async fn crlf_line_endings_are_stripped() {
    let input = chunk_stream(vec!["data: {}\r\n", "data: []\r", "\n"]);
    let lines: Vec<String> = collect_lines(input)
        .await
        .into_iter()
        .map(|l| l.unwrap())
        .collect();
    assert_eq!(lines, vec!["data: {}".to_string(), "data: []".to_string()]);
}

#[tokio::test]
async fn invalid_utf8_is_replaced_not_rejected() {
    let chunks: Vec<Result<Bytes, String>> = vec![Ok(Bytes::from_static(b"data: \xff\xfe\n"))];
    let lines = collect_lines(tokio_stream::iter(chunks)).await;
    assert_eq!(lines.len(), 1);
    let line = lines[0].as_ref().unwrap();
    assert!(line.starts_with("data: "));
    assert!(line.contains('\u{FFFD}'));
}

#[tokio::test]
async fn empty_input_yields_no_lines() {
    let lines = collect_lines(chunk_stream(vec![])).await;
    assert!(lines.is_empty());
}

#[tokio::test]
async fn long_line_in_small_chunks_splits_in_linear_time() {
    let content = "x".repeat(1 << 20);
    let body = format!(
        "data: {{\"key\":[\"answer\",\"text\"],\"action\":\"append\",\"content\":\"{content}\"}}\n{CONTROL_LINE}\n"
    );
    let chunks: Vec<Result<Bytes, String>> = body
        .as_bytes()
        .chunks(64)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();

    let started = std::time::Instant::now();
    let lines = collect_lines(tokio_stream::iter(chunks)).await;
    let elapsed = started.elapsed();

    assert_eq!(lines.len(), 2);
    let long = lines[0].as_ref().unwrap();
    assert_eq!(long.len(), body.len() - CONTROL_LINE.len() - 2);
    assert!(long.ends_with("\"}"));
    assert_eq!(lines[1].as_ref().unwrap(), CONTROL_LINE);
    // Rescanning the buffer on every chunk takes tens of seconds here.
    assert!(elapsed < std::time::Duration::from_secs(5), "{elapsed:?}");
}

#[tokio::test]
async fn many_lines_in_one_chunk_come_out_in_order() {
    let body: String = (0..1000).map(|i| format!("{}\n", delta_line(i))).collect();
    let lines = collect_lines(chunk_stream(vec![body.as_str()])).await;

    assert_eq!(lines.len(), 1000);
    assert_eq!(lines[0].as_ref().unwrap(), &delta_line(0));
    assert_eq!(lines[999].as_ref().unwrap(), &delta_line(999));
}

// ---------------------------------------------------------------------------
// Test 6: upstream errors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn upstream_error_is_forwarded_and_ends_stream() {
    let chunks: Vec<Result<Bytes, String>> = vec![
        Ok(Bytes::from_static(b"data: {}\npartial")),
        Err("connection reset".to_string()),
        Ok(Bytes::from_static(b"never seen\n")),
    ];
    let lines = collect_lines(tokio_stream::iter(chunks)).await;

    assert_eq!(
        lines,
        vec![Ok("data: {}".to_string()), Err("connection reset".to_string())]
    );
}

// ---------------------------------------------------------------------------
// Test 7: frame stream skips blank lines
// ---------------------------------------------------------------------------

#[tokio::test]
async fn frame_stream_skips_blank_lines_and_keeps_garbage() {
    let decoder = StreamDecoder::default();
    let lines = vec![
        String::new(),
        "   ".to_string(),
        "data: {oops".to_string(),
        CONTROL_LINE.to_string(),
        String::new(),
    ];

    let frames = collect_frames(&decoder, lines).await;
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0].kind, FrameKind::Unrecognized);
    assert!(frames[1].is_control());
}

#[tokio::test]
async fn frame_stream_passes_errors_through() {
    let decoder = StreamDecoder::default();
    let input = tokio_stream::iter(vec![
        Ok(CONTROL_LINE.to_string()),
        Err("boom".to_string()),
    ]);
    let frames = decoder.frames(input);
    tokio::pin!(frames);

    assert!(frames.next().await.unwrap().unwrap().is_control());
    assert_eq!(frames.next().await.unwrap().unwrap_err(), "boom");
    assert!(frames.next().await.is_none());
}
