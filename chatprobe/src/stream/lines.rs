// Copyright 2026 The Chatprobe Project
// SPDX-License-Identifier: Apache-2.0

// Line splitting
//
// Turns an upstream byte stream into complete text lines. Only the current
// partial line is held across chunk boundaries, so arbitrarily long streams
// never accumulate in memory.

use bytes::Bytes;
use futures_util::stream::{self, Stream, StreamExt};

struct LineState<S> {
    inner: S,
    /// Buffered bytes; everything before `head` has already been emitted.
    partial: Vec<u8>,
    head: usize,
    /// Bytes before this offset are known to hold no `\n`.
    scanned: usize,
    finished: bool,
}

impl<S> LineState<S> {
    /// Take the next complete line, searching only bytes not seen before.
    fn next_line(&mut self) -> Option<Vec<u8>> {
        match self.partial[self.scanned..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let end = self.scanned + offset;
                let line = self.partial[self.head..end].to_vec();
                self.head = end + 1;
                self.scanned = self.head;
                Some(line)
            }
            None => {
                self.scanned = self.partial.len();
                None
            }
        }
    }

    fn take_rest(&mut self) -> Vec<u8> {
        let rest = self.partial.split_off(self.head);
        self.reset();
        rest
    }

    fn push_chunk(&mut self, chunk: &[u8]) {
        if self.head > 0 {
            self.partial.drain(..self.head);
            self.scanned -= self.head;
            self.head = 0;
        }
        self.partial.extend_from_slice(chunk);
    }

    fn reset(&mut self) {
        self.partial.clear();
        self.head = 0;
        self.scanned = 0;
    }
}

/// Split a chunked byte stream into lines.
///
/// - `\n` terminates a line; a trailing `\r` is dropped.
/// - A final line without a terminator is emitted when the input ends.
/// - Invalid UTF-8 is replaced lossily rather than rejected.
/// - An upstream error is forwarded once and ends the line stream; the
///   partial line at that point is discarded.
pub fn split_lines<S, E>(input: S) -> impl Stream<Item = Result<String, E>>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
{
    let state = LineState {
        inner: input,
        partial: Vec::new(),
        head: 0,
        scanned: 0,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.next_line() {
                return Some((Ok(into_text(line)), state));
            }

            if state.finished {
                if state.head == state.partial.len() {
                    return None;
                }
                let rest = state.take_rest();
                return Some((Ok(into_text(rest)), state));
            }

            match state.inner.next().await {
                Some(Ok(chunk)) => state.push_chunk(&chunk),
                Some(Err(e)) => {
                    state.reset();
                    state.finished = true;
                    return Some((Err(e), state));
                }
                None => state.finished = true,
            }
        }
    })
}

fn into_text(mut line: Vec<u8>) -> String {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    match String::from_utf8(line) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}
