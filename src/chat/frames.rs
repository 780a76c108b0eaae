//! Decoder for the tutor's server-sent event stream.
//!
//! Frames are newline-delimited `data: <json>` lines carrying a text delta
//! at `choices[0].delta.content`, terminated by `data: [DONE]` or by the
//! end of the stream. Comment lines (`:`) and other fields are skipped.

use serde_json::Value;

const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";

/// Incremental SSE decoder.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
    /// An unparseable frame was put back and gets one more try.
    retrying: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the `[DONE]` marker has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed raw bytes; returns the text deltas completed by them.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut deltas = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.buffer.drain(..=newline).collect();
            let line = String::from_utf8_lossy(&raw[..raw.len() - 1]).into_owned();

            match self.decode_line(&line) {
                Frame::Skip => {}
                Frame::Done => {
                    self.done = true;
                    self.buffer.clear();
                    break;
                }
                Frame::Delta(text) => {
                    self.retrying = false;
                    deltas.push(text);
                }
                Frame::Incomplete if self.retrying => {
                    tracing::warn!(frame = %line, "dropping malformed chat frame");
                    self.retrying = false;
                }
                Frame::Incomplete => {
                    // Put the frame back and wait for more bytes
                    let mut restored = raw;
                    restored.extend_from_slice(&self.buffer);
                    self.buffer = restored;
                    self.retrying = true;
                    break;
                }
            }
        }
        deltas
    }

    /// Flush at end of stream; a final frame without a newline still counts.
    pub fn finish(&mut self) -> Vec<String> {
        if self.done || self.buffer.is_empty() {
            return Vec::new();
        }
        self.retrying = true;
        let mut deltas = self.push(b"\n");
        self.done = true;
        self.buffer.clear();
        deltas.retain(|d| !d.is_empty());
        deltas
    }

    fn decode_line(&self, line: &str) -> Frame {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.trim().is_empty() || line.starts_with(':') {
            return Frame::Skip;
        }
        let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
            return Frame::Skip;
        };
        let payload = payload.trim();
        if payload == DONE_MARKER {
            return Frame::Done;
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(value) => match value
                .pointer("/choices/0/delta/content")
                .and_then(Value::as_str)
            {
                Some(text) if !text.is_empty() => Frame::Delta(text.to_string()),
                _ => Frame::Skip,
            },
            Err(_) => Frame::Incomplete,
        }
    }
}

enum Frame {
    Skip,
    Done,
    Delta(String),
    Incomplete,
}
