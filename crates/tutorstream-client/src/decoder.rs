// SPDX-FileCopyrightText: 2026 Tutorstream Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Incremental decoder for the `data: <json>\n` line protocol.
//!
//! Network chunks split frames at arbitrary byte offsets, and large inline
//! images can make a single frame arrive across many chunks. The decoder keeps
//! a carry buffer between calls and only hands complete [`Frame`]s to callers.
//!
//! A line that fails to parse is either re-buffered (it is probably the head of
//! a frame whose payload contained a raw newline), turned into a plain text
//! delta, or discarded. See [`try_recover_or_buffer`].

use tracing::{debug, trace, warn};
use tutorstream_config::DecoderConfig;

use crate::types::Frame;

/// Prefix every frame line starts with.
pub const ENVELOPE_PREFIX: &str = "data: ";

pub const DEFAULT_SHORT_RECOVERY_THRESHOLD: usize = 100;
pub const DEFAULT_LONG_RECOVERY_THRESHOLD: usize = 10_000;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Length cut-offs used when a line fails to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecoveryThresholds {
    /// JSON-looking payloads longer than this are treated as truncated.
    pub short: usize,
    /// Any payload longer than this is treated as truncated.
    pub long: usize,
    /// Re-buffered candidates larger than this are dropped.
    pub max_frame_bytes: usize,
}

impl Default for RecoveryThresholds {
    fn default() -> Self {
        Self {
            short: DEFAULT_SHORT_RECOVERY_THRESHOLD,
            long: DEFAULT_LONG_RECOVERY_THRESHOLD,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl From<&DecoderConfig> for RecoveryThresholds {
    fn from(config: &DecoderConfig) -> Self {
        Self {
            short: config.short_recovery_threshold,
            long: config.long_recovery_threshold,
            max_frame_bytes: config.max_frame_bytes,
        }
    }
}

/// What to do with a payload that failed to parse as a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovery {
    /// Put the line back and wait for more data.
    Rebuffer,
    /// Emit the payload as a raw text delta.
    TextFallback,
    /// Drop it.
    Discard,
}

/// Classifies a payload (the text after `data: `) that did not parse.
///
/// Rules, first match wins:
/// 1. empty: discard
/// 2. starts like JSON but does not end in `}` or `]`: re-buffer
/// 3. longer than `long`: re-buffer
/// 4. starts like JSON and longer than `short`: re-buffer
/// 5. starts like JSON: discard
/// 6. anything else: text fallback
pub fn try_recover_or_buffer(payload: &str, thresholds: &RecoveryThresholds) -> Recovery {
    let trimmed = payload.trim();
    if trimmed.is_empty() {
        return Recovery::Discard;
    }

    let looks_like_json = trimmed.starts_with('{') || trimmed.starts_with('[');
    let closed = trimmed.ends_with('}') || trimmed.ends_with(']');

    if looks_like_json && !closed {
        return Recovery::Rebuffer;
    }
    if payload.len() > thresholds.long {
        return Recovery::Rebuffer;
    }
    if looks_like_json && payload.len() > thresholds.short {
        return Recovery::Rebuffer;
    }
    if looks_like_json {
        return Recovery::Discard;
    }
    Recovery::TextFallback
}

enum Line {
    Frame(Frame),
    Skip,
    Rebuffer,
}

/// Stateful line decoder. One per exchange.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    /// Trailing bytes of an incomplete UTF-8 sequence from the last chunk.
    pending_bytes: Vec<u8>,
    thresholds: RecoveryThresholds,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_thresholds(thresholds: RecoveryThresholds) -> Self {
        Self {
            thresholds,
            ..Self::default()
        }
    }

    /// Bytes currently held back waiting for a newline.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len() + self.pending_bytes.len()
    }

    /// Appends raw bytes, holding back a split UTF-8 sequence at the end.
    pub fn feed_bytes(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let mut data = std::mem::take(&mut self.pending_bytes);
        data.extend_from_slice(bytes);

        let split = incomplete_utf8_tail(&data);
        self.pending_bytes = data.split_off(split);
        let text = String::from_utf8_lossy(&data).into_owned();
        self.feed(&text)
    }

    /// Appends text and returns every frame completed by it, in order.
    pub fn feed(&mut self, chunk: &str) -> Vec<Frame> {
        self.buffer.push_str(chunk);

        let mut frames = Vec::new();
        let mut cursor = 0;
        while let Some(newline) = self.buffer[cursor..].find('\n') {
            let end = cursor + newline;
            let line = self.buffer[cursor..end].trim_end_matches('\r');
            match self.decode_line(line) {
                Line::Frame(frame) => frames.push(frame),
                Line::Skip => {}
                Line::Rebuffer => {
                    // Rejoin the line with whatever follows and decode it again.
                    self.buffer.remove(end);
                    trace!(at = cursor, "re-buffered partial frame");
                    continue;
                }
            }
            cursor = end + 1;
        }
        self.buffer.drain(..cursor);

        if self.buffer.len() > self.thresholds.max_frame_bytes {
            warn!(
                buffered = self.buffer.len(),
                limit = self.thresholds.max_frame_bytes,
                "dropping oversized unterminated line"
            );
            self.buffer.clear();
        }
        frames
    }

    /// Decodes whatever is left at end of stream.
    ///
    /// Lines that still cannot be decoded are logged and dropped.
    pub fn flush(&mut self) -> Vec<Frame> {
        if !self.pending_bytes.is_empty() {
            debug!(
                bytes = self.pending_bytes.len(),
                "incomplete UTF-8 sequence at end of stream"
            );
            let tail = std::mem::take(&mut self.pending_bytes);
            self.buffer.push_str(&String::from_utf8_lossy(&tail));
        }

        let residue = std::mem::take(&mut self.buffer);
        let mut frames = Vec::new();
        for raw in residue.split('\n') {
            let line = raw.trim_end_matches('\r');
            match self.decode_line(line) {
                Line::Frame(frame) => frames.push(frame),
                Line::Skip => {}
                Line::Rebuffer => {
                    warn!(len = line.len(), "undecodable residue at end of stream");
                }
            }
        }
        frames
    }

    fn decode_line(&self, line: &str) -> Line {
        if line.is_empty() {
            return Line::Skip;
        }
        let Some(payload) = line.strip_prefix(ENVELOPE_PREFIX) else {
            debug!(line = %preview(line), "discarding non-frame line");
            return Line::Skip;
        };

        match serde_json::from_str::<Frame>(payload) {
            Ok(frame) => Line::Frame(frame),
            Err(e) if e.is_data() => {
                debug!(error = %e, payload = %preview(payload), "well-formed payload is not a frame");
                Line::Skip
            }
            Err(e) => match try_recover_or_buffer(payload, &self.thresholds) {
                Recovery::Rebuffer if line.len() > self.thresholds.max_frame_bytes => {
                    warn!(
                        len = line.len(),
                        limit = self.thresholds.max_frame_bytes,
                        "dropping oversized frame candidate"
                    );
                    Line::Skip
                }
                Recovery::Rebuffer => Line::Rebuffer,
                Recovery::TextFallback => Line::Frame(Frame::content_chunk(payload)),
                Recovery::Discard => {
                    debug!(error = %e, payload = %preview(payload), "discarding malformed frame");
                    Line::Skip
                }
            },
        }
    }
}

/// Index where an incomplete trailing UTF-8 sequence starts, or `bytes.len()`.
///
/// Invalid sequences earlier in the input are skipped; only an unexpected end
/// of input marks a tail to hold back.
fn incomplete_utf8_tail(bytes: &[u8]) -> usize {
    let mut offset = 0;
    loop {
        match std::str::from_utf8(&bytes[offset..]) {
            Ok(_) => return bytes.len(),
            Err(e) => match e.error_len() {
                None => return offset + e.valid_up_to(),
                Some(invalid) => offset += e.valid_up_to() + invalid,
            },
        }
    }
}

fn preview(text: &str) -> &str {
    match text.char_indices().nth(80) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
