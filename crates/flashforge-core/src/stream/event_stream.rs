//! Event-stream decoding (format B)
//!
//! The body is newline-terminated text. A frame is the pair
//! `event: <type>` followed by `data: <json>`; the bytes of a frame stay in the
//! buffer until both lines are complete, so any chunk boundary (including one
//! inside a multi-byte character) is harmless. Lines are decoded only once
//! their terminating newline has arrived.

use std::time::Instant;

use serde::Deserialize;
use tracing::{debug, info, warn};

use super::frame::Frame;
use crate::error::GenerationError;

/// Longest line accepted before the framing is considered unrecoverable
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Deserialize)]
struct TitlePayload {
    title: String,
}

#[derive(Debug, Deserialize)]
struct CardPayload {
    question: String,
    answer: String,
    #[serde(default)]
    index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    message: Option<String>,
}

/// An `event:` line whose `data:` line has not arrived yet
#[derive(Debug)]
struct PendingEvent {
    kind: String,
    /// Offset of the `event:` line in the buffer
    start: usize,
}

/// Incremental decoder for paired `event:` / `data:` lines
#[derive(Debug)]
pub struct EventStreamDecoder {
    /// Undelivered bytes: a pending frame and/or a partial line
    buffer: Vec<u8>,
    /// Offset of the first line not yet examined
    cursor: usize,
    /// Bytes before this offset hold no newline past `cursor`
    scanned_to: usize,
    pending: Option<PendingEvent>,
    /// Set once an error frame was seen; nothing after it is decoded
    terminated: bool,
    stream_start: Instant,
    event_count: usize,
    bytes_received: usize,
}

impl Default for EventStreamDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl EventStreamDecoder {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            cursor: 0,
            scanned_to: 0,
            pending: None,
            terminated: false,
            stream_start: Instant::now(),
            event_count: 0,
            bytes_received: 0,
        }
    }

    /// Decode one chunk, appending every frame it completes to `frames`.
    /// Frames decoded before a fault are still appended.
    pub fn decode(&mut self, chunk: &[u8], frames: &mut Vec<Frame>) -> Result<(), GenerationError> {
        if self.terminated {
            return Ok(());
        }
        self.bytes_received += chunk.len();
        self.buffer.extend_from_slice(chunk);
        debug!(
            "Event-stream chunk received: {} bytes (total: {} bytes)",
            chunk.len(),
            self.bytes_received
        );

        loop {
            let search_from = self.scanned_to.max(self.cursor);
            let Some(offset) = self.buffer[search_from..].iter().position(|&b| b == b'\n')
            else {
                self.scanned_to = self.buffer.len();
                break;
            };
            let line_start = self.cursor;
            let line_end = search_from + offset;
            self.cursor = line_end + 1;
            let line = decode_line(&self.buffer[line_start..line_end]);
            self.handle_line(&line, line_start, frames)?;
        }

        if self.buffer.len() - self.cursor > MAX_LINE_BYTES {
            return Err(GenerationError::MalformedFrame(format!(
                "line exceeds {} bytes without a newline",
                MAX_LINE_BYTES
            )));
        }

        self.compact();
        Ok(())
    }

    /// Flush at end of stream: an unterminated final line is still examined
    pub fn finish(&mut self, frames: &mut Vec<Frame>) -> Result<(), GenerationError> {
        if self.terminated {
            return Ok(());
        }
        if self.cursor < self.buffer.len() {
            let line_start = self.cursor;
            self.cursor = self.buffer.len();
            let line = decode_line(&self.buffer[line_start..]);
            self.handle_line(&line, line_start, frames)?;
        }
        if let Some(pending) = self.pending.take() {
            warn!(
                "Stream ended after 'event: {}' without its data line",
                pending.kind
            );
        }
        info!(
            "Event stream finished: {:?} elapsed, {} events, {} bytes total",
            self.stream_start.elapsed(),
            self.event_count,
            self.bytes_received
        );
        self.buffer.clear();
        self.cursor = 0;
        self.scanned_to = 0;
        Ok(())
    }

    fn handle_line(
        &mut self,
        line: &str,
        line_start: usize,
        frames: &mut Vec<Frame>,
    ) -> Result<(), GenerationError> {
        // A blank line ends the event; `data:` must follow `event:` directly
        if line.trim().is_empty() {
            if let Some(pending) = self.pending.take() {
                warn!(
                    "Dropping 'event: {}', blank line before its data line",
                    pending.kind
                );
            }
            return Ok(());
        }
        if line.starts_with(':') {
            return Ok(());
        }

        if let Some(kind) = field_value(line, "event") {
            if let Some(previous) = &self.pending {
                warn!(
                    "'event: {}' had no data line, superseded by 'event: {}'",
                    previous.kind, kind
                );
            }
            self.pending = Some(PendingEvent {
                kind: kind.trim().to_string(),
                start: line_start,
            });
            return Ok(());
        }

        if let Some(data) = field_value(line, "data") {
            match self.pending.take() {
                Some(pending) => self.dispatch(&pending.kind, data, frames)?,
                None => warn!("Skipping data line without an event type: {}", data),
            }
            return Ok(());
        }

        if let Some(pending) = self.pending.take() {
            warn!(
                "Dropping 'event: {}', next line was not its data: {}",
                pending.kind, line
            );
        } else {
            warn!("Skipping unrecognized event-stream line: {}", line);
        }
        Ok(())
    }

    fn dispatch(
        &mut self,
        kind: &str,
        data: &str,
        frames: &mut Vec<Frame>,
    ) -> Result<(), GenerationError> {
        self.event_count += 1;
        let elapsed = self.stream_start.elapsed();
        debug!("Event #{} at {:?}: type={}", self.event_count, elapsed, kind);

        match kind {
            "title" => {
                let payload: TitlePayload = parse_payload(kind, data)?;
                frames.push(Frame::Title(payload.title));
            }
            "card" => {
                let payload: CardPayload = parse_payload(kind, data)?;
                debug!(
                    "  -> card index={:?}, question={} chars",
                    payload.index,
                    payload.question.len()
                );
                frames.push(Frame::Card {
                    question: payload.question,
                    answer: payload.answer,
                    index: payload.index,
                });
            }
            "error" => {
                self.terminated = true;
                let message = match serde_json::from_str::<ErrorPayload>(data) {
                    Ok(payload) => payload
                        .error
                        .or(payload.message)
                        .unwrap_or_else(|| "backend reported an error".to_string()),
                    Err(_) => data.trim().to_string(),
                };
                warn!("Error frame received at {:?}: {}", elapsed, message);
                return Err(GenerationError::Upstream(message));
            }
            other => debug!("  -> skipping unknown event type '{}'", other),
        }
        Ok(())
    }

    /// Drop every byte that no pending frame still needs
    fn compact(&mut self) {
        let keep_from = self
            .pending
            .as_ref()
            .map_or(self.cursor, |pending| pending.start);
        if keep_from == 0 {
            return;
        }
        self.buffer.drain(..keep_from);
        self.cursor -= keep_from;
        self.scanned_to = self.scanned_to.saturating_sub(keep_from);
        if let Some(pending) = self.pending.as_mut() {
            pending.start = 0;
        }
    }
}

/// Decode one complete line, tolerating `\r\n` endings
fn decode_line(bytes: &[u8]) -> String {
    let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(line) => line.to_string(),
        Err(_) => {
            warn!("Event-stream line is not valid UTF-8, decoding lossily");
            String::from_utf8_lossy(bytes).into_owned()
        }
    }
}

/// Value of a `name: value` line (the space after the colon is optional)
fn field_value<'a>(line: &'a str, name: &str) -> Option<&'a str> {
    let value = line.strip_prefix(name)?.strip_prefix(':')?;
    Some(value.strip_prefix(' ').unwrap_or(value))
}

fn parse_payload<T: for<'de> Deserialize<'de>>(
    kind: &str,
    data: &str,
) -> Result<T, GenerationError> {
    serde_json::from_str(data).map_err(|e| {
        GenerationError::MalformedFrame(format!("invalid '{}' payload ({}): {}", kind, e, data))
    })
}
