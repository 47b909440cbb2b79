//! Frames and per-session decoder selection

use serde::{Deserialize, Serialize};

use super::event_stream::EventStreamDecoder;
use super::flat::FlatTextDecoder;
use crate::error::GenerationError;

/// Wire encoding of a streaming response body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum WireEncoding {
    /// Delimiter-marked text (`CARD_START` ... `CARD_END`)
    Flat,
    /// Paired `event:` / `data:` lines
    EventStream,
}

impl WireEncoding {
    /// Pick the encoding announced by a response `Content-Type`
    pub fn from_content_type(content_type: Option<&str>) -> Self {
        match content_type {
            Some(value) if value.to_ascii_lowercase().contains("text/event-stream") => {
                WireEncoding::EventStream
            }
            _ => WireEncoding::Flat,
        }
    }
}

impl std::fmt::Display for WireEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireEncoding::Flat => write!(f, "flat"),
            WireEncoding::EventStream => write!(f, "event-stream"),
        }
    }
}

/// One structurally complete unit decoded from the wire
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Raw text fragment (format A)
    Text(String),
    /// Title event (format B)
    Title(String),
    /// Card event (format B); `index` is the backend's claimed sequence number
    Card {
        question: String,
        answer: String,
        index: Option<usize>,
    },
}

/// Frame decoder, selected once per session
#[derive(Debug)]
pub enum FrameDecoder {
    Flat(FlatTextDecoder),
    EventStream(EventStreamDecoder),
}

impl FrameDecoder {
    pub fn new(encoding: WireEncoding) -> Self {
        match encoding {
            WireEncoding::Flat => FrameDecoder::Flat(FlatTextDecoder::new()),
            WireEncoding::EventStream => FrameDecoder::EventStream(EventStreamDecoder::new()),
        }
    }

    pub fn encoding(&self) -> WireEncoding {
        match self {
            FrameDecoder::Flat(_) => WireEncoding::Flat,
            FrameDecoder::EventStream(_) => WireEncoding::EventStream,
        }
    }

    /// Decode one chunk, appending the frames it completes to `frames`.
    /// On a fault, frames decoded ahead of it are left in `frames`.
    pub fn decode(&mut self, chunk: &[u8], frames: &mut Vec<Frame>) -> Result<(), GenerationError> {
        match self {
            FrameDecoder::Flat(decoder) => {
                frames.extend(decoder.decode(chunk).map(Frame::Text));
                Ok(())
            }
            FrameDecoder::EventStream(decoder) => decoder.decode(chunk, frames),
        }
    }

    /// Flush whatever the end of stream completes
    pub fn finish(&mut self, frames: &mut Vec<Frame>) -> Result<(), GenerationError> {
        match self {
            FrameDecoder::Flat(decoder) => {
                frames.extend(decoder.finish().map(Frame::Text));
                Ok(())
            }
            FrameDecoder::EventStream(decoder) => decoder.finish(frames),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encoding_from_content_type() {
        assert_eq!(
            WireEncoding::from_content_type(Some("text/event-stream; charset=utf-8")),
            WireEncoding::EventStream
        );
        assert_eq!(
            WireEncoding::from_content_type(Some("Text/Event-Stream")),
            WireEncoding::EventStream
        );
        assert_eq!(
            WireEncoding::from_content_type(Some("text/plain")),
            WireEncoding::Flat
        );
        assert_eq!(WireEncoding::from_content_type(None), WireEncoding::Flat);
    }

    #[test]
    fn test_flat_decoder_passes_text_through() {
        let mut decoder = FrameDecoder::new(WireEncoding::Flat);
        assert_eq!(decoder.encoding(), WireEncoding::Flat);
        let mut frames = Vec::new();
        decoder.decode(b"CARD_ST", &mut frames).unwrap();
        assert_eq!(frames, vec![Frame::Text("CARD_ST".to_string())]);
        frames.clear();
        decoder.finish(&mut frames).unwrap();
        assert!(frames.is_empty());
    }
}
