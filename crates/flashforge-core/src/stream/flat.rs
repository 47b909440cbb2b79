//! Flat text decoding (format A)
//!
//! No framing is imposed here; the only job is turning bytes into text without
//! splitting a multi-byte character across two fragments.

use tracing::{debug, warn};

/// Decodes raw chunks into text fragments, holding back an incomplete UTF-8 tail
#[derive(Debug, Default)]
pub struct FlatTextDecoder {
    /// Bytes of a character that is still waiting for its continuation bytes
    pending: Vec<u8>,
    bytes_received: usize,
}

impl FlatTextDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode one chunk. Returns None when the chunk only extended a pending character.
    pub fn decode(&mut self, chunk: &[u8]) -> Option<String> {
        self.bytes_received += chunk.len();
        self.pending.extend_from_slice(chunk);

        let mut text = String::new();
        decode_utf8_prefix(&mut self.pending, &mut text);
        if !self.pending.is_empty() {
            debug!(
                "Holding {} bytes of a split character (total: {} bytes)",
                self.pending.len(),
                self.bytes_received
            );
        }
        (!text.is_empty()).then_some(text)
    }

    /// Flush at end of stream. A truncated character becomes U+FFFD.
    pub fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        warn!(
            "Stream ended inside a multi-byte character ({} bytes replaced)",
            self.pending.len()
        );
        let text = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        Some(text)
    }
}

/// Move the longest decodable prefix of `buf` into `out`.
///
/// Invalid sequences are replaced with U+FFFD; an incomplete sequence at the
/// very end stays in `buf`.
pub(crate) fn decode_utf8_prefix(buf: &mut Vec<u8>, out: &mut String) {
    loop {
        match std::str::from_utf8(buf) {
            Ok(text) => {
                out.push_str(text);
                buf.clear();
                return;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                out.push_str(&String::from_utf8_lossy(&buf[..valid]));
                match e.error_len() {
                    None => {
                        buf.drain(..valid);
                        return;
                    }
                    Some(len) => {
                        warn!("Replacing {} invalid UTF-8 bytes", len);
                        out.push(char::REPLACEMENT_CHARACTER);
                        buf.drain(..valid + len);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_multibyte_character() {
        let bytes = "Qué?".as_bytes();
        // 'é' is two bytes; split between them
        let mut decoder = FlatTextDecoder::new();
        assert_eq!(decoder.decode(&bytes[..3]).as_deref(), Some("Qu"));
        assert_eq!(decoder.decode(&bytes[3..]).as_deref(), Some("é?"));
        assert_eq!(decoder.finish(), None);
    }

    #[test]
    fn test_chunk_holding_only_part_of_a_character() {
        let bytes = "€".as_bytes();
        let mut decoder = FlatTextDecoder::new();
        assert_eq!(decoder.decode(&bytes[..1]), None);
        assert_eq!(decoder.decode(&bytes[1..2]), None);
        assert_eq!(decoder.decode(&bytes[2..]).as_deref(), Some("€"));
    }

    #[test]
    fn test_invalid_bytes_replaced() {
        let mut decoder = FlatTextDecoder::new();
        let text = decoder.decode(b"a\xffb").unwrap();
        assert_eq!(text, "a\u{FFFD}b");
    }

    #[test]
    fn test_truncated_character_flushed_lossy() {
        let mut decoder = FlatTextDecoder::new();
        assert_eq!(decoder.decode(&[0xE2, 0x82]), None);
        assert_eq!(decoder.finish().as_deref(), Some("\u{FFFD}"));
    }
}
