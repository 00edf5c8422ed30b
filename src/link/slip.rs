//! SLIP framing (RFC 1055).
//!
//! Encoding is stateless. Decoding is a streaming state machine that keeps
//! partial frames across calls, so bytes may arrive split or coalesced in any
//! way the physical link chooses.

use tracing::debug;

use crate::core::constants::{SLIP_END, SLIP_ESC, SLIP_ESC_END, SLIP_ESC_ESC};

/// One framing engine per physical link.
#[derive(Debug, Clone, Default)]
pub struct SlipCodec {
    /// The previous byte was `SLIP_ESC`.
    escaped: bool,
    /// A protocol violation was seen; drop bytes until the next `SLIP_END`.
    discarding: bool,
    /// Bytes of the frame being assembled.
    buffer: Vec<u8>,
}

impl SlipCodec {
    /// Create a codec with empty state.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap a datagram in delimiters, escaping reserved bytes.
    pub fn encode(datagram: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(datagram.len() + 2);
        frame.push(SLIP_END);
        for &byte in datagram {
            match byte {
                SLIP_END => frame.extend_from_slice(&[SLIP_ESC, SLIP_ESC_END]),
                SLIP_ESC => frame.extend_from_slice(&[SLIP_ESC, SLIP_ESC_ESC]),
                other => frame.push(other),
            }
        }
        frame.push(SLIP_END);
        frame
    }

    /// Feed raw bytes and collect every datagram whose closing delimiter arrived.
    pub fn decode(&mut self, bytes: &[u8]) -> Vec<Vec<u8>> {
        let mut datagrams = Vec::new();

        for &byte in bytes {
            if byte == SLIP_END {
                if self.escaped {
                    debug!(len = self.buffer.len(), "slip frame ended inside an escape");
                }
                // A pending escape is discarded; the bytes before it still count.
                if !self.discarding && !self.buffer.is_empty() {
                    datagrams.push(std::mem::take(&mut self.buffer));
                }
                self.reset();
                continue;
            }

            if self.discarding {
                continue;
            }

            if self.escaped {
                self.escaped = false;
                match byte {
                    SLIP_ESC_END => self.buffer.push(SLIP_END),
                    SLIP_ESC_ESC => self.buffer.push(SLIP_ESC),
                    other => {
                        debug!(byte = other, "invalid slip escape, resynchronizing");
                        self.buffer.clear();
                        self.discarding = true;
                    }
                }
            } else if byte == SLIP_ESC {
                self.escaped = true;
            } else {
                self.buffer.push(byte);
            }
        }

        datagrams
    }

    /// Bytes buffered for the frame in progress.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    fn reset(&mut self) {
        self.escaped = false;
        self.discarding = false;
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_escapes_reserved_bytes() {
        let frame = SlipCodec::encode(&[0x01, SLIP_END, 0x02, SLIP_ESC, 0x03]);
        assert_eq!(
            frame,
            vec![
                SLIP_END, 0x01, SLIP_ESC, SLIP_ESC_END, 0x02, SLIP_ESC, SLIP_ESC_ESC, 0x03,
                SLIP_END
            ]
        );
    }

    #[test]
    fn test_encode_plain_bytes_untouched() {
        assert_eq!(SlipCodec::encode(b"abc"), vec![SLIP_END, b'a', b'b', b'c', SLIP_END]);
    }

    #[test]
    fn test_roundtrip_any_chunking() {
        let datagram: Vec<u8> = (0..=255u8).chain([SLIP_END, SLIP_ESC, SLIP_END]).collect();
        let frame = SlipCodec::encode(&datagram);

        for chunk_size in 1..=frame.len() {
            let mut codec = SlipCodec::new();
            let mut out = Vec::new();
            for chunk in frame.chunks(chunk_size) {
                out.extend(codec.decode(chunk));
            }
            assert_eq!(out, vec![datagram.clone()], "chunk size {chunk_size}");
            assert_eq!(codec.pending(), 0);
        }
    }

    #[test]
    fn test_split_inside_escape() {
        let frame = SlipCodec::encode(&[SLIP_ESC]);
        assert_eq!(frame.len(), 4);

        let mut codec = SlipCodec::new();
        assert!(codec.decode(&frame[..2]).is_empty());
        assert_eq!(codec.decode(&frame[2..]), vec![vec![SLIP_ESC]]);
    }

    #[test]
    fn test_coalesced_frames() {
        let mut stream = SlipCodec::encode(b"one");
        stream.extend(SlipCodec::encode(b"two"));
        stream.extend(SlipCodec::encode(b"three"));

        let mut codec = SlipCodec::new();
        let out = codec.decode(&stream);
        assert_eq!(out, vec![b"one".to_vec(), b"two".to_vec(), b"three".to_vec()]);
    }

    #[test]
    fn test_repeated_delimiters_are_padding() {
        let mut codec = SlipCodec::new();
        assert!(codec.decode(&[SLIP_END, SLIP_END, SLIP_END]).is_empty());
        assert_eq!(
            codec.decode(&[b'x', SLIP_END, SLIP_END]),
            vec![b"x".to_vec()]
        );
    }

    #[test]
    fn test_partial_frame_waits_for_delimiter() {
        let mut codec = SlipCodec::new();
        assert!(codec.decode(&[SLIP_END, 1, 2, 3]).is_empty());
        assert_eq!(codec.pending(), 3);
        assert!(codec.decode(&[4, 5]).is_empty());
        assert_eq!(codec.decode(&[SLIP_END]), vec![vec![1, 2, 3, 4, 5]]);
    }

    #[test]
    fn test_invalid_escape_resynchronizes() {
        let mut codec = SlipCodec::new();
        let mut stream = vec![SLIP_END, 1, 2, SLIP_ESC, 0x42, 3, 4, SLIP_END];
        stream.extend(SlipCodec::encode(b"ok"));

        assert_eq!(codec.decode(&stream), vec![b"ok".to_vec()]);
        assert_eq!(codec.pending(), 0);
    }

    #[test]
    fn test_frame_ending_in_escape_discards_escape() {
        let mut codec = SlipCodec::new();
        assert_eq!(
            codec.decode(&[SLIP_END, 1, 2, SLIP_ESC, SLIP_END]),
            vec![vec![1, 2]]
        );
        // The escape does not leak into the next frame.
        assert_eq!(codec.decode(&[SLIP_ESC_END, 7, SLIP_END]), vec![vec![SLIP_ESC_END, 7]]);
        // An escape alone is an empty frame.
        assert!(codec.decode(&[SLIP_ESC, SLIP_END]).is_empty());
    }
}
