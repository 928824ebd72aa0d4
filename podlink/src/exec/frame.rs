//! Multiplexed stdio frame codec for non-TTY channels.
//!
//! Wire format, repeated until the channel closes:
//!
//! ```text
//! [stream tag (1 byte)][reserved (3 bytes)][payload size (4 bytes BE)][payload]
//! ```
//!
//! Tag 0 is stdin, 1 stdout, 2 stderr. Writes to the channel are raw stdin
//! bytes and carry no framing; only the read path is multiplexed.

use crate::errors::{PodlinkError, PodlinkResult};

/// Frame header size.
pub const HEADER_LEN: usize = 8;

/// Stream a frame belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Stdin,
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn tag(&self) -> u8 {
        match self {
            StreamKind::Stdin => 0,
            StreamKind::Stdout => 1,
            StreamKind::Stderr => 2,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(StreamKind::Stdin),
            1 => Some(StreamKind::Stdout),
            2 => Some(StreamKind::Stderr),
            _ => None,
        }
    }
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: StreamKind,
    pub payload: Vec<u8>,
}

/// Encode a frame for the wire.
pub fn encode_frame(kind: StreamKind, payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + payload.len());
    out.push(kind.tag());
    out.extend_from_slice(&[0, 0, 0]);
    out.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    out.extend_from_slice(payload);
    out
}

/// Incremental frame decoder.
///
/// Feed arbitrary chunks as they arrive off the transport, then drain
/// complete frames. Partial frames stay buffered until the rest shows up.
#[derive(Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append transport bytes to the internal buffer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete frame, if any.
    ///
    /// An unrecognized stream tag means the peer is not speaking the
    /// multiplexed protocol; that is unrecoverable for this channel.
    pub fn next_frame(&mut self) -> PodlinkResult<Option<Frame>> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let kind = StreamKind::from_tag(self.buf[0]).ok_or_else(|| {
            PodlinkError::Protocol(format!("unknown stream tag {:#x}", self.buf[0]))
        })?;

        let size = u32::from_be_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]]) as usize;
        let frame_end = HEADER_LEN + size;
        if self.buf.len() < frame_end {
            return Ok(None);
        }

        let payload = self.buf[HEADER_LEN..frame_end].to_vec();
        self.buf.drain(..frame_end);
        Ok(Some(Frame { kind, payload }))
    }

    /// Bytes buffered but not yet consumed as a frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_single_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&encode_frame(StreamKind::Stdout, b"test\n"));

        let frame = decoder.next_frame().unwrap().unwrap();
        assert_eq!(frame.kind, StreamKind::Stdout);
        assert_eq!(frame.payload, b"test\n");
        assert!(decoder.next_frame().unwrap().is_none());
        assert_eq!(decoder.pending(), 0);
    }

    #[test]
    fn test_partial_header_then_rest() {
        let wire = encode_frame(StreamKind::Stderr, b"oops");
        let mut decoder = FrameDecoder::new();

        decoder.feed(&wire[..3]);
        assert!(decoder.next_frame().unwrap().is_none());

        decoder.feed(&wire[3..]);
        let frame = decoder.next_frame().unwrap().unwrap();
        assert_eq!(frame.kind, StreamKind::Stderr);
        assert_eq!(frame.payload, b"oops");
    }

    #[test]
    fn test_back_to_back_frames() {
        let mut wire = encode_frame(StreamKind::Stdout, b"a");
        wire.extend(encode_frame(StreamKind::Stderr, b"b"));

        let mut decoder = FrameDecoder::new();
        decoder.feed(&wire);

        assert_eq!(decoder.next_frame().unwrap().unwrap().kind, StreamKind::Stdout);
        assert_eq!(decoder.next_frame().unwrap().unwrap().kind, StreamKind::Stderr);
        assert!(decoder.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_empty_payload_frame() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&encode_frame(StreamKind::Stdout, b""));

        let frame = decoder.next_frame().unwrap().unwrap();
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn test_unknown_tag_is_protocol_error() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&[9, 0, 0, 0, 0, 0, 0, 1, b'x']);

        assert!(matches!(
            decoder.next_frame().unwrap_err(),
            PodlinkError::Protocol(_)
        ));
    }

    proptest! {
        /// Decoding is invariant under how the wire bytes are chunked.
        #[test]
        fn decode_survives_arbitrary_chunking(
            payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..64), 1..8),
            split in 1usize..16,
        ) {
            let mut wire = Vec::new();
            for (i, p) in payloads.iter().enumerate() {
                let kind = if i % 2 == 0 { StreamKind::Stdout } else { StreamKind::Stderr };
                wire.extend(encode_frame(kind, p));
            }

            let mut decoder = FrameDecoder::new();
            let mut decoded = Vec::new();
            for chunk in wire.chunks(split) {
                decoder.feed(chunk);
                while let Some(frame) = decoder.next_frame().unwrap() {
                    decoded.push(frame.payload);
                }
            }

            prop_assert_eq!(decoded, payloads);
            prop_assert_eq!(decoder.pending(), 0);
        }
    }
}
