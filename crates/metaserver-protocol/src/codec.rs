//! Length-prefixed, NUL-delimited framing.
//!
//! Every message on the wire looks like this:
//!
//! ```text
//! ┌──────────┬─────────────────────────────────────────┐
//! │ len (BE) │ field₁ \0 field₂ \0 … fieldₙ \0          │
//! │ 2 bytes  │ `len` bytes                              │
//! └──────────┴─────────────────────────────────────────┘
//! ```
//!
//! `len` counts only the body, terminator of the last field included.
//!
//! TCP delivers a byte stream, not messages, so [`FrameDecoder`] keeps a
//! buffer: a read may end halfway through a frame (we wait for the rest)
//! or contain several frames back to back (we hand them out one by one).

use bytes::{Buf, BytesMut};

use crate::ProtocolError;

/// Size of the big-endian length prefix.
pub const HEADER_LEN: usize = 2;

/// Largest body the length prefix can describe.
pub const MAX_BODY_LEN: usize = u16::MAX as usize;

/// Field terminator.
const NUL: u8 = 0;

/// Encodes a sequence of fields into one frame.
///
/// # Errors
/// - [`ProtocolError::NulInField`] if a field contains a NUL byte.
/// - [`ProtocolError::FrameTooLarge`] if the body exceeds 65535 bytes.
pub fn encode_frame<I, F>(fields: I) -> Result<Vec<u8>, ProtocolError>
where
    I: IntoIterator<Item = F>,
    F: AsRef<[u8]>,
{
    let mut out = vec![0u8; HEADER_LEN];
    for (index, field) in fields.into_iter().enumerate() {
        let field = field.as_ref();
        if field.contains(&NUL) {
            return Err(ProtocolError::NulInField(index));
        }
        out.extend_from_slice(field);
        out.push(NUL);
    }

    let body_len = out.len() - HEADER_LEN;
    let len = u16::try_from(body_len)
        .map_err(|_| ProtocolError::FrameTooLarge(body_len))?;
    out[..HEADER_LEN].copy_from_slice(&len.to_be_bytes());
    Ok(out)
}

/// Splits a complete frame body into its fields.
fn split_body(body: &[u8]) -> Result<Vec<Vec<u8>>, ProtocolError> {
    match body.split_last() {
        None => Err(ProtocolError::EmptyFrame),
        Some((&last, _)) if last != NUL => Err(ProtocolError::MissingTerminator),
        Some((_, rest)) => {
            Ok(rest.split(|b| *b == NUL).map(<[u8]>::to_vec).collect())
        }
    }
}

/// Reassembles frames from an arbitrary sequence of reads.
///
/// ```rust
/// use metaserver_protocol::FrameDecoder;
///
/// let mut decoder = FrameDecoder::new();
///
/// // One frame split over two reads.
/// decoder.extend(b"\x00\x08CLI");
/// assert!(decoder.next_frame().is_none());
/// decoder.extend(b"ENTS\x00");
///
/// let fields = decoder.next_frame().unwrap().unwrap();
/// assert_eq!(fields, vec![b"CLIENTS".to_vec()]);
/// ```
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    /// Creates an empty decoder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly received bytes to the buffer.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Takes the next complete frame out of the buffer.
    ///
    /// Returns `None` while the buffer holds less than one full frame,
    /// including when the declared length runs past the bytes we have.
    /// A complete but malformed frame is consumed and returned as `Err`,
    /// so the stream stays in sync.
    pub fn next_frame(
        &mut self,
    ) -> Option<Result<Vec<Vec<u8>>, ProtocolError>> {
        if self.buf.len() < HEADER_LEN {
            return None;
        }
        let len = u16::from_be_bytes([self.buf[0], self.buf[1]]) as usize;
        if self.buf.len() < HEADER_LEN + len {
            return None;
        }

        self.buf.advance(HEADER_LEN);
        let body = self.buf.split_to(len);
        Some(split_body(&body))
    }

    /// Number of bytes waiting for the rest of their frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(raw: &[&str]) -> Vec<Vec<u8>> {
        raw.iter().map(|f| f.as_bytes().to_vec()).collect()
    }

    #[test]
    fn test_encode_frame_single_field() {
        let bytes = encode_frame(["PING"]).unwrap();
        assert_eq!(bytes, b"\x00\x05PING\x00");
    }

    #[test]
    fn test_encode_frame_counts_every_terminator() {
        let bytes = encode_frame(["LOGIN", "bert", "UNREGISTERED"]).unwrap();
        // 6 + 5 + 13 body bytes.
        assert_eq!(&bytes[..2], &[0, 24]);
        assert_eq!(&bytes[2..], b"LOGIN\0bert\0UNREGISTERED\0");
    }

    #[test]
    fn test_encode_frame_keeps_empty_fields() {
        let bytes = encode_frame(["CHAT", "", "hi", "system"]).unwrap();
        assert_eq!(&bytes[2..], b"CHAT\0\0hi\0system\0");
    }

    #[test]
    fn test_encode_frame_rejects_nul_inside_field() {
        let result = encode_frame(["CHAT", "a\0b"]);
        assert_eq!(result, Err(ProtocolError::NulInField(1)));
    }

    #[test]
    fn test_encode_frame_rejects_oversize_body() {
        let huge = "x".repeat(MAX_BODY_LEN);
        let result = encode_frame(["CHAT", huge.as_str()]);
        assert!(matches!(result, Err(ProtocolError::FrameTooLarge(_))));
    }

    #[test]
    fn test_next_frame_waits_for_header() {
        let mut d = FrameDecoder::new();
        d.extend(b"\x00");
        assert!(d.next_frame().is_none());
        assert_eq!(d.buffered(), 1);
    }

    #[test]
    fn test_next_frame_waits_when_length_exceeds_data() {
        // Garbage with a huge declared length just sits in the buffer.
        let mut d = FrameDecoder::new();
        d.extend(b"\xff\x37lkjdflsjflkjsf");
        assert!(d.next_frame().is_none());
    }

    #[test]
    fn test_next_frame_splits_pipelined_frames_in_order() {
        let mut d = FrameDecoder::new();
        let mut wire = encode_frame(["CLIENTS"]).unwrap();
        wire.extend(encode_frame(["GAMES"]).unwrap());
        d.extend(&wire);

        assert_eq!(d.next_frame().unwrap().unwrap(), fields(&["CLIENTS"]));
        assert_eq!(d.next_frame().unwrap().unwrap(), fields(&["GAMES"]));
        assert!(d.next_frame().is_none());
        assert_eq!(d.buffered(), 0);
    }

    #[test]
    fn test_next_frame_reassembles_across_reads() {
        let mut d = FrameDecoder::new();
        d.extend(b"\x00\x08CLI");
        assert!(d.next_frame().is_none());
        d.extend(b"ENTS\x00\x00\x08");
        assert_eq!(d.next_frame().unwrap().unwrap(), fields(&["CLIENTS"]));
        // The next frame's header is already buffered.
        assert!(d.next_frame().is_none());
        d.extend(b"CLIENTS\x00");
        assert_eq!(d.next_frame().unwrap().unwrap(), fields(&["CLIENTS"]));
    }

    #[test]
    fn test_next_frame_empty_body_is_error() {
        let mut d = FrameDecoder::new();
        d.extend(b"\x00\x00");
        assert_eq!(d.next_frame(), Some(Err(ProtocolError::EmptyFrame)));
        assert_eq!(d.buffered(), 0);
    }

    #[test]
    fn test_next_frame_unterminated_body_is_error_and_resyncs() {
        let mut d = FrameDecoder::new();
        d.extend(b"\x00\x03abc");
        d.extend(&encode_frame(["PONG"]).unwrap());
        assert_eq!(
            d.next_frame(),
            Some(Err(ProtocolError::MissingTerminator))
        );
        assert_eq!(d.next_frame().unwrap().unwrap(), fields(&["PONG"]));
    }

    #[test]
    fn test_next_frame_trailing_empty_field() {
        let mut d = FrameDecoder::new();
        d.extend(&encode_frame(["CHAT", "hello", ""]).unwrap());
        assert_eq!(
            d.next_frame().unwrap().unwrap(),
            fields(&["CHAT", "hello", ""])
        );
    }
}
