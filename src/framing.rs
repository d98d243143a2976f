//! Message boundaries on the relay byte stream.
//!
//! TCP delivers a byte stream, so the client needs a rule for where one
//! message ends. [`Framing`] selects that rule. `LengthPrefixed` and
//! `Delimited` carry explicit boundaries and tolerate messages split across
//! many reads. `Burst` reproduces the legacy relay convention where each
//! drained readiness burst is one message; it only works while the peer
//! writes each message in one go and the client keeps up.

use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tokio_util::codec::{
    AnyDelimiterCodec,
    AnyDelimiterCodecError,
    Decoder,
    Encoder,
    LengthDelimitedCodec,
};

use crate::buffer::ReceiveBuffer;

/// Largest message accepted or produced by default.
pub const DEFAULT_MAX_FRAME_LENGTH: usize = 1024 * 1024;

/// Rule used to split the byte stream into messages.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Framing {
    /// Four-byte big-endian length prefix before each message.
    #[default]
    LengthPrefixed,
    /// Each message is terminated by the given byte.
    Delimited(u8),
    /// Each drained readiness burst is one message.
    Burst,
}

impl Framing {
    /// Build the stateful codec implementing this rule.
    #[must_use]
    pub fn codec(self, max_frame_length: usize) -> FrameCodec {
        let kind = match self {
            Self::LengthPrefixed => CodecKind::LengthPrefixed(length_codec(max_frame_length)),
            Self::Delimited(byte) => CodecKind::Delimited(AnyDelimiterCodec::new_with_max_length(
                vec![byte],
                vec![byte],
                max_frame_length,
            )),
            Self::Burst => CodecKind::Burst,
        };
        FrameCodec {
            kind,
            max_frame_length,
        }
    }
}

fn length_codec(max_frame_length: usize) -> LengthDelimitedCodec {
    LengthDelimitedCodec::builder()
        .length_field_length(4)
        .big_endian()
        .max_frame_length(max_frame_length)
        .new_codec()
}

/// Errors raised while splitting or producing frames.
#[derive(Debug, Error)]
pub enum FramingError {
    /// A message exceeds the configured maximum.
    #[error("frame of {len} bytes exceeds maximum of {max}")]
    FrameTooLarge { len: usize, max: usize },
    /// The length prefix was rejected; buffered bytes were discarded.
    #[error("invalid length-prefixed frame: {0}")]
    Length(#[source] std::io::Error),
    /// The delimiter codec rejected its input.
    #[error("invalid delimited frame: {0}")]
    Delimited(#[from] AnyDelimiterCodecError),
}

enum CodecKind {
    LengthPrefixed(LengthDelimitedCodec),
    Delimited(AnyDelimiterCodec),
    Burst,
}

/// Stateful encoder/decoder for one connection.
pub struct FrameCodec {
    kind: CodecKind,
    max_frame_length: usize,
}

impl std::fmt::Debug for FrameCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match self.kind {
            CodecKind::LengthPrefixed(_) => "length-prefixed",
            CodecKind::Delimited(_) => "delimited",
            CodecKind::Burst => "burst",
        };
        f.debug_struct("FrameCodec")
            .field("kind", &kind)
            .field("max_frame_length", &self.max_frame_length)
            .finish()
    }
}

impl FrameCodec {
    /// Prepare `buf` for a new readiness burst.
    ///
    /// Burst framing starts every burst from an empty buffer. Explicit
    /// framings keep a partial trailing frame for the next burst.
    pub fn begin_burst(&self, buf: &mut ReceiveBuffer) {
        if matches!(self.kind, CodecKind::Burst) {
            buf.clear();
        }
    }

    /// Move every complete frame out of `buf` into `out`.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError`] when the stream violates the framing rule.
    /// Frames decoded alongside the error are still pushed to `out`.
    ///
    /// - A rejected length prefix desynchronises the stream, so the whole
    ///   buffer is discarded.
    /// - An oversized delimited message is skipped up to its delimiter and
    ///   decoding continues with the messages after it.
    /// - An oversized burst is discarded.
    pub fn decode_available(
        &mut self,
        buf: &mut ReceiveBuffer,
        out: &mut Vec<Bytes>,
    ) -> Result<(), FramingError> {
        match &mut self.kind {
            CodecKind::Burst => {
                let len = buf.len();
                if len > self.max_frame_length {
                    buf.clear();
                    return Err(FramingError::FrameTooLarge {
                        len,
                        max: self.max_frame_length,
                    });
                }
                if len > 0 {
                    out.push(buf.bytes_mut().split().freeze());
                }
                Ok(())
            }
            CodecKind::LengthPrefixed(codec) => loop {
                match codec.decode(buf.bytes_mut()) {
                    Ok(Some(frame)) => out.push(frame.freeze()),
                    Ok(None) => return Ok(()),
                    Err(e) => {
                        buf.clear();
                        *codec = length_codec(self.max_frame_length);
                        return Err(FramingError::Length(e));
                    }
                }
            },
            CodecKind::Delimited(codec) => {
                // After an error the codec is in discard mode and makes
                // progress on every call.
                let mut first_error = None;
                loop {
                    match codec.decode(buf.bytes_mut()) {
                        Ok(Some(frame)) => out.push(frame),
                        Ok(None) => break,
                        Err(e) => {
                            first_error.get_or_insert(e);
                        }
                    }
                }
                first_error.map_or(Ok(()), |e| Err(e.into()))
            }
        }
    }

    /// Flush what remains once the peer has closed the stream.
    ///
    /// A trailing unterminated delimited message is emitted. Returns the
    /// number of bytes that could not form a frame and were dropped.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError`] when the remaining bytes violate the rule.
    pub fn decode_eof(
        &mut self,
        buf: &mut ReceiveBuffer,
        out: &mut Vec<Bytes>,
    ) -> Result<usize, FramingError> {
        self.decode_available(buf, out)?;
        if let CodecKind::Delimited(codec) = &mut self.kind {
            while let Some(frame) = codec.decode_eof(buf.bytes_mut())? {
                if !frame.is_empty() {
                    out.push(frame);
                }
            }
        }
        let dropped = buf.len();
        buf.clear();
        Ok(dropped)
    }

    /// Append `text` to `dst` with this codec's framing.
    ///
    /// # Errors
    ///
    /// Returns [`FramingError::FrameTooLarge`] if `text` exceeds the maximum
    /// frame length.
    pub fn encode(&mut self, text: &str, dst: &mut BytesMut) -> Result<(), FramingError> {
        if text.len() > self.max_frame_length {
            return Err(FramingError::FrameTooLarge {
                len: text.len(),
                max: self.max_frame_length,
            });
        }
        match &mut self.kind {
            CodecKind::LengthPrefixed(codec) => codec
                .encode(Bytes::copy_from_slice(text.as_bytes()), dst)
                .map_err(FramingError::Length),
            CodecKind::Delimited(codec) => codec.encode(text, dst).map_err(FramingError::from),
            CodecKind::Burst => {
                dst.extend_from_slice(text.as_bytes());
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn feed(codec: &mut FrameCodec, buf: &mut ReceiveBuffer, chunk: &[u8]) -> Vec<Bytes> {
        let mut out = Vec::new();
        codec.begin_burst(buf);
        buf.append(chunk);
        codec.decode_available(buf, &mut out).expect("decode");
        out
    }

    #[test]
    fn length_prefixed_frame_spans_bursts() {
        let mut codec = Framing::LengthPrefixed.codec(DEFAULT_MAX_FRAME_LENGTH);
        let mut wire = BytesMut::new();
        let payload = "x".repeat(1300);
        codec.encode(&payload, &mut wire).expect("encode");
        assert_eq!(&wire[..4], &1300u32.to_be_bytes());

        let mut buf = ReceiveBuffer::default();
        let mut frames = Vec::new();
        for chunk in wire.chunks(512) {
            frames.extend(feed(&mut codec, &mut buf, chunk));
        }
        assert_eq!(frames, vec![Bytes::from(payload)]);
        assert!(buf.is_empty());
    }

    #[test]
    fn delimited_splits_and_keeps_remainder() {
        let mut codec = Framing::Delimited(b'\n').codec(DEFAULT_MAX_FRAME_LENGTH);
        let mut buf = ReceiveBuffer::default();

        let frames = feed(&mut codec, &mut buf, b"one\ntwo\nthr");
        assert_eq!(frames, vec![Bytes::from("one"), Bytes::from("two")]);

        let frames = feed(&mut codec, &mut buf, b"ee\n");
        assert_eq!(frames, vec![Bytes::from("three")]);
    }

    #[test]
    fn delimited_eof_flushes_unterminated_tail() {
        let mut codec = Framing::Delimited(b'\n').codec(DEFAULT_MAX_FRAME_LENGTH);
        let mut buf = ReceiveBuffer::default();
        buf.append(b"done\ntail");
        let mut out = Vec::new();
        let dropped = codec.decode_eof(&mut buf, &mut out).expect("eof");
        assert_eq!(out, vec![Bytes::from("done"), Bytes::from("tail")]);
        assert_eq!(dropped, 0);
    }

    #[test]
    fn length_prefixed_eof_drops_partial_frame() {
        let mut codec = Framing::LengthPrefixed.codec(DEFAULT_MAX_FRAME_LENGTH);
        let mut buf = ReceiveBuffer::default();
        buf.append(&[0, 0, 0, 9, b'a']);
        let mut out = Vec::new();
        let dropped = codec.decode_eof(&mut buf, &mut out).expect("eof");
        assert!(out.is_empty());
        assert_eq!(dropped, 5);
    }

    #[test]
    fn burst_treats_each_burst_as_one_message() {
        let mut codec = Framing::Burst.codec(DEFAULT_MAX_FRAME_LENGTH);
        let mut buf = ReceiveBuffer::default();
        assert_eq!(feed(&mut codec, &mut buf, b"a\nb"), vec![Bytes::from("a\nb")]);
        assert_eq!(feed(&mut codec, &mut buf, b"c"), vec![Bytes::from("c")]);
        assert!(feed(&mut codec, &mut buf, b"").is_empty());
    }

    #[test]
    fn oversized_length_prefix_discards_buffer() {
        let mut codec = Framing::LengthPrefixed.codec(16);
        let mut buf = ReceiveBuffer::default();
        buf.append(&[0, 0, 1, 0]);
        buf.append(b"ignored");
        let mut out = Vec::new();
        let err = codec.decode_available(&mut buf, &mut out).expect_err("too large");
        assert!(matches!(err, FramingError::Length(_)));
        assert!(buf.is_empty());

        let mut wire = BytesMut::new();
        codec.encode("ok", &mut wire).expect("encode");
        buf.append(&wire);
        codec.decode_available(&mut buf, &mut out).expect("decode");
        assert_eq!(out, vec![Bytes::from("ok")]);
    }

    #[test]
    fn oversized_delimited_message_is_skipped() {
        let mut codec = Framing::Delimited(b'\n').codec(4);
        let mut buf = ReceiveBuffer::default();
        buf.append(b"toolong\nok\n");
        let mut out = Vec::new();
        let err = codec.decode_available(&mut buf, &mut out).expect_err("too long");
        assert!(matches!(err, FramingError::Delimited(_)));
        assert_eq!(out, vec![Bytes::from("ok")]);
        assert!(buf.is_empty());
    }

    #[test]
    fn oversized_delimited_tail_is_dropped_across_bursts() {
        let mut codec = Framing::Delimited(b'\n').codec(4);
        let mut buf = ReceiveBuffer::default();
        let mut out = Vec::new();
        buf.append(b"waytoo");
        assert!(codec.decode_available(&mut buf, &mut out).is_err());
        buf.append(b"long\nfine\n");
        codec.decode_available(&mut buf, &mut out).expect("decode");
        assert_eq!(out, vec![Bytes::from("fine")]);
    }

    #[test]
    fn oversized_burst_is_discarded() {
        let mut codec = Framing::Burst.codec(16);
        let mut buf = ReceiveBuffer::default();
        buf.append(&[b'x'; 100]);
        let mut out = Vec::new();
        let err = codec.decode_available(&mut buf, &mut out).expect_err("too large");
        assert!(matches!(err, FramingError::FrameTooLarge { len: 100, max: 16 }));
        assert!(out.is_empty());
        assert!(buf.is_empty());

        assert_eq!(feed(&mut codec, &mut buf, b"small"), vec![Bytes::from("small")]);
    }

    #[rstest]
    #[case(Framing::LengthPrefixed)]
    #[case(Framing::Delimited(0))]
    #[case(Framing::Burst)]
    fn encode_rejects_oversized_text(#[case] framing: Framing) {
        let mut codec = framing.codec(4);
        let mut dst = BytesMut::new();
        let err = codec.encode("hello", &mut dst).expect_err("too large");
        assert!(matches!(err, FramingError::FrameTooLarge { len: 5, max: 4 }));
        assert!(dst.is_empty());
    }

    #[test]
    fn delimited_encode_appends_terminator() {
        let mut codec = Framing::Delimited(0).codec(DEFAULT_MAX_FRAME_LENGTH);
        let mut dst = BytesMut::new();
        codec.encode("hi", &mut dst).expect("encode");
        assert_eq!(&dst[..], b"hi\0");
    }
}
