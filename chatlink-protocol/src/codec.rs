//! Codec for encoding and decoding chat frames
//!
//! Encoding reuses a thread-local buffer for the JSON body.

use crate::constants::{HEADER_LEN, MAX_FRAME_SIZE};
use crate::message::Message;
use bytes::{Buf, BufMut, BytesMut};
use std::cell::RefCell;
use std::io;
use tokio_util::codec::{Decoder, Encoder};

thread_local! {
    static ENCODE_BUFFER: RefCell<Vec<u8>> = const { RefCell::new(Vec::new()) };
}

const INITIAL_ENCODE_BUFFER_CAPACITY: usize = 8192;

/// Recoverable decode failures. The frame is dropped and decoding continues
/// with the next byte after it.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    #[error("Invalid frame length: {length} (max: {max})")]
    InvalidFrameLength { length: i64, max: usize },

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),
}

/// One decoding step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decoded {
    Message(Message),
    /// Nothing usable this cycle; keep reading
    Skipped(FramingError),
}

/// Chat protocol codec
///
/// Frames are length-prefixed with a 4-byte big-endian length field,
/// followed by a UTF-8 JSON body.
///
/// Frame format:
/// ```text
/// ┌─────────────┬──────────────┐
/// │ Length (i32)│ JSON body    │
/// │ 4 bytes     │ N bytes      │
/// └─────────────┴──────────────┘
/// ```
///
/// A declared length outside `1..=max_frame_size` consumes only the
/// 4-byte header and yields [`Decoded::Skipped`].
#[derive(Debug, Clone, Copy)]
pub struct ChatCodec {
    max_frame_size: usize,
}

impl Default for ChatCodec {
    fn default() -> Self {
        Self {
            max_frame_size: MAX_FRAME_SIZE,
        }
    }
}

impl ChatCodec {
    /// Create a new codec instance with default max frame size
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new codec instance with a custom max frame size
    pub fn with_max_frame_size(max_frame_size: usize) -> Self {
        Self { max_frame_size }
    }

    /// Get the configured max frame size
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }
}

/// Encode a single message into a standalone frame.
pub fn encode(message: &Message) -> io::Result<BytesMut> {
    let mut buf = BytesMut::new();
    ChatCodec::new().encode(message, &mut buf)?;
    Ok(buf)
}

impl Decoder for ChatCodec {
    type Item = Decoded;
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if src.len() < HEADER_LEN {
            return Ok(None);
        }

        // Read length prefix (don't consume yet)
        let mut length_bytes = [0u8; HEADER_LEN];
        length_bytes.copy_from_slice(&src[..HEADER_LEN]);
        let declared = i32::from_be_bytes(length_bytes);

        let frame_length = match usize::try_from(declared) {
            Ok(len) if len > 0 && len <= self.max_frame_size => len,
            _ => {
                src.advance(HEADER_LEN);
                return Ok(Some(Decoded::Skipped(FramingError::InvalidFrameLength {
                    length: i64::from(declared),
                    max: self.max_frame_size,
                })));
            }
        };

        // Check if we have the full frame
        if src.len() < HEADER_LEN + frame_length {
            src.reserve(HEADER_LEN + frame_length - src.len());
            return Ok(None);
        }

        src.advance(HEADER_LEN);
        let body = src.split_to(frame_length);

        match serde_json::from_slice::<Message>(&body) {
            Ok(message) => Ok(Some(Decoded::Message(message))),
            Err(e) => Ok(Some(Decoded::Skipped(FramingError::MalformedPayload(
                e.to_string(),
            )))),
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        match self.decode(buf)? {
            Some(frame) => Ok(Some(frame)),
            None if buf.is_empty() => Ok(None),
            None => Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("stream closed mid-frame with {} bytes buffered", buf.len()),
            )),
        }
    }
}

impl Encoder<&Message> for ChatCodec {
    type Error = io::Error;

    fn encode(&mut self, message: &Message, dst: &mut BytesMut) -> Result<(), Self::Error> {
        ENCODE_BUFFER.with(|buf| {
            let mut buf = buf.borrow_mut();

            if buf.capacity() == 0 {
                buf.reserve(INITIAL_ENCODE_BUFFER_CAPACITY);
            }
            buf.clear();

            serde_json::to_writer(&mut *buf, message).map_err(|e| {
                io::Error::new(io::ErrorKind::InvalidData, format!("Encode error: {e}"))
            })?;

            let frame_length = buf.len();

            if frame_length > self.max_frame_size {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!(
                        "Frame too large: {frame_length} bytes (max: {})",
                        self.max_frame_size
                    ),
                ));
            }

            let prefix = u32::try_from(frame_length).map_err(|_| {
                io::Error::new(io::ErrorKind::InvalidData, "Frame length overflows u32")
            })?;

            dst.reserve(HEADER_LEN + frame_length);
            dst.put_u32(prefix);
            dst.put_slice(&buf);

            Ok(())
        })
    }
}
