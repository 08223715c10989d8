//! Line framing codec for tokio.
//!
//! Splits the byte stream on `\n`, strips a trailing `\r`, and enforces a
//! maximum line length. Outbound lines get `\r\n` appended. A peer that
//! sends a line over the limit (or an unterminated run of bytes over the
//! limit) gets a [`ProtoError::LineTooLong`], which the link treats as fatal.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder};

use crate::error::{ProtoError, Result};

/// Default ceiling for a single line, terminator excluded.
pub const DEFAULT_MAX_LINE_LEN: usize = 16384;

/// Newline-delimited text codec.
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Index of next byte to check for newline
    next_index: usize,
    max_len: usize,
}

impl LineCodec {
    /// Create a codec with the default 16 KiB limit.
    pub fn new() -> Self {
        Self::with_max_len(DEFAULT_MAX_LINE_LEN)
    }

    /// Create a codec with a custom limit.
    pub fn with_max_len(max_len: usize) -> Self {
        Self {
            next_index: 0,
            max_len,
        }
    }

    /// The configured limit.
    pub fn max_len(&self) -> usize {
        self.max_len
    }
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = ProtoError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<String>> {
        loop {
            let Some(offset) = src[self.next_index..].iter().position(|b| *b == b'\n') else {
                self.next_index = src.len();
                if src.len() > self.max_len {
                    return Err(ProtoError::LineTooLong {
                        actual: src.len(),
                        limit: self.max_len,
                    });
                }
                return Ok(None);
            };

            let raw = src.split_to(self.next_index + offset + 1);
            self.next_index = 0;

            let mut body = &raw[..raw.len() - 1];
            if let Some(stripped) = body.strip_suffix(b"\r") {
                body = stripped;
            }

            if body.len() > self.max_len {
                return Err(ProtoError::LineTooLong {
                    actual: body.len(),
                    limit: self.max_len,
                });
            }

            // Blank keep-alive lines carry nothing to dispatch.
            if body.is_empty() {
                continue;
            }

            // Chatter relayed from other servers is not guaranteed UTF-8.
            return Ok(Some(String::from_utf8_lossy(body).into_owned()));
        }
    }
}

impl<T: AsRef<str>> Encoder<T> for LineCodec {
    type Error = ProtoError;

    fn encode(&mut self, line: T, dst: &mut BytesMut) -> Result<()> {
        let line = line.as_ref();
        dst.reserve(line.len() + 2);
        dst.extend_from_slice(line.as_bytes());
        dst.extend_from_slice(b"\r\n");
        Ok(())
    }
}
