//! Line codec for async streams

use crate::ProtocolError;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum inbound line length (64KB)
pub const MAX_LINE_LENGTH: usize = 64 * 1024;

/// Codec for newline-terminated UTF-8 text over async streams
pub struct LineCodec {
    /// Read buffer for incoming data
    read_buf: BytesMut,
    /// Maximum line length allowed
    max_line_length: usize,
    /// Dropping the rest of an oversized line until its `\n`
    discarding: bool,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCodec {
    /// Create a new line codec with default settings
    pub fn new() -> Self {
        Self::with_max_line_length(MAX_LINE_LENGTH)
    }

    /// Create a new line codec with a custom max line length
    pub fn with_max_line_length(max_line_length: usize) -> Self {
        Self {
            read_buf: BytesMut::with_capacity(1024),
            max_line_length,
            discarding: false,
        }
    }

    /// Encode a line with its `\n` terminator
    pub fn encode_line(&self, line: &str) -> Result<Bytes, ProtocolError> {
        if line.contains('\n') {
            return Err(ProtocolError::EmbeddedNewline);
        }

        let mut buf = BytesMut::with_capacity(line.len() + 1);
        buf.put_slice(line.as_bytes());
        buf.put_u8(b'\n');

        Ok(buf.freeze())
    }

    /// Write a line and flush it through to the transport.
    ///
    /// Returns only once the writer has accepted the whole line and
    /// completed its flush.
    pub async fn write_line<W>(&self, writer: &mut W, line: &str) -> Result<(), ProtocolError>
    where
        W: AsyncWrite + Unpin,
    {
        let encoded = self.encode_line(line)?;
        writer.write_all(&encoded).await?;
        writer.flush().await?;
        Ok(())
    }

    /// Read the next line from an async reader.
    ///
    /// Returns `Ok(None)` on a clean EOF. Unterminated bytes left at EOF
    /// are returned as a final line.
    pub async fn read_line<R>(&mut self, reader: &mut R) -> Result<Option<String>, ProtocolError>
    where
        R: AsyncRead + Unpin,
    {
        loop {
            if let Some(line) = self.try_decode_line()? {
                return Ok(Some(line));
            }

            let mut temp_buf = [0u8; 1024];
            let n = reader.read(&mut temp_buf).await?;

            if n == 0 {
                if self.discarding || self.read_buf.is_empty() {
                    self.read_buf.clear();
                    self.discarding = false;
                    return Ok(None);
                }
                let rest = self.read_buf.split();
                return Ok(Some(Self::decode_text(&rest)));
            }

            self.read_buf.extend_from_slice(&temp_buf[..n]);
        }
    }

    /// Try to decode a line from the internal buffer.
    ///
    /// An oversized line yields one [`ProtocolError::LineTooLong`]; its
    /// bytes are dropped through the next `\n` and decoding resumes with
    /// the following line.
    pub fn try_decode_line(&mut self) -> Result<Option<String>, ProtocolError> {
        let newline = self.read_buf.iter().position(|&b| b == b'\n');

        if self.discarding {
            match newline {
                Some(pos) => {
                    self.read_buf.advance(pos + 1);
                    self.discarding = false;
                }
                None => {
                    self.read_buf.clear();
                    return Ok(None);
                }
            }
            return self.try_decode_line();
        }

        match newline {
            Some(pos) if pos > self.max_line_length => {
                self.read_buf.advance(pos + 1);
                Err(ProtocolError::LineTooLong {
                    size: pos,
                    max: self.max_line_length,
                })
            }
            Some(pos) => {
                let line = self.read_buf.split_to(pos + 1);
                Ok(Some(Self::decode_text(&line[..pos])))
            }
            None if self.read_buf.len() > self.max_line_length => {
                let size = self.read_buf.len();
                self.read_buf.clear();
                self.discarding = true;
                Err(ProtocolError::LineTooLong {
                    size,
                    max: self.max_line_length,
                })
            }
            None => Ok(None),
        }
    }

    /// Number of bytes buffered but not yet returned as a line
    pub fn buffered_len(&self) -> usize {
        self.read_buf.len()
    }

    fn decode_text(raw: &[u8]) -> String {
        let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
        String::from_utf8_lossy(raw).into_owned()
    }
}
