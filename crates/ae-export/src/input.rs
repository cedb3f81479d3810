//! Newline-framed event payloads.
//!
//! Each line is one opaque payload. Only the line terminator (`\n` or
//! `\r\n`) is stripped; blank lines carry no event.

use std::io;

use tokio::io::{AsyncBufRead, AsyncBufReadExt, Split};

/// Reads payloads from newline-framed input.
pub struct PayloadReader<R> {
    segments: Split<R>,
}

impl<R: AsyncBufRead + Unpin> PayloadReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            segments: reader.split(b'\n'),
        }
    }

    /// Next non-empty payload, or `None` at end of input.
    pub async fn next_payload(&mut self) -> io::Result<Option<Vec<u8>>> {
        while let Some(mut line) = self.segments.next_segment().await? {
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if !line.is_empty() {
                return Ok(Some(line));
            }
        }
        Ok(None)
    }
}
