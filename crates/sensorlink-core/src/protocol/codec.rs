//! Line framing
//!
//! Reassembles the device byte stream into newline-delimited lines.
//! Bytes after the last newline stay buffered until more data arrives; at
//! end of stream they are dropped with the buffer, never emitted.

use bytes::{Buf, BytesMut};
use std::io;
use tokio_util::codec::Decoder;

use super::MAX_LINE_LENGTH;

/// Newline decoder for device telemetry
#[derive(Debug, Clone)]
pub struct LineCodec {
    /// Where to resume scanning for `\n` in the buffer
    next_index: usize,
    /// Longest line kept; longer ones are skipped whole
    max_length: usize,
    /// Inside an overlong line, dropping bytes until the next newline
    discarding: bool,
}

impl Default for LineCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl LineCodec {
    /// Create a codec with the default line length limit
    pub fn new() -> Self {
        Self::with_max_length(MAX_LINE_LENGTH)
    }

    /// Create a codec that skips lines longer than `max_length` bytes
    pub fn with_max_length(max_length: usize) -> Self {
        Self {
            next_index: 0,
            max_length,
            discarding: false,
        }
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        loop {
            let start = self.next_index.min(buf.len());
            let Some(offset) = buf[start..].iter().position(|b| *b == b'\n') else {
                if self.discarding || buf.len() > self.max_length {
                    buf.clear();
                    self.discarding = true;
                    self.next_index = 0;
                } else {
                    self.next_index = buf.len();
                }
                return Ok(None);
            };

            let newline = start + offset;
            self.next_index = 0;

            if self.discarding || newline > self.max_length {
                buf.advance(newline + 1);
                self.discarding = false;
                continue;
            }

            let line = buf.split_to(newline + 1);
            let line = &line[..newline];
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            return Ok(Some(String::from_utf8_lossy(line).into_owned()));
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, io::Error> {
        // A trailing partial line is not a line; do not flush it.
        self.decode(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn drain(codec: &mut LineCodec, buf: &mut BytesMut) -> Vec<String> {
        let mut lines = Vec::new();
        while let Some(line) = codec.decode(buf).unwrap() {
            lines.push(line);
        }
        lines
    }

    #[test]
    fn test_splits_and_retains_partial() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("{\"bpm\":80}\n{\"temp\":37.0}\n{\"ir\":512");

        let lines = drain(&mut codec, &mut buf);
        assert_eq!(lines, vec!["{\"bpm\":80}", "{\"temp\":37.0}"]);
        assert_eq!(&buf[..], b"{\"ir\":512");
    }

    #[test]
    fn test_partial_completes_on_next_chunk() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("{\"ir\":5");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);

        buf.extend_from_slice(b"12}\r\nnext");
        assert_eq!(codec.decode(&mut buf).unwrap().as_deref(), Some("{\"ir\":512}"));
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"next");
    }

    #[test]
    fn test_eof_keeps_partial_unemitted() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("{\"bpm\":1}\n{\"bpm\":");
        assert_eq!(codec.decode_eof(&mut buf).unwrap().as_deref(), Some("{\"bpm\":1}"));
        assert_eq!(codec.decode_eof(&mut buf).unwrap(), None);
        assert_eq!(&buf[..], b"{\"bpm\":");
    }

    #[test]
    fn test_overlong_line_is_skipped() {
        let mut codec = LineCodec::with_max_length(8);
        let mut buf = BytesMut::from("0123456789abcdef\nshort\n");
        assert_eq!(drain(&mut codec, &mut buf), vec!["short"]);
    }

    #[test]
    fn test_overlong_line_across_chunks() {
        let mut codec = LineCodec::with_max_length(8);
        let mut buf = BytesMut::from("0123456789");
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());

        buf.extend_from_slice(b"still junk\nok\n");
        assert_eq!(drain(&mut codec, &mut buf), vec!["ok"]);
    }

    #[test]
    fn test_empty_lines_are_emitted() {
        let mut codec = LineCodec::new();
        let mut buf = BytesMut::from("\n\n");
        assert_eq!(drain(&mut codec, &mut buf), vec!["", ""]);
    }
}
