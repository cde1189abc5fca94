//! Base64 streaming encoder.
//!
//! Buffers input three bytes at a time and emits wrapped output lines. For
//! text parts, a bare `\n` is normalized to `\r\n` in the encoded payload,
//! since base64 transports no implicit line-ending convention.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};

/// Wrap threshold: a new output line starts once 72 encoded characters are
/// down, so no line exceeds 76.
const WRAP_AT: usize = 72;

/// A base64 encoder.
///
/// Must be [`finish`](Base64Encoder::finish)ed explicitly to flush the
/// final partial group (padded with `=`) and the trailing newline.
pub struct Base64Encoder<W> {
    writer: W,
    cancel: CancelToken,
    istext: bool,
    group: [u8; 3],
    group_len: usize,
    line_len: usize,
    prev: u8,
}

impl<W: AsyncWrite + Unpin> Base64Encoder<W> {
    /// Creates a new base64 encoder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sendmime::encode::Base64Encoder;
    /// use sendmime::CancelToken;
    ///
    /// # async fn example() -> sendmime::Result<()> {
    /// let mut output = Vec::new();
    /// let mut encoder = Base64Encoder::new(&mut output, false, CancelToken::new());
    /// encoder.write(&[0xDE, 0xAD, 0xBE, 0xEF]).await?;
    /// encoder.finish().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(writer: W, istext: bool, cancel: CancelToken) -> Self {
        Self {
            writer,
            cancel,
            istext,
            group: [0; 3],
            group_len: 0,
            line_len: 0,
            prev: 0,
        }
    }

    /// Encodes a chunk of input, polling the cancellation token per byte.
    pub async fn write(&mut self, buf: &[u8]) -> Result<()> {
        for &c in buf {
            if self.cancel.is_cancelled() {
                return Err(Error::Interrupted);
            }
            if self.istext && c == b'\n' && self.prev != b'\r' {
                self.push(b'\r').await?;
            }
            self.push(c).await?;
            self.prev = c;
        }
        Ok(())
    }

    /// Flushes the final group and the trailing newline, returning the
    /// inner writer.
    pub async fn finish(mut self) -> Result<W> {
        self.flush_group().await?;
        self.writer.write_all(b"\n").await?;
        Ok(self.writer)
    }

    async fn push(&mut self, c: u8) -> Result<()> {
        if self.group_len == 3 {
            self.flush_group().await?;
        }
        self.group[self.group_len] = c;
        self.group_len += 1;
        Ok(())
    }

    async fn flush_group(&mut self) -> Result<()> {
        if self.group_len == 0 {
            return Ok(());
        }
        if self.line_len >= WRAP_AT {
            self.writer.write_all(b"\n").await?;
            self.line_len = 0;
        }
        let mut quad = [0u8; 4];
        let n = STANDARD
            .encode_slice(&self.group[..self.group_len], &mut quad)
            .map_err(|e| Error::Encoding(e.to_string()))?;
        self.writer.write_all(&quad[..n]).await?;
        self.line_len += n;
        self.group_len = 0;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::base64_decode;

    async fn encode(data: &[u8], istext: bool) -> Vec<u8> {
        let mut output = Vec::new();
        let mut encoder = Base64Encoder::new(&mut output, istext, CancelToken::new());
        encoder.write(data).await.unwrap();
        encoder.finish().await.unwrap();
        output
    }

    fn decode_wrapped(output: &[u8]) -> Vec<u8> {
        let joined: Vec<u8> = output
            .iter()
            .copied()
            .filter(|&b| b != b'\n')
            .collect();
        base64_decode(std::str::from_utf8(&joined).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_known_vector() {
        assert_eq!(
            encode(b"Hello, World!", false).await,
            b"SGVsbG8sIFdvcmxkIQ==\n"
        );
    }

    #[tokio::test]
    async fn test_binary_round_trip() {
        let data: Vec<u8> = (0u8..=255).cycle().take(1021).collect();
        let output = encode(&data, false).await;
        assert_eq!(decode_wrapped(&output), data);
    }

    #[tokio::test]
    async fn test_text_mode_normalizes_line_endings() {
        // "a\nb" goes out as "a\r\nb".
        assert_eq!(encode(b"a\nb", true).await, encode(b"a\r\nb", false).await);
        // An existing CRLF is not doubled.
        assert_eq!(
            decode_wrapped(&encode(b"a\r\nb", true).await),
            b"a\r\nb"
        );
    }

    #[tokio::test]
    async fn test_line_wrapping() {
        let data = vec![0xA5u8; 400];
        let output = encode(&data, false).await;
        assert!(output.ends_with(b"\n"));
        for line in output.split(|&b| b == b'\n') {
            assert!(line.len() <= 76, "line too long: {}", line.len());
        }
        assert_eq!(decode_wrapped(&output), data);
    }

    #[tokio::test]
    async fn test_seven_bit_safety() {
        let data: Vec<u8> = (0u8..=255).collect();
        let output = encode(&data, false).await;
        for &b in &output {
            assert!(b < 0x80);
            assert!(b >= 32 || b == b'\n');
        }
    }

    #[tokio::test]
    async fn test_padding_on_final_group() {
        assert!(encode(b"a", false).await.starts_with(b"YQ=="));
        assert!(encode(b"ab", false).await.starts_with(b"YWI="));
        assert!(encode(b"abc", false).await.starts_with(b"YWJj"));
    }

    #[tokio::test]
    async fn test_cancellation_stops_consumption() {
        let token = CancelToken::new();
        let mut output = Vec::new();
        let mut encoder = Base64Encoder::new(&mut output, false, token.clone());
        encoder.write(b"abcdef").await.unwrap();
        token.cancel();
        let err = encoder.write(b"ghi").await.unwrap_err();
        assert!(matches!(err, Error::Interrupted));
    }
}
