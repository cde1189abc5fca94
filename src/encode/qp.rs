//! Quoted-printable encoder.
//!
//! Implements RFC 2045 quoted-printable encoding for outbound bodies. On
//! top of the plain escaping rules, the encoder defends the output against
//! downstream mail handling: lines starting with `From`/`from` or a lone
//! `.` are escaped (`=46rom`, `=66rom`, `=2E`) so mbox `From ` quoting and
//! SMTP dot-stuffing cannot alter the content, and trailing space or tab
//! before a hard break is escaped because MTAs may strip it.

use tokio::io::{AsyncWrite, AsyncWriteExt};

use super::{LINE_MAX_LEN, UPPER_HEX};
use crate::cancel::CancelToken;
use crate::error::{Error, Result};

/// A quoted-printable encoder.
///
/// Buffers one output line (up to 76 columns) and flushes it downstream
/// when it wraps or a hard line break arrives. Call
/// [`finish`](QpEncoder::finish) to flush the final partial line.
///
/// In text mode (`istext`), `\n` is a line terminator; otherwise every
/// byte, `\n` included, is content and gets escaped.
pub struct QpEncoder<W> {
    writer: W,
    cancel: CancelToken,
    istext: bool,
    line: [u8; 80],
    linelen: usize,
}

impl<W: AsyncWrite + Unpin> QpEncoder<W> {
    /// Creates a new quoted-printable encoder.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use sendmime::encode::QpEncoder;
    /// use sendmime::CancelToken;
    ///
    /// # async fn example() -> sendmime::Result<()> {
    /// let mut output = Vec::new();
    /// let mut encoder = QpEncoder::new(&mut output, true, CancelToken::new());
    /// encoder.write(b"caf\xE9 au lait\n").await?;
    /// encoder.finish().await?;
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(writer: W, istext: bool, cancel: CancelToken) -> Self {
        Self {
            writer,
            cancel,
            istext,
            line: [0; 80],
            linelen: 0,
        }
    }

    /// Encodes a chunk of input.
    ///
    /// The cancellation token is polled once per input byte; on
    /// cancellation the already-flushed output is a valid prefix.
    pub async fn write(&mut self, buf: &[u8]) -> Result<()> {
        for &c in buf {
            if self.cancel.is_cancelled() {
                return Err(Error::Interrupted);
            }
            self.push(c).await?;
        }
        Ok(())
    }

    /// Flushes the final partial line and returns the inner writer.
    pub async fn finish(mut self) -> Result<W> {
        if self.linelen > 0 {
            let last = self.line[self.linelen - 1];
            if last == b' ' || last == b'\t' {
                if self.linelen < 74 {
                    self.linelen -= 1;
                    self.push_escape(last);
                } else {
                    self.line[self.linelen - 1] = b'=';
                    let n = self.linelen;
                    self.writer.write_all(&self.line[..n]).await?;
                    self.writer.write_all(b"\n").await?;
                    self.linelen = 0;
                    self.push_escape(last);
                }
            }
            let n = self.linelen;
            self.writer.write_all(&self.line[..n]).await?;
        }
        Ok(self.writer)
    }

    async fn push(&mut self, c: u8) -> Result<()> {
        // Wrap once the buffer holds a full line and the next byte is not
        // about to terminate it anyway.
        if self.linelen == LINE_MAX_LEN && ((self.istext && c != b'\n') || !self.istext) {
            if self.line[self.linelen - 3] == b'=' {
                // The last three columns are an =XX escape; move it to the
                // next line whole rather than splitting it.
                let escape = [self.line[73], self.line[74], self.line[75]];
                self.writer.write_all(&self.line[..73]).await?;
                self.writer.write_all(b"=\n").await?;
                self.line[..3].copy_from_slice(&escape);
                self.linelen = 3;
            } else {
                let saved = self.line[75];
                self.line[75] = b'=';
                self.writer.write_all(&self.line[..76]).await?;
                self.writer.write_all(b"\n").await?;
                self.line[0] = saved;
                self.linelen = 1;
            }
        }

        // Escape line prefixes that collide with the mbox message separator
        // or look like an SMTP terminating dot.
        if self.linelen == 4 && &self.line[..4] == b"From" {
            self.line[..6].copy_from_slice(b"=46rom");
            self.linelen = 6;
        } else if self.linelen == 4 && &self.line[..4] == b"from" {
            self.line[..6].copy_from_slice(b"=66rom");
            self.linelen = 6;
        } else if self.linelen == 1 && self.line[0] == b'.' {
            self.line[..3].copy_from_slice(b"=2E");
            self.linelen = 3;
        }

        if c == b'\n' && self.istext {
            // Trailing space or tab before a hard break may be stripped in
            // transit, so it goes out escaped.
            let last = if self.linelen > 0 {
                self.line[self.linelen - 1]
            } else {
                0
            };
            if last == b' ' || last == b'\t' {
                if self.linelen < 74 {
                    self.linelen -= 1;
                    self.push_escape(last);
                    let n = self.linelen;
                    self.writer.write_all(&self.line[..n]).await?;
                } else {
                    self.line[self.linelen - 1] = b'=';
                    let n = self.linelen;
                    self.writer.write_all(&self.line[..n]).await?;
                    self.writer.write_all(b"\n").await?;
                    let escape = [b'=', UPPER_HEX[(last >> 4) as usize], UPPER_HEX[(last & 0x0F) as usize]];
                    self.writer.write_all(&escape).await?;
                }
            } else {
                let n = self.linelen;
                self.writer.write_all(&self.line[..n]).await?;
            }
            self.writer.write_all(b"\n").await?;
            self.linelen = 0;
        } else if c != b'\t' && (c < 32 || c > 126 || c == b'=') {
            // Soft-break first if the three-column escape cannot fit.
            if self.linelen > 73 {
                self.line[self.linelen] = b'=';
                self.linelen += 1;
                let n = self.linelen;
                self.writer.write_all(&self.line[..n]).await?;
                self.writer.write_all(b"\n").await?;
                self.linelen = 0;
            }
            self.push_escape(c);
        } else {
            self.line[self.linelen] = c;
            self.linelen += 1;
        }

        Ok(())
    }

    fn push_escape(&mut self, c: u8) {
        self.line[self.linelen] = b'=';
        self.line[self.linelen + 1] = UPPER_HEX[(c >> 4) as usize];
        self.line[self.linelen + 2] = UPPER_HEX[(c & 0x0F) as usize];
        self.linelen += 3;
    }
}

/// Decodes quoted-printable data.
///
/// Handles `=XX` escapes and `=`-terminated soft line breaks (bare LF or
/// CRLF). Used for round-tripping encoder output; tolerant of nothing else.
pub fn qp_decode(input: &[u8]) -> Result<Vec<u8>> {
    let mut out = Vec::with_capacity(input.len());
    let mut i = 0;
    while i < input.len() {
        if input[i] == b'=' {
            match input.get(i + 1) {
                Some(b'\n') => i += 2,
                Some(b'\r') if input.get(i + 2) == Some(&b'\n') => i += 3,
                Some(&high) => {
                    let low = *input
                        .get(i + 2)
                        .ok_or_else(|| Error::Encoding("incomplete escape".to_string()))?;
                    out.push(decode_hex_byte(high, low)?);
                    i += 3;
                }
                None => return Err(Error::Encoding("incomplete escape".to_string())),
            }
        } else {
            out.push(input[i]);
            i += 1;
        }
    }
    Ok(out)
}

/// Decodes two hex digits into a byte.
fn decode_hex_byte(high: u8, low: u8) -> Result<u8> {
    Ok((decode_hex_digit(high)? << 4) | decode_hex_digit(low)?)
}

/// Decodes a single hex digit.
fn decode_hex_digit(digit: u8) -> Result<u8> {
    match digit {
        b'0'..=b'9' => Ok(digit - b'0'),
        b'A'..=b'F' => Ok(digit - b'A' + 10),
        b'a'..=b'f' => Ok(digit - b'a' + 10),
        _ => Err(Error::Encoding(format!(
            "invalid hex digit: 0x{:02x}",
            digit
        ))),
    }
}
