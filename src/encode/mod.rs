//! Streaming transfer encoders.
//!
//! All three encoders make a single forward pass over the input, write
//! MIME-legal output into any `AsyncWrite`, and poll a [`CancelToken`] once
//! per input byte. On cancellation they stop immediately; output already
//! flushed remains a valid prefix of the encoding.

pub mod b64;
pub mod qp;

pub use b64::Base64Encoder;
pub use qp::{qp_decode, QpEncoder};

use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::cancel::CancelToken;
use crate::error::{Error, Result};

/// Maximum output line length, including a quoted-printable soft break.
pub(crate) const LINE_MAX_LEN: usize = 76;

pub(crate) const UPPER_HEX: &[u8] = b"0123456789ABCDEF";

/// Verbatim copy for 7-bit and 8-bit parts.
///
/// The cancellation flag is still checked per input byte so that an
/// interrupted copy behaves like an interrupted encoder.
pub async fn copy_through<W: AsyncWrite + Unpin>(
    content: &[u8],
    writer: &mut W,
    cancel: &CancelToken,
) -> Result<()> {
    let mut written = 0;
    for (index, _) in content.iter().enumerate() {
        if cancel.is_cancelled() {
            writer.write_all(&content[written..index]).await?;
            return Err(Error::Interrupted);
        }
        // Flush in slabs so a cancellation does not lose earlier output.
        if index - written == 8192 {
            writer.write_all(&content[written..index]).await?;
            written = index;
        }
    }
    writer.write_all(&content[written..]).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_copy_through_verbatim() {
        let data: Vec<u8> = (0u8..=255).collect();
        let mut output = Vec::new();
        copy_through(&data, &mut output, &CancelToken::new())
            .await
            .unwrap();
        assert_eq!(output, data);
    }

    #[tokio::test]
    async fn test_copy_through_cancelled() {
        let token = CancelToken::new();
        token.cancel();
        let mut output = Vec::new();
        let err = copy_through(b"data", &mut output, &token).await.unwrap_err();
        assert!(matches!(err, Error::Interrupted));
        assert!(output.is_empty());
    }
}
