//! Serializes a [`Body`] tree into MIME wire format.
//!
//! The writer emits bare `\n` line separators throughout; a transport that
//! needs CRLF is expected to rewrite line endings on the way out. Headers
//! for the top-level part are the caller's responsibility, matching how a
//! message header section already carries them.

use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use getrandom::getrandom;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::trace;

use crate::body::Body;
use crate::cancel::CancelToken;
use crate::charset::convert_content;
use crate::config::SendConfig;
use crate::encode::{copy_through, Base64Encoder, QpEncoder};
use crate::error::{Error, Result};
use crate::media::is_valid_boundary;
use crate::policy::{ContentKind, TransferEncoding};

const BOUNDARY_LEN: usize = 16;

/// Boundary characters; a 32-symbol set so each random byte maps evenly.
const BOUNDARY_ALPHABET: &[u8] = b"0123456789ABCDEFGHIJKLMNOPQRSTUV";

/// Generates a random 16-character multipart boundary.
pub fn generate_boundary() -> String {
    let mut raw = [0u8; BOUNDARY_LEN];
    getrandom(&mut raw).expect("failed to source randomness for boundary");
    raw.iter()
        .map(|&b| BOUNDARY_ALPHABET[(b & 0x1F) as usize] as char)
        .collect()
}

/// Writes the body of `body` to `writer`.
///
/// Containers emit a `\n--boundary\n` delimiter, part headers and the
/// encoded part for each child, then the closing `\n--boundary--\n`.
/// Leaves stream their source file through the transfer encoding chosen by
/// [`Body::update_encoding`], converting text to the selected send charset
/// first.
///
/// # Errors
///
/// [`Error::Multipart`] if a container lacks a usable boundary,
/// [`Error::SourceUnreadable`] if a leaf's file cannot be read, and
/// [`Error::Interrupted`] if `cancel` fires mid-stream. On interruption the
/// output written so far is a valid prefix.
pub async fn write_mime_body<W>(
    body: &Body,
    writer: &mut W,
    config: &SendConfig,
    cancel: &CancelToken,
) -> Result<()>
where
    W: AsyncWrite + Unpin + Send,
{
    write_part(body, writer, config, cancel).await
}

fn write_part<'a, W>(
    body: &'a Body,
    writer: &'a mut W,
    config: &'a SendConfig,
    cancel: &'a CancelToken,
) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>
where
    W: AsyncWrite + Unpin + Send,
{
    Box::pin(async move {
        if body.is_container() {
            let boundary = body
                .boundary()
                .ok_or_else(|| Error::Multipart("part has no boundary parameter".to_string()))?;
            if !is_valid_boundary(boundary) {
                return Err(Error::Multipart(format!("invalid boundary '{boundary}'")));
            }
            for child in body.children() {
                writer
                    .write_all(format!("\n--{boundary}\n").as_bytes())
                    .await?;
                write_part_headers(child, writer).await?;
                write_part(child, writer, config, cancel).await?;
            }
            writer
                .write_all(format!("\n--{boundary}--\n").as_bytes())
                .await?;
            return Ok(());
        }

        let content = load_content(body).await?;
        let istext = matches!(body.kind, ContentKind::Text | ContentKind::Message);
        trace!(
            encoding = body.encoding.as_str(),
            len = content.len(),
            "writing leaf part"
        );
        match body.encoding {
            TransferEncoding::QuotedPrintable => {
                let mut encoder = QpEncoder::new(&mut *writer, istext, cancel.clone());
                encoder.write(&content).await?;
                encoder.finish().await?;
            }
            TransferEncoding::Base64 => {
                let mut encoder = Base64Encoder::new(&mut *writer, istext, cancel.clone());
                encoder.write(&content).await?;
                encoder.finish().await?;
            }
            TransferEncoding::SevenBit | TransferEncoding::EightBit => {
                copy_through(&content, writer, cancel).await?;
            }
        }
        Ok(())
    })
}

/// Emits the per-part header block: Content-Type with its parameters, the
/// transfer encoding, and the blank separator line.
async fn write_part_headers<W>(body: &Body, writer: &mut W) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(format!("Content-Type: {}\n", body.content_type()).as_bytes())
        .await?;
    writer
        .write_all(format!("Content-Transfer-Encoding: {}\n", body.encoding.as_str()).as_bytes())
        .await?;
    writer.write_all(b"\n").await?;
    Ok(())
}

/// Loads a leaf's source file, converting text to the send charset when a
/// selection was made.
async fn load_content(body: &Body) -> Result<Bytes> {
    let Some(path) = body.filename.as_ref() else {
        return Ok(Bytes::new());
    };
    let raw = tokio::fs::read(path)
        .await
        .map_err(|e| Error::source_unreadable(path, e))?;
    if body.kind == ContentKind::Text && !body.no_convert {
        if let (Some(from), Some(to)) = (body.file_charset.as_deref(), body.charset.as_deref()) {
            if !from.eq_ignore_ascii_case(to) {
                return Ok(Bytes::from(convert_content(&raw, from, to)));
            }
        }
    }
    Ok(Bytes::from(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_boundary_shape() {
        for _ in 0..32 {
            let boundary = generate_boundary();
            assert_eq!(boundary.len(), BOUNDARY_LEN);
            assert!(is_valid_boundary(&boundary));
            assert!(boundary.bytes().all(|b| BOUNDARY_ALPHABET.contains(&b)));
        }
    }

    #[tokio::test]
    async fn test_missing_boundary_is_an_error() {
        let mut container = Body::multipart("mixed", vec![]);
        container.parameters.clear();
        // A container needs children for is_container; fake one in.
        container.parts = Some(Box::new(Body::new(ContentKind::Text, "plain")));

        let mut output = Vec::new();
        let err = write_mime_body(
            &container,
            &mut output,
            &SendConfig::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, Error::Multipart(_)));
    }

    #[tokio::test]
    async fn test_empty_leaf_writes_nothing() {
        let body = Body::new(ContentKind::Text, "plain");
        let mut output = Vec::new();
        write_mime_body(
            &body,
            &mut output,
            &SendConfig::default(),
            &CancelToken::new(),
        )
        .await
        .unwrap();
        assert!(output.is_empty());
    }
}
