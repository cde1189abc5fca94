//! Outbound MIME message preparation.
//!
//! This crate turns a tree of body parts into transport-ready MIME: it
//! scans each part's content, picks the least lossy send charset from a
//! configured candidate list, chooses a transfer encoding per RFC 2045
//! policy, and streams the encoded result into any [`tokio::io::AsyncWrite`].
//!
//! The pipeline has three stages, each usable on its own:
//!
//! - [`content`] scans bytes into [`ContentStats`] (line lengths, 8-bit and
//!   control content, line-ending shape).
//! - [`charset`] and [`policy`] map those stats plus a [`SendConfig`] to a
//!   send charset and a [`TransferEncoding`].
//! - [`encode`] and [`write`] stream the result out, wrapped in multipart
//!   boundaries where the tree calls for them.
//!
//! # Examples
//!
//! ```no_run
//! use sendmime::{Body, CancelToken, SendConfig, write_mime_body};
//!
//! # async fn example() -> sendmime::Result<()> {
//! let config = SendConfig::default();
//! let mut body = Body::multipart(
//!     "mixed",
//!     vec![Body::from_file("notes.txt"), Body::from_file("photo.jpg")],
//! );
//! body.update_encoding(&config).await?;
//!
//! let mut output = Vec::new();
//! write_mime_body(&body, &mut output, &config, &CancelToken::new()).await?;
//! # Ok(())
//! # }
//! ```
//!
//! Long-running encodes can be aborted from another task through the
//! shared [`CancelToken`]; output written before the interruption is a
//! valid prefix of the encoding.

pub mod body;
pub mod cancel;
pub mod charset;
pub mod codec;
pub mod config;
pub mod content;
pub mod encode;
pub mod error;
pub mod media;
pub mod policy;
pub mod write;

pub use body::Body;
pub use cancel::CancelToken;
pub use charset::{convert_content, select_charset, CharsetSelection};
pub use config::SendConfig;
pub use content::{ContentStats, ScanState};
pub use error::{Error, Result};
pub use policy::{choose_encoding, ContentKind, EncodingChoice, TransferEncoding};
pub use write::write_mime_body;
