//! MIME body descriptors.
//!
//! A [`Body`] is one node of the outbound message tree: either a leaf
//! backed by a source file, or a multipart container owning its children.
//! Children and siblings are owned exclusively through `parts`/`next`
//! links, so dropping a node drops its whole subtree.

use std::collections::HashMap;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::SystemTime;

use once_cell::sync::Lazy;
use tracing::{debug, warn};

use crate::config::SendConfig;
use crate::content::{finish, scan, ContentStats, ScanState};
use crate::charset::select_charset;
use crate::error::{Error, Result};
use crate::media::format_parameter;
use crate::policy::{
    binary_encoding, choose_encoding, ContentKind, EncodingChoice, TransferEncoding,
};
use crate::write::generate_boundary;

/// Content types guessed from a file extension when a part is attached.
static CONTENT_TYPES: Lazy<HashMap<&'static str, (&'static str, &'static str)>> =
    Lazy::new(|| {
        HashMap::from([
            ("txt", ("text", "plain")),
            ("text", ("text", "plain")),
            ("md", ("text", "plain")),
            ("log", ("text", "plain")),
            ("csv", ("text", "csv")),
            ("html", ("text", "html")),
            ("htm", ("text", "html")),
            ("css", ("text", "css")),
            ("xml", ("text", "xml")),
            ("json", ("application", "json")),
            ("pdf", ("application", "pdf")),
            ("zip", ("application", "zip")),
            ("gz", ("application", "gzip")),
            ("png", ("image", "png")),
            ("jpg", ("image", "jpeg")),
            ("jpeg", ("image", "jpeg")),
            ("gif", ("image", "gif")),
            ("svg", ("image", "svg+xml")),
            ("mp3", ("audio", "mpeg")),
            ("mp4", ("video", "mp4")),
            ("eml", ("message", "rfc822")),
        ])
    });

/// One node of a MIME body tree.
#[derive(Debug)]
pub struct Body {
    /// Top-level content type.
    pub kind: ContentKind,
    /// Content subtype, e.g. `plain` or `mixed`.
    pub subtype: String,
    /// Content-Type parameters in emission order (`name`, `boundary`, ...).
    pub parameters: Vec<(String, String)>,
    /// Selected send charset, if charset conversion applies.
    pub charset: Option<String>,
    /// Charset the source file decoded cleanly from.
    pub file_charset: Option<String>,
    /// Chosen transfer encoding; recomputed by [`update_encoding`](Self::update_encoding).
    pub encoding: TransferEncoding,
    /// Source file backing a leaf part.
    pub filename: Option<PathBuf>,
    /// Keep `charset` as-is instead of running the selector.
    pub force_charset: bool,
    /// Treat the content as opaque bytes; never convert.
    pub no_convert: bool,
    /// Cached content stats from the last analysis.
    pub stats: ContentStats,
    /// When the last analysis ran, for staleness checks.
    pub stamp: Option<SystemTime>,
    /// First child of a container; owns the subtree.
    pub parts: Option<Box<Body>>,
    /// Next sibling.
    pub next: Option<Box<Body>>,
}

impl Body {
    /// Creates an empty descriptor of the given type.
    pub fn new(kind: ContentKind, subtype: &str) -> Self {
        Self {
            kind,
            subtype: subtype.to_string(),
            parameters: Vec::new(),
            charset: None,
            file_charset: None,
            encoding: TransferEncoding::SevenBit,
            filename: None,
            force_charset: false,
            no_convert: false,
            stats: ContentStats::default(),
            stamp: None,
            parts: None,
            next: None,
        }
    }

    /// Creates a leaf descriptor for an attached file, guessing the content
    /// type from the extension (unknown extensions become
    /// `application/octet-stream`).
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let (kind, subtype) = path
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| CONTENT_TYPES.get(ext.to_ascii_lowercase().as_str()).copied())
            .unwrap_or(("application", "octet-stream"));
        let mut body = Body::new(ContentKind::from_type(kind), subtype);
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            body.parameters.push(("name".to_string(), name.to_string()));
        }
        body.filename = Some(path);
        body
    }

    /// Creates a multipart container owning `children`, with a fresh
    /// boundary guaranteed not to collide with any nested boundary.
    pub fn multipart(subtype: &str, children: Vec<Body>) -> Self {
        let mut body = Body::new(ContentKind::Multipart, subtype);
        let mut head: Option<Box<Body>> = None;
        for mut child in children.into_iter().rev() {
            child.next = head;
            head = Some(Box::new(child));
        }
        body.parts = head;

        let mut boundary = generate_boundary();
        while body.boundary_in_use(&boundary) {
            warn!(%boundary, "boundary collides with a nested part, re-rolling");
            boundary = generate_boundary();
        }
        body.parameters.push(("boundary".to_string(), boundary));
        body
    }

    /// The `boundary` parameter, if present.
    pub fn boundary(&self) -> Option<&str> {
        self.param("boundary")
    }

    /// True if any node in this subtree already uses `candidate` as its
    /// boundary.
    fn boundary_in_use(&self, candidate: &str) -> bool {
        if self.boundary() == Some(candidate) {
            return true;
        }
        let mut cursor = self.parts.as_deref();
        while let Some(child) = cursor {
            if child.boundary_in_use(candidate) {
                return true;
            }
            cursor = child.next.as_deref();
        }
        false
    }

    /// Looks up a Content-Type parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.parameters
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Iterates over the direct children of this node.
    pub fn children(&self) -> impl Iterator<Item = &Body> {
        let mut cursor = self.parts.as_deref();
        std::iter::from_fn(move || {
            let current = cursor?;
            cursor = current.next.as_deref();
            Some(current)
        })
    }

    /// True if this node is a container rather than a file-backed leaf.
    pub fn is_container(&self) -> bool {
        self.parts.is_some()
    }

    /// Formats the Content-Type header value for this part.
    pub fn content_type(&self) -> String {
        let mut value = format!("{}/{}", self.kind.as_str(), self.subtype);
        for (name, param) in &self.parameters {
            value.push_str(&format_parameter(name, param));
        }
        if let Some(charset) = &self.charset {
            value.push_str(&format_parameter("charset", charset));
        }
        value
    }

    /// Recomputes stats, charset and transfer encoding for this part.
    ///
    /// Containers recurse over their children first and aggregate the
    /// children's stats; leaves re-read their source file. Must be called
    /// again whenever the underlying file or an override flag changes.
    ///
    /// # Errors
    ///
    /// [`Error::SourceUnreadable`] if a leaf's file cannot be read. A
    /// failed charset selection is not an error: the part falls back to
    /// untagged 8-bit content.
    pub fn update_encoding<'a>(
        &'a mut self,
        config: &'a SendConfig,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(async move {
            if self.parts.is_some() {
                let mut aggregate = ContentStats::default();
                let mut cursor = self.parts.as_deref_mut();
                while let Some(child) = cursor {
                    child.update_encoding(config).await?;
                    aggregate.merge(&child.stats);
                    cursor = child.next.as_deref_mut();
                }
                self.stats = aggregate;
            } else if let Some(path) = self.filename.clone() {
                let content = tokio::fs::read(&path)
                    .await
                    .map_err(|e| Error::source_unreadable(&path, e))?;
                self.analyze(&content, config);
            } else {
                self.stats = ContentStats::default();
            }

            match choose_encoding(
                self.kind,
                &self.subtype,
                self.charset.as_deref(),
                &self.stats,
                config,
            ) {
                EncodingChoice::Use(encoding) => self.encoding = encoding,
                EncodingChoice::ConvertToSevenBit => self.transform_to_7bit(),
            }
            self.stamp = Some(SystemTime::now());
            debug!(
                content_type = %self.content_type(),
                encoding = self.encoding.as_str(),
                "encoding updated"
            );
            Ok(())
        })
    }

    /// Scans raw content and, for convertible text, runs charset selection.
    fn analyze(&mut self, content: &[u8], config: &SendConfig) {
        let mut state = ScanState::default();
        let mut stats = ContentStats::default();
        scan(content, &mut state, &mut stats);
        finish(&mut state, &mut stats);
        self.stats = stats;

        if self.kind == ContentKind::Text && !self.no_convert && !self.force_charset {
            match select_charset(
                content,
                &config.assumed_charsets(),
                &config.send_charsets(),
            ) {
                Ok(selection) => {
                    self.file_charset = Some(selection.file_charset);
                    self.charset = Some(selection.charset);
                    self.stats = selection.stats;
                }
                Err(_) => {
                    // No candidate worked: send untagged as opaque 8-bit.
                    self.file_charset = None;
                    self.charset = None;
                }
            }
        }
    }

    /// Recursively re-encodes the subtree so it survives a 7-bit transport.
    ///
    /// Leaves that were going to ride as raw 8-bit get a real transfer
    /// encoding chosen by the expansion formula; containers become 7-bit
    /// once all their children are safe.
    pub fn transform_to_7bit(&mut self) {
        if self.parts.is_some() {
            let mut cursor = self.parts.as_deref_mut();
            while let Some(child) = cursor {
                child.transform_to_7bit();
                cursor = child.next.as_deref_mut();
            }
            self.encoding = TransferEncoding::SevenBit;
            return;
        }

        let raw = matches!(
            self.encoding,
            TransferEncoding::SevenBit | TransferEncoding::EightBit
        );
        if raw && (self.stats.hibin > 0 || self.stats.lobin > 0 || self.stats.linemax > 990) {
            self.no_convert = true;
            self.force_charset = true;
            self.encoding = binary_encoding(&self.stats);
        }
    }

    /// True if the source file changed after the last analysis (or the
    /// part was never analyzed). Containers are never stale themselves.
    pub async fn is_stale(&self) -> bool {
        let Some(path) = self.filename.as_ref() else {
            return false;
        };
        let Some(stamp) = self.stamp else {
            return true;
        };
        match tokio::fs::metadata(path).await.and_then(|m| m.modified()) {
            Ok(modified) => modified > stamp,
            Err(_) => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_file_type_lookup() {
        let body = Body::from_file("/tmp/notes.txt");
        assert_eq!(body.kind, ContentKind::Text);
        assert_eq!(body.subtype, "plain");
        assert_eq!(body.param("name"), Some("notes.txt"));

        let body = Body::from_file("/tmp/photo.JPG");
        assert_eq!(body.kind, ContentKind::Image);
        assert_eq!(body.subtype, "jpeg");

        let body = Body::from_file("/tmp/blob.xyz");
        assert_eq!(body.kind, ContentKind::Application);
        assert_eq!(body.subtype, "octet-stream");
    }

    #[test]
    fn test_multipart_links_children_in_order() {
        let container = Body::multipart(
            "mixed",
            vec![
                Body::from_file("/tmp/a.txt"),
                Body::from_file("/tmp/b.png"),
                Body::from_file("/tmp/c.pdf"),
            ],
        );
        let subtypes: Vec<&str> = container
            .children()
            .map(|c| c.subtype.as_str())
            .collect();
        assert_eq!(subtypes, vec!["plain", "png", "pdf"]);
        assert!(container.is_container());

        let boundary = container.boundary().unwrap();
        assert_eq!(boundary.len(), 16);
        assert!(crate::media::is_valid_boundary(boundary));
    }

    #[test]
    fn test_nested_boundaries_differ() {
        let inner = Body::multipart("alternative", vec![Body::from_file("/tmp/a.txt")]);
        let inner_boundary = inner.boundary().unwrap().to_string();
        let outer = Body::multipart("mixed", vec![inner]);
        assert_ne!(outer.boundary().unwrap(), inner_boundary);
    }

    #[test]
    fn test_boundary_in_use_walks_the_subtree() {
        let mut leaf = Body::from_file("/tmp/a.txt");
        leaf.parameters
            .push(("boundary".to_string(), "LEAFTOKEN".to_string()));
        let inner = Body::multipart("alternative", vec![leaf]);
        let inner_boundary = inner.boundary().unwrap().to_string();
        let outer = Body::multipart("mixed", vec![inner, Body::from_file("/tmp/b.txt")]);

        assert!(outer.boundary_in_use(outer.boundary().unwrap()));
        assert!(outer.boundary_in_use(&inner_boundary));
        assert!(outer.boundary_in_use("LEAFTOKEN"));
        assert!(!outer.boundary_in_use("0000000000000000"));
    }

    #[test]
    fn test_content_type_formatting() {
        let mut body = Body::from_file("/tmp/read me.txt");
        body.charset = Some("iso-8859-1".to_string());
        assert_eq!(
            body.content_type(),
            "text/plain; name=\"read me.txt\"; charset=iso-8859-1"
        );
    }

    #[test]
    fn test_transform_to_7bit() {
        let mut text = Body::from_file("/tmp/a.txt");
        text.encoding = TransferEncoding::EightBit;
        text.stats.ascii = 900;
        text.stats.hibin = 40;

        let mut binary = Body::from_file("/tmp/b.bin");
        binary.encoding = TransferEncoding::EightBit;
        binary.stats.hibin = 700;
        binary.stats.ascii = 100;

        let mut clean = Body::from_file("/tmp/c.txt");
        clean.encoding = TransferEncoding::SevenBit;
        clean.stats.ascii = 100;

        let mut container = Body::multipart("mixed", vec![text, binary, clean]);
        container.transform_to_7bit();

        let encodings: Vec<TransferEncoding> =
            container.children().map(|c| c.encoding).collect();
        assert_eq!(
            encodings,
            vec![
                TransferEncoding::QuotedPrintable,
                TransferEncoding::Base64,
                TransferEncoding::SevenBit,
            ]
        );
        assert_eq!(container.encoding, TransferEncoding::SevenBit);
        assert!(container.children().nth(1).unwrap().no_convert);
    }
}
