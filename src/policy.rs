//! Transfer-encoding policy.
//!
//! A pure mapping from content stats and configuration to the MIME
//! transfer encoding a part should be sent with. No side effects and no
//! hidden state: the same inputs always produce the same choice.

use crate::config::SendConfig;
use crate::content::ContentStats;

/// MIME content-transfer-encodings this engine can emit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferEncoding {
    /// Verbatim copy; content is already 7-bit clean with short lines.
    SevenBit,
    /// Verbatim copy of 8-bit text; requires an 8BITMIME-capable transport.
    EightBit,
    /// RFC 2045 quoted-printable.
    QuotedPrintable,
    /// RFC 2045 base64.
    Base64,
}

impl TransferEncoding {
    /// The header value for this encoding.
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferEncoding::SevenBit => "7bit",
            TransferEncoding::EightBit => "8bit",
            TransferEncoding::QuotedPrintable => "quoted-printable",
            TransferEncoding::Base64 => "base64",
        }
    }
}

/// Broad part category the policy distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// `text/*`
    Text,
    /// `message/*`
    Message,
    /// `multipart/*`
    Multipart,
    /// `application/*`
    Application,
    /// `image/*`
    Image,
    /// `audio/*`
    Audio,
    /// `video/*`
    Video,
}

impl ContentKind {
    /// The lowercase top-level type name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Message => "message",
            ContentKind::Multipart => "multipart",
            ContentKind::Application => "application",
            ContentKind::Image => "image",
            ContentKind::Audio => "audio",
            ContentKind::Video => "video",
        }
    }

    /// Parses a top-level type name; unknown names map to `application`.
    pub fn from_type(name: &str) -> ContentKind {
        match name.to_ascii_lowercase().as_str() {
            "text" => ContentKind::Text,
            "message" => ContentKind::Message,
            "multipart" => ContentKind::Multipart,
            "image" => ContentKind::Image,
            "audio" => ContentKind::Audio,
            "video" => ContentKind::Video,
            _ => ContentKind::Application,
        }
    }
}

/// The policy's verdict for one part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingChoice {
    /// Send with this transfer encoding.
    Use(TransferEncoding),
    /// The nested message/multipart structure must itself be re-encoded to
    /// become 7-bit clean; a transfer encoding alone is not enough.
    ConvertToSevenBit,
}

/// Maps a part's category, content stats and configuration to a transfer
/// encoding.
///
/// `charset` is the already-selected send charset, if any; it matters only
/// for the ISO-2022 exception (those encodings use ESC bytes that would
/// otherwise force quoted-printable onto perfectly transportable text).
pub fn choose_encoding(
    kind: ContentKind,
    subtype: &str,
    charset: Option<&str>,
    stats: &ContentStats,
    config: &SendConfig,
) -> EncodingChoice {
    use EncodingChoice::Use;
    use TransferEncoding::*;

    match kind {
        ContentKind::Text => {
            if (stats.lobin > 0 && !is_iso_2022(charset))
                || stats.linemax > 990
                || (stats.from && config.encode_from)
            {
                Use(QuotedPrintable)
            } else if stats.hibin > 0 {
                if config.allow_8bit {
                    Use(EightBit)
                } else {
                    Use(QuotedPrintable)
                }
            } else {
                Use(SevenBit)
            }
        }
        ContentKind::Message | ContentKind::Multipart => {
            if stats.lobin > 0 || stats.hibin > 0 {
                if config.allow_8bit && stats.lobin == 0 {
                    Use(EightBit)
                } else {
                    EncodingChoice::ConvertToSevenBit
                }
            } else {
                Use(SevenBit)
            }
        }
        ContentKind::Application if subtype.eq_ignore_ascii_case("pgp-keys") => Use(SevenBit),
        _ => Use(binary_encoding(stats)),
    }
}

/// Picks between base64 and quoted-printable for opaque content by
/// projected output size: base64 costs a flat ~33%, quoted-printable costs
/// ~200% per escaped byte.
pub fn binary_encoding(stats: &ContentStats) -> TransferEncoding {
    let total = (stats.lobin + stats.hibin + stats.ascii) as f64;
    let escaped = (stats.lobin + stats.hibin) as f64;
    if 1.33 * total < 3.0 * escaped + stats.ascii as f64 {
        TransferEncoding::Base64
    } else {
        TransferEncoding::QuotedPrintable
    }
}

// Labels come from user configuration, so the prefix is compared on bytes
// rather than sliced as a str.
fn is_iso_2022(charset: Option<&str>) -> bool {
    charset.map_or(false, |cs| {
        cs.as_bytes()
            .get(..8)
            .map_or(false, |prefix| prefix.eq_ignore_ascii_case(b"iso-2022"))
    })
}
