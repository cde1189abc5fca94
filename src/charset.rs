//! Charset selection for outbound content.
//!
//! The selector decodes the source bytes into a UTF-8 pivot once, then
//! scores every candidate target charset by how many characters it would
//! have to substitute. The candidate with the lowest score wins; ties go to
//! the earliest-listed candidate. Stats are gathered from each candidate's
//! actual output bytes, so the transfer-encoding policy later sees the
//! content exactly as it would go on the wire.

use encoding_rs::{DecoderResult, EncoderResult, Encoding, UTF_8};
use tracing::{debug, trace};

use crate::content::{finish, scan, ContentStats, ScanState};
use crate::error::{Error, Result};

/// The outcome of a charset selection: the source charset that decoded
/// cleanly, the winning target charset, and the stats of the converted
/// content.
#[derive(Debug, Clone)]
pub struct CharsetSelection {
    /// The source charset the file content was interpreted in.
    pub file_charset: String,
    /// The chosen send charset.
    pub charset: String,
    /// Substitution count of the winning candidate (0 means lossless).
    pub score: usize,
    /// Stats over the winning candidate's output bytes.
    pub stats: ContentStats,
}

/// Picks the least-lossy target charset for `content`.
///
/// `fromcodes` are tried in order until one decodes the content without a
/// malformed sequence; `tocodes` are the preference-ordered send candidates.
/// Candidates with unknown labels are excluded. If no source candidate
/// yields any scoreable target, returns [`Error::ConversionImpossible`] and
/// the caller should fall back to sending the content untagged as 8-bit.
pub fn select_charset(
    content: &[u8],
    fromcodes: &[&str],
    tocodes: &[&str],
) -> Result<CharsetSelection> {
    for &from in fromcodes {
        let Some(source) = Converter::for_label(from) else {
            trace!(charset = from, "unknown source charset label");
            continue;
        };
        let Some(pivot) = source.decode_strict(content) else {
            trace!(charset = from, "content is malformed in source charset");
            continue;
        };

        let mut best: Option<(usize, usize, ContentStats)> = None;
        for (index, &to) in tocodes.iter().enumerate() {
            let Some(target) = Converter::for_label(to) else {
                trace!(charset = to, "unknown target charset label");
                continue;
            };
            let (score, stats) = target.score(&pivot);
            trace!(charset = to, score, "candidate scored");
            // Strict comparison keeps the earliest candidate on a tie.
            if best.map_or(true, |(best_score, _, _)| score < best_score) {
                best = Some((score, index, stats));
            }
        }

        if let Some((score, index, stats)) = best {
            debug!(
                from = from,
                to = tocodes[index],
                score,
                "charset selected"
            );
            return Ok(CharsetSelection {
                file_charset: from.to_string(),
                charset: tocodes[index].to_string(),
                score,
                stats,
            });
        }
    }

    Err(Error::ConversionImpossible)
}

/// Converts content for writing, using the charsets recorded by a previous
/// selection. Unmappable characters become `?`, matching how they were
/// scored. If either label is unknown or the content no longer decodes, the
/// bytes are passed through untouched.
pub fn convert_content(content: &[u8], from: &str, to: &str) -> Vec<u8> {
    let pivot = match Converter::for_label(from).and_then(|c| c.decode_strict(content)) {
        Some(pivot) => pivot,
        None => return content.to_vec(),
    };
    match Converter::for_label(to) {
        Some(target) => target.encode_lossy(&pivot).0,
        None => content.to_vec(),
    }
}

/// A named-charset converter over the UTF-8 pivot.
///
/// `us-ascii` gets a built-in strict implementation: the Encoding Standard
/// aliases it to windows-1252, which would make every Latin-1 byte look
/// exactly representable and defeat the lossiness score.
enum Converter {
    Ascii,
    Utf8,
    Named(&'static Encoding),
}

impl Converter {
    fn for_label(label: &str) -> Option<Converter> {
        let label = label.trim();
        if label.eq_ignore_ascii_case("us-ascii") || label.eq_ignore_ascii_case("ascii") {
            return Some(Converter::Ascii);
        }
        let encoding = Encoding::for_label(label.as_bytes())?;
        // UTF-16 and replacement cannot be encode targets; their output
        // encoding is UTF-8.
        let encoding = encoding.output_encoding();
        if encoding == UTF_8 {
            Some(Converter::Utf8)
        } else {
            Some(Converter::Named(encoding))
        }
    }

    /// Decodes into the pivot, failing on any malformed sequence.
    fn decode_strict(&self, content: &[u8]) -> Option<String> {
        match self {
            Converter::Ascii => {
                if content.is_ascii() {
                    Some(String::from_utf8(content.to_vec()).ok()?)
                } else {
                    None
                }
            }
            Converter::Utf8 => String::from_utf8(content.to_vec()).ok(),
            Converter::Named(encoding) => {
                let mut decoder = encoding.new_decoder_without_bom_handling();
                let capacity = decoder
                    .max_utf8_buffer_length_without_replacement(content.len())?;
                let mut pivot = String::with_capacity(capacity);
                let (result, _) =
                    decoder.decode_to_string_without_replacement(content, &mut pivot, true);
                match result {
                    DecoderResult::InputEmpty => Some(pivot),
                    _ => None,
                }
            }
        }
    }

    /// Scores the pivot against this target: substitution count plus the
    /// stats of the actual output bytes.
    fn score(&self, pivot: &str) -> (usize, ContentStats) {
        match self {
            // The pivot itself is the output; no second conversion.
            Converter::Utf8 => {
                let mut state = ScanState::default();
                let mut stats = ContentStats::default();
                scan(pivot.as_bytes(), &mut state, &mut stats);
                finish(&mut state, &mut stats);
                (0, stats)
            }
            _ => {
                let (bytes, score) = self.encode_lossy(pivot);
                let mut state = ScanState::default();
                let mut stats = ContentStats::default();
                scan(&bytes, &mut state, &mut stats);
                finish(&mut state, &mut stats);
                (score, stats)
            }
        }
    }

    /// Encodes the pivot, substituting `?` for each unmappable character.
    /// Returns the output bytes and the substitution count.
    fn encode_lossy(&self, pivot: &str) -> (Vec<u8>, usize) {
        match self {
            Converter::Ascii => {
                let mut out = Vec::with_capacity(pivot.len());
                let mut substitutions = 0;
                for ch in pivot.chars() {
                    if ch.is_ascii() {
                        out.push(ch as u8);
                    } else {
                        out.push(b'?');
                        substitutions += 1;
                    }
                }
                (out, substitutions)
            }
            Converter::Utf8 => (pivot.as_bytes().to_vec(), 0),
            Converter::Named(encoding) => {
                let mut encoder = encoding.new_encoder();
                let mut out = Vec::with_capacity(pivot.len() + 16);
                let mut substitutions = 0;
                let mut buf = [0u8; 1024];
                let mut input = pivot;
                loop {
                    let (result, read, written) =
                        encoder.encode_from_utf8_without_replacement(input, &mut buf, true);
                    out.extend_from_slice(&buf[..written]);
                    input = &input[read..];
                    match result {
                        EncoderResult::InputEmpty => break,
                        EncoderResult::OutputFull => {}
                        EncoderResult::Unmappable(_) => {
                            out.push(b'?');
                            substitutions += 1;
                        }
                    }
                }
                (out, substitutions)
            }
        }
    }
}
