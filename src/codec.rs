//! Whole-buffer base64 primitives.
//!
//! RFC 4648 standard alphabet with `=` padding. Decoding accepts a final
//! quartet that lacks its padding characters — some senders omit them —
//! but rejects every other malformed input rather than truncating.

use base64::alphabet;
use base64::engine::general_purpose::{GeneralPurpose, GeneralPurposeConfig};
use base64::engine::DecodePaddingMode;
use base64::Engine;

use crate::error::{Error, Result};

/// Standard alphabet, padded on encode, padding optional on decode.
const ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Encodes data as base64.
pub fn base64_encode(data: &[u8]) -> String {
    ENGINE.encode(data)
}

/// Decodes base64 data.
///
/// # Errors
///
/// Returns [`Error::Encoding`] for any byte outside the alphabet/pad set
/// or an impossible length; a missing final pad is tolerated.
pub fn base64_decode(data: &str) -> Result<Vec<u8>> {
    ENGINE
        .decode(data)
        .map_err(|e| Error::Encoding(format!("invalid base64: {e}")))
}
