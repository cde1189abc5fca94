//! Send-time configuration.
//!
//! A [`SendConfig`] is read-only for the duration of an encoding run; the
//! host application owns loading and persistence.

/// Configuration knobs consulted when a body part is finalized for sending.
#[derive(Debug, Clone)]
pub struct SendConfig {
    /// Allow 8-bit transfer encoding for text with high-bit content.
    ///
    /// When false, such content is downgraded to quoted-printable.
    pub allow_8bit: bool,
    /// Quoted-printable-encode text whose lines start with "From ", so that
    /// mbox-style delivery agents cannot mangle the body.
    pub encode_from: bool,
    /// Colon-separated list of charsets the source file may be in, tried in
    /// order until one decodes cleanly.
    pub assumed_charset: String,
    /// Colon-separated, preference-ordered list of candidate send charsets.
    pub send_charset: String,
}

impl Default for SendConfig {
    fn default() -> Self {
        Self {
            allow_8bit: true,
            encode_from: false,
            assumed_charset: "utf-8".to_string(),
            send_charset: "us-ascii:iso-8859-1:utf-8".to_string(),
        }
    }
}

impl SendConfig {
    /// The ordered source-charset candidates.
    pub fn assumed_charsets(&self) -> Vec<&str> {
        split_charset_list(&self.assumed_charset)
    }

    /// The ordered target-charset candidates.
    pub fn send_charsets(&self) -> Vec<&str> {
        split_charset_list(&self.send_charset)
    }
}

/// Splits a colon-separated charset list, dropping empty entries.
fn split_charset_list(list: &str) -> Vec<&str> {
    list.split(':')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = SendConfig::default();
        assert!(config.allow_8bit);
        assert!(!config.encode_from);
        assert_eq!(config.assumed_charsets(), vec!["utf-8"]);
        assert_eq!(
            config.send_charsets(),
            vec!["us-ascii", "iso-8859-1", "utf-8"]
        );
    }

    #[test]
    fn test_list_splitting_skips_empty_entries() {
        let config = SendConfig {
            send_charset: "utf-8:: iso-8859-2 :".to_string(),
            ..SendConfig::default()
        };
        assert_eq!(config.send_charsets(), vec!["utf-8", "iso-8859-2"]);
    }
}
