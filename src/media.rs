//! MIME token grammar and parameter formatting.
//!
//! Based on RFC 1521 and RFC 2045 token definitions; used when emitting
//! Content-Type parameters and validating boundary values.

/// Reports whether the character is in 'tspecials' as defined by RFC 1521 and RFC 2045.
///
/// tspecials := "(" / ")" / "<" / ">" / "@" / "," / ";" / ":" / "\" / <"> / "/" / "[" / "]" / "?" / "="
pub fn is_tspecial(c: char) -> bool {
    matches!(c, '(' | ')' | '<' | '>' | '@' | ',' | ';' | ':' | '\\' | '"' | '/' | '[' | ']' | '?' | '=')
}

/// Reports whether the character is in 'token' as defined by RFC 1521 and RFC 2045.
///
/// token := 1*<any (US-ASCII) CHAR except SPACE, CTLs, or tspecials>
pub fn is_token_char(c: char) -> bool {
    c > '\x20' && c < '\x7f' && !is_tspecial(c)
}

/// Reports whether the string is a valid 'token'.
///
/// A token must be non-empty and contain only valid token characters.
pub fn is_token(s: &str) -> bool {
    !s.is_empty() && s.chars().all(is_token_char)
}

/// Formats one `; name=value` parameter, quoting the value when it is not
/// a plain token.
pub fn format_parameter(name: &str, value: &str) -> String {
    if is_token(value) {
        format!("; {}={}", name, value)
    } else {
        let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
        format!("; {}=\"{}\"", name, escaped)
    }
}

/// Validates a multipart boundary value (RFC 2046: 1-70 characters from a
/// restricted set, no trailing space).
pub fn is_valid_boundary(boundary: &str) -> bool {
    if boundary.is_empty() || boundary.len() > 70 {
        return false;
    }
    boundary.chars().enumerate().all(|(i, ch)| {
        ch.is_ascii_alphanumeric()
            || matches!(ch, '\'' | '(' | ')' | '+' | '_' | ',' | '-' | '.' | '/' | ':' | '=' | '?')
            || (ch == ' ' && i != boundary.len() - 1)
    })
}
