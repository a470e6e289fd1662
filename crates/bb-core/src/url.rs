//! URL scheme utilities for the hot path
//!
//! Scheme extraction works directly on string slices; only normalization
//! allocates.

// =============================================================================
// Scheme Extraction
// =============================================================================

/// Reasons a URL has no usable scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SchemeError {
    #[error("URL is empty")]
    Empty,
    #[error("URL has no scheme separator")]
    MissingColon,
    #[error("Invalid scheme character at offset {0}")]
    InvalidScheme(usize),
}

/// Extract the scheme token of `url` (without the trailing ':').
///
/// A scheme is an ASCII letter followed by letters, digits, '+', '-' or '.'.
#[inline]
pub fn parse_scheme(url: &str) -> Result<&str, SchemeError> {
    let bytes = url.trim_start().as_bytes();
    if bytes.is_empty() {
        return Err(SchemeError::Empty);
    }

    let colon_pos = bytes
        .iter()
        .position(|&b| b == b':')
        .ok_or(SchemeError::MissingColon)?;

    if colon_pos == 0 || !bytes[0].is_ascii_alphabetic() {
        return Err(SchemeError::InvalidScheme(0));
    }

    for (i, &b) in bytes[..colon_pos].iter().enumerate() {
        if !(b.is_ascii_alphanumeric() || b == b'+' || b == b'-' || b == b'.') {
            return Err(SchemeError::InvalidScheme(i));
        }
    }

    let start = url.len() - url.trim_start().len();
    Ok(&url[start..start + colon_pos])
}

/// Normalize a scheme for set membership: upper-case, keeping only
/// alphanumerics, '_' and '-'.
#[inline]
pub fn normalize_scheme(scheme: &str) -> String {
    scheme
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .map(|c| c.to_ascii_uppercase())
        .collect()
}

/// Parse and normalize in one step.
#[inline]
pub fn normalized_scheme(url: &str) -> Result<String, SchemeError> {
    parse_scheme(url).map(normalize_scheme)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_scheme() {
        assert_eq!(parse_scheme("https://example.com"), Ok("https"));
        assert_eq!(parse_scheme("data:text/html,hi"), Ok("data"));
        assert_eq!(parse_scheme("view-source:http://a"), Ok("view-source"));
        assert_eq!(parse_scheme("  about:blank"), Ok("about"));
    }

    #[test]
    fn test_parse_scheme_rejects() {
        assert_eq!(parse_scheme(""), Err(SchemeError::Empty));
        assert_eq!(parse_scheme("example.com/path"), Err(SchemeError::MissingColon));
        assert_eq!(parse_scheme(":foo"), Err(SchemeError::InvalidScheme(0)));
        assert_eq!(parse_scheme("1http://a"), Err(SchemeError::InvalidScheme(0)));
        assert_eq!(parse_scheme("ht tp://a"), Err(SchemeError::InvalidScheme(2)));
    }

    #[test]
    fn test_normalize_scheme() {
        assert_eq!(normalize_scheme("https"), "HTTPS");
        assert_eq!(normalize_scheme("moz-icon"), "MOZ-ICON");
        assert_eq!(normalize_scheme("svn+ssh"), "SVNSSH");
        assert_eq!(normalized_scheme("Chrome://browser"), Ok("CHROME".to_string()));
    }
}
