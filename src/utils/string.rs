//! String helpers for log output
//!
//! Backend bodies and malformed client frames can be arbitrarily long;
//! anything echoed into a log line is cut to a bounded preview first.

/// Longest preview of an untrusted payload written to a log line
pub const LOG_PREVIEW_CHARS: usize = 500;

/// Truncate a string to at most `max_chars` characters
///
/// Cuts on a character boundary, never inside a multi-byte sequence.
///
/// # Example
/// ```
/// use docs_mcp_gateway::utils::truncate_str;
///
/// let text = "résumé";
/// assert_eq!(truncate_str(text, 2), "ré");
/// assert_eq!(truncate_str(text, 100), "résumé");
/// ```
pub fn truncate_str(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Truncate a string and append `suffix` if anything was cut
///
/// # Example
/// ```
/// use docs_mcp_gateway::utils::truncate_with_suffix;
///
/// assert_eq!(truncate_with_suffix("ctx7sk-1234567890", 8, "..."), "ctx7sk-1...");
/// assert_eq!(truncate_with_suffix("short", 8, "..."), "short");
/// ```
pub fn truncate_with_suffix(s: &str, max_chars: usize, suffix: &str) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        format!("{}{}", truncate_str(s, max_chars), suffix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_multibyte_boundary() {
        let text = "日本語のドキュメント";
        assert_eq!(truncate_str(text, 3), "日本語");
        assert_eq!(truncate_str(text, 0), "");
        assert_eq!(truncate_str(text, 50), text);
    }

    #[test]
    fn test_truncate_with_suffix_only_when_cut() {
        assert_eq!(truncate_with_suffix("{\"jsonrpc\":\"2.0\"", 5, "..."), "{\"jso...");
        assert_eq!(truncate_with_suffix("12345", 5, "..."), "12345");
        assert_eq!(truncate_with_suffix("", 5, "..."), "");
    }

    #[test]
    fn test_preview_bound_applies_to_long_bodies() {
        let body = "x".repeat(LOG_PREVIEW_CHARS * 2);
        assert_eq!(truncate_str(&body, LOG_PREVIEW_CHARS).len(), LOG_PREVIEW_CHARS);
    }
}
