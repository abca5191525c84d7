//! Backend credential type
//!
//! A `Credential` is an opaque API key. Its `Debug` and `Display` output is
//! redacted so keys can be passed to `tracing` fields without leaking them.

use crate::utils::truncate_with_suffix;
use std::fmt;

/// Number of leading characters kept when a credential is rendered
const VISIBLE_PREFIX: usize = 8;

// ============================================================================
// Credential
// ============================================================================

/// An opaque backend API key
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Credential(String);

impl Credential {
    /// Wrap a raw key. Surrounding whitespace is trimmed.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(raw.as_ref().trim().to_string())
    }

    /// Wrap a raw key, returning `None` when it is blank
    pub fn parse(raw: impl AsRef<str>) -> Option<Self> {
        let credential = Self::new(raw);
        if credential.0.is_empty() {
            None
        } else {
            Some(credential)
        }
    }

    /// The raw key, for building outbound headers
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Redacted form used in logs
    pub fn redacted(&self) -> String {
        if self.0.chars().count() <= VISIBLE_PREFIX {
            "***".to_string()
        } else {
            truncate_with_suffix(&self.0, VISIBLE_PREFIX, "...")
        }
    }
}

impl fmt::Display for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.redacted())
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Credential").field(&self.redacted()).finish()
    }
}

impl From<&str> for Credential {
    fn from(raw: &str) -> Self {
        Self::new(raw)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trims_and_rejects_blank() {
        assert_eq!(Credential::parse("  ctx7sk-abc ").unwrap().expose(), "ctx7sk-abc");
        assert!(Credential::parse("   ").is_none());
        assert!(Credential::parse("").is_none());
    }

    #[test]
    fn test_display_is_redacted() {
        let credential = Credential::new("ctx7sk-0123456789abcdef");
        assert_eq!(credential.to_string(), "ctx7sk-0...");
        assert!(!format!("{:?}", credential).contains("0123456789abcdef"));
    }

    #[test]
    fn test_short_key_fully_hidden() {
        assert_eq!(Credential::new("short").to_string(), "***");
    }
}
