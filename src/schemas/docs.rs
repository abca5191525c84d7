//! Documentation backend wire types
//!
//! Payloads exchanged with the documentation backend's `/v2/libs/search`
//! and `/v2/context` endpoints.

use serde::{Deserialize, Deserializer, Serialize};

// ============================================================================
// Search
// ============================================================================

/// One library returned by a search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Library identifier in `/org/project` form
    pub id: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,

    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<i64>,

    /// Number of indexed snippets, `-1` when unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_snippets: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stars: Option<i64>,

    /// Source reputation on a 0-10 scale, negative when unknown
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub trust_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub benchmark_score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub versions: Option<Vec<String>>,
}

/// Result of a library search
///
/// Failures are reported through `error` with an empty `results` list, so
/// callers never have to handle a fault.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SearchResponse {
    #[serde(default, deserialize_with = "null_as_default")]
    pub results: Vec<SearchResult>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SearchResponse {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            results: Vec::new(),
            error: Some(message.into()),
        }
    }
}

/// The backend sends `null` for fields it has no value for
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// Context
// ============================================================================

/// Result of a documentation fetch: the documentation text or a diagnostic
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextResponse {
    pub data: String,
}

impl ContextResponse {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Error body the backend may attach to a non-2xx response
#[derive(Debug, Clone, Deserialize)]
pub struct BackendErrorBody {
    #[serde(default)]
    pub message: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_response_tolerates_sparse_results() {
        let body = r#"{"results":[{"id":"/vercel/next.js","title":"Next.js","trustScore":9.1,"versions":["v14.3.0"]}]}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();

        assert!(parsed.error.is_none());
        let first = &parsed.results[0];
        assert_eq!(first.id, "/vercel/next.js");
        assert_eq!(first.description, "");
        assert_eq!(first.trust_score, Some(9.1));
        assert_eq!(first.total_snippets, None);
    }

    #[test]
    fn test_null_fields_become_empty() {
        let body = r#"{"results":[{"id":"/a/b","title":null,"description":null},{"id":"/c/d"}]}"#;
        let parsed: SearchResponse = serde_json::from_str(body).unwrap();

        assert_eq!(parsed.results.len(), 2);
        assert_eq!(parsed.results[0].title, "");
        assert_eq!(parsed.results[0].description, "");
        assert_eq!(parsed.results[1].title, "");

        let empty: SearchResponse = serde_json::from_str(r#"{"results":null}"#).unwrap();
        assert!(empty.results.is_empty());
    }

    #[test]
    fn test_failed_search_response_serializes_error() {
        let value = serde_json::to_value(SearchResponse::failed("nope")).unwrap();
        assert_eq!(value, serde_json::json!({"results": [], "error": "nope"}));
    }
}
