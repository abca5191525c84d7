//! Text rendering of backend results for tool responses

use crate::schemas::docs::{SearchResponse, SearchResult};

const RESULT_SEPARATOR: &str = "\n----------\n";

pub const NO_LIBRARIES_FOUND: &str = "No libraries found matching the provided name.";
pub const NO_DOCUMENTATION_LIBRARIES: &str = "No documentation libraries found matching your query.";

const RESULTS_PREAMBLE: &str = "Available Libraries:

Each result includes:
- Library ID: m0x-context-compatible identifier (format: /org/project)
- Name: library or package name
- Description: short summary
- Code Snippets: number of available code examples
- Source Reputation: authority indicator (High, Medium, Low, or Unknown)
- Benchmark Score: quality indicator (100 is the highest score)
- Versions: versions that can be requested as /org/project/version when the user names one

For best results, pick the library whose name matches best, preferring higher source reputation, snippet coverage and benchmark score.
----------
";

/// Reputation label for a 0-10 trust score
pub fn source_reputation(trust_score: Option<f64>) -> &'static str {
    match trust_score {
        Some(score) if score >= 7.0 => "High",
        Some(score) if score >= 4.0 => "Medium",
        Some(score) if score >= 0.0 => "Low",
        _ => "Unknown",
    }
}

/// Render one search result as a block of `- Label: value` lines
pub fn format_search_result(result: &SearchResult) -> String {
    let mut lines = vec![
        format!("- Title: {}", result.title),
        format!("- m0x-context-compatible library ID: {}", result.id),
        format!("- Description: {}", result.description),
    ];

    if let Some(snippets) = result.total_snippets.filter(|&n| n != -1) {
        lines.push(format!("- Code Snippets: {}", snippets));
    }

    lines.push(format!(
        "- Source Reputation: {}",
        source_reputation(result.trust_score)
    ));

    if let Some(score) = result.benchmark_score.filter(|&s| s > 0.0) {
        lines.push(format!("- Benchmark Score: {}", score));
    }

    if let Some(versions) = result.versions.as_ref().filter(|v| !v.is_empty()) {
        lines.push(format!("- Versions: {}", versions.join(", ")));
    }

    lines.join("\n")
}

/// Render all results, separated by a divider line
pub fn format_search_results(response: &SearchResponse) -> String {
    if response.results.is_empty() {
        return NO_DOCUMENTATION_LIBRARIES.to_string();
    }

    response
        .results
        .iter()
        .map(format_search_result)
        .collect::<Vec<_>>()
        .join(RESULT_SEPARATOR)
}

/// Final text of a `resolve-library-id` call
pub fn resolve_library_text(response: &SearchResponse) -> String {
    if response.results.is_empty() {
        return match response.error.as_deref().filter(|e| !e.is_empty()) {
            Some(error) => error.to_string(),
            None => NO_LIBRARIES_FOUND.to_string(),
        };
    }

    format!("{}\n{}", RESULTS_PREAMBLE, format_search_results(response))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result() -> SearchResult {
        SearchResult {
            id: "/tokio-rs/axum".to_string(),
            title: "Axum".to_string(),
            description: "Web framework".to_string(),
            total_snippets: Some(512),
            trust_score: Some(9.0),
            benchmark_score: Some(87.5),
            versions: Some(vec!["v0.7.5".to_string(), "v0.6.20".to_string()]),
            ..Default::default()
        }
    }

    #[test]
    fn test_full_result() {
        let text = format_search_result(&result());
        assert_eq!(
            text,
            "- Title: Axum\n\
             - m0x-context-compatible library ID: /tokio-rs/axum\n\
             - Description: Web framework\n\
             - Code Snippets: 512\n\
             - Source Reputation: High\n\
             - Benchmark Score: 87.5\n\
             - Versions: v0.7.5, v0.6.20"
        );
    }

    #[test]
    fn test_optional_lines_are_skipped() {
        let sparse = SearchResult {
            total_snippets: Some(-1),
            trust_score: None,
            benchmark_score: Some(0.0),
            versions: Some(vec![]),
            ..result()
        };
        let text = format_search_result(&sparse);
        assert!(!text.contains("Code Snippets"));
        assert!(!text.contains("Benchmark Score"));
        assert!(!text.contains("Versions"));
        assert!(text.ends_with("- Source Reputation: Unknown"));
    }

    #[test]
    fn test_reputation_thresholds() {
        assert_eq!(source_reputation(Some(7.0)), "High");
        assert_eq!(source_reputation(Some(6.9)), "Medium");
        assert_eq!(source_reputation(Some(4.0)), "Medium");
        assert_eq!(source_reputation(Some(0.0)), "Low");
        assert_eq!(source_reputation(Some(-1.0)), "Unknown");
        assert_eq!(source_reputation(None), "Unknown");
    }

    #[test]
    fn test_results_are_separated() {
        let response = SearchResponse {
            results: vec![result(), result()],
            error: None,
        };
        assert_eq!(format_search_results(&response).matches("\n----------\n").count(), 1);
        assert!(resolve_library_text(&response).starts_with("Available Libraries:"));
    }

    #[test]
    fn test_empty_results() {
        assert_eq!(
            format_search_results(&SearchResponse::default()),
            NO_DOCUMENTATION_LIBRARIES
        );
        assert_eq!(resolve_library_text(&SearchResponse::default()), NO_LIBRARIES_FOUND);
        assert_eq!(
            resolve_library_text(&SearchResponse::failed("Invalid API key.")),
            "Invalid API key."
        );
    }
}
