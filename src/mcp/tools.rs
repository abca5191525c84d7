//! MCP tool definitions and execution
//!
//! Two read-only tools are exposed:
//! - `resolve-library-id`: find the library ID for a package name
//! - `query-docs`: fetch documentation for a library ID

use super::format::resolve_library_text;
use crate::schemas::jsonrpc::JsonRpcError;
use crate::services::docs_api::DocsApiService;
use crate::services::request_context::RequestContext;
use serde::Deserialize;
use serde_json::{json, Value};

pub const RESOLVE_LIBRARY_ID: &str = "resolve-library-id";
pub const QUERY_DOCS: &str = "query-docs";

/// Arguments for `resolve-library-id`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolveLibraryIdArgs {
    pub query: String,
    pub library_name: String,
}

/// Arguments for `query-docs`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryDocsArgs {
    pub library_id: String,
    pub query: String,
}

/// Tool schemas returned by `tools/list`
pub fn tool_definitions() -> Vec<Value> {
    vec![
        json!({
            "name": RESOLVE_LIBRARY_ID,
            "title": "Resolve Library ID",
            "description": "Resolves a package or product name to a m0x-context-compatible library ID and returns matching libraries.\n\n\
                You MUST call this tool before 'query-docs' to obtain a valid m0x-context-compatible library ID, \
                unless the user supplies one in the format '/org/project' or '/org/project/version'.\n\n\
                Selection process:\n\
                1. Analyze the query to understand what library or package the user is looking for\n\
                2. Return the most relevant match based on name similarity, description relevance, \
                documentation coverage, source reputation and benchmark score\n\n\
                If no good matches exist, say so and suggest refining the query.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "The question or task you need help with. Used to rank library results by relevance."
                    },
                    "libraryName": {
                        "type": "string",
                        "description": "Library name to search for and retrieve a m0x-context-compatible library ID."
                    }
                },
                "required": ["query", "libraryName"]
            },
            "annotations": {
                "readOnlyHint": true
            }
        }),
        json!({
            "name": QUERY_DOCS,
            "title": "Query Documentation",
            "description": "Retrieves up-to-date documentation and code examples for a library.\n\n\
                You must call 'resolve-library-id' first to obtain the exact m0x-context-compatible library ID, \
                unless the user provides one in the format '/org/project' or '/org/project/version'.",
            "inputSchema": {
                "type": "object",
                "properties": {
                    "libraryId": {
                        "type": "string",
                        "description": "Exact m0x-context-compatible library ID (e.g. '/mongodb/docs', '/vercel/next.js', '/vercel/next.js/v14.3.0-canary.87') retrieved from 'resolve-library-id' or supplied by the user."
                    },
                    "query": {
                        "type": "string",
                        "description": "The question or task you need help with. Be specific and include relevant details."
                    }
                },
                "required": ["libraryId", "query"]
            },
            "annotations": {
                "readOnlyHint": true
            }
        }),
    ]
}

/// Execute a tool call and return its text output
pub async fn call_tool(
    docs: &DocsApiService,
    name: &str,
    arguments: Value,
    context: &RequestContext,
) -> Result<String, JsonRpcError> {
    match name {
        RESOLVE_LIBRARY_ID => {
            let args: ResolveLibraryIdArgs = parse_arguments(name, arguments)?;
            let response = docs
                .search_libraries(&args.query, &args.library_name, context)
                .await;
            Ok(resolve_library_text(&response))
        }
        QUERY_DOCS => {
            let args: QueryDocsArgs = parse_arguments(name, arguments)?;
            let response = docs
                .fetch_context(&args.library_id, &args.query, context)
                .await;
            Ok(response.data)
        }
        other => Err(JsonRpcError::invalid_params(format!("Unknown tool: {}", other))),
    }
}

fn parse_arguments<T: serde::de::DeserializeOwned>(
    tool: &str,
    arguments: Value,
) -> Result<T, JsonRpcError> {
    let arguments = if arguments.is_null() {
        json!({})
    } else {
        arguments
    };
    serde_json::from_value(arguments).map_err(|e| {
        JsonRpcError::invalid_params(format!("Invalid arguments for tool {}: {}", tool, e))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_definitions() {
        let tools = tool_definitions();
        let names: Vec<_> = tools.iter().map(|t| t["name"].as_str().unwrap()).collect();
        assert_eq!(names, vec![RESOLVE_LIBRARY_ID, QUERY_DOCS]);

        for tool in &tools {
            assert_eq!(tool["annotations"]["readOnlyHint"], true);
            assert_eq!(tool["inputSchema"]["type"], "object");
        }
        assert_eq!(tools[0]["inputSchema"]["required"], json!(["query", "libraryName"]));
        assert_eq!(tools[1]["inputSchema"]["required"], json!(["libraryId", "query"]));
    }

    #[test]
    fn test_parse_arguments_reports_missing_field() {
        let err = parse_arguments::<QueryDocsArgs>(QUERY_DOCS, json!({"query": "x"})).unwrap_err();
        assert_eq!(err.code, crate::schemas::jsonrpc::INVALID_PARAMS);
        assert!(err.message.contains("libraryId"));

        assert!(parse_arguments::<QueryDocsArgs>(QUERY_DOCS, Value::Null).is_err());
    }
}
