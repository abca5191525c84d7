//! MCP method dispatch
//!
//! Transport-independent handling of JSON-RPC messages. Transports build a
//! [`RequestContext`] for each call and pass it in alongside the message.

use super::tools::{call_tool, tool_definitions};
use crate::schemas::jsonrpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse, JSONRPC_VERSION};
use crate::services::docs_api::DocsApiService;
use crate::services::request_context::{ClientInfo, RequestContext};
use serde_json::{json, Value};
use std::sync::Arc;

/// Protocol versions this server speaks, newest first
pub const SUPPORTED_PROTOCOL_VERSIONS: &[&str] = &["2025-06-18", "2025-03-26", "2024-11-05"];

pub const SERVER_INSTRUCTIONS: &str =
    "Use this server to retrieve up-to-date documentation and code examples for any library.";

/// Pick the protocol version to answer `initialize` with
///
/// A supported client version is echoed back; anything else gets the
/// newest version we support and the client decides whether to continue.
pub fn negotiate_protocol_version(requested: Option<&str>) -> &'static str {
    requested
        .and_then(|v| SUPPORTED_PROTOCOL_VERSIONS.iter().find(|s| **s == v))
        .copied()
        .unwrap_or(SUPPORTED_PROTOCOL_VERSIONS[0])
}

/// Client identity from `initialize` params (`clientInfo.name` / `clientInfo.version`)
pub fn client_info_from_initialize(params: &Value) -> Option<ClientInfo> {
    let info = params.get("clientInfo")?;
    let ide = info.get("name").and_then(Value::as_str).map(str::to_string);
    let version = info.get("version").and_then(Value::as_str).map(str::to_string);
    if ide.is_none() && version.is_none() {
        return None;
    }
    Some(ClientInfo { ide, version })
}

// ============================================================================
// MCP Handler
// ============================================================================

/// Handles MCP requests against the documentation backend
#[derive(Clone)]
pub struct McpHandler {
    docs: Arc<DocsApiService>,
    server_name: String,
    server_version: String,
}

impl McpHandler {
    pub fn new(
        docs: Arc<DocsApiService>,
        server_name: impl Into<String>,
        server_version: impl Into<String>,
    ) -> Self {
        Self {
            docs,
            server_name: server_name.into(),
            server_version: server_version.into(),
        }
    }

    pub fn docs(&self) -> &DocsApiService {
        &self.docs
    }

    /// Handle one raw JSON value from the wire
    ///
    /// Returns `None` for notifications.
    pub async fn handle_value(
        &self,
        message: Value,
        context: &RequestContext,
    ) -> Option<JsonRpcResponse> {
        let id = message.get("id").cloned().unwrap_or(Value::Null);
        match serde_json::from_value::<JsonRpcRequest>(message) {
            Ok(request) => self.handle(request, context).await,
            Err(e) => Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::invalid_request(format!("Invalid request: {}", e)),
            )),
        }
    }

    /// Handle a parsed request or notification
    pub async fn handle(
        &self,
        request: JsonRpcRequest,
        context: &RequestContext,
    ) -> Option<JsonRpcResponse> {
        let Some(id) = request.id.clone() else {
            tracing::debug!(method = %request.method, "Received notification");
            return None;
        };

        if request.jsonrpc != JSONRPC_VERSION {
            return Some(JsonRpcResponse::failure(
                id,
                JsonRpcError::invalid_request(format!(
                    "Unsupported jsonrpc version: {}",
                    request.jsonrpc
                )),
            ));
        }

        tracing::debug!(method = %request.method, id = %id, "Handling MCP request");

        let result = match request.method.as_str() {
            "initialize" => Ok(self.initialize(&request.params)),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(json!({ "tools": tool_definitions() })),
            "tools/call" => self.call(request.params, context).await,
            other => {
                tracing::warn!(method = %other, "Unknown MCP method");
                Err(JsonRpcError::method_not_found(other))
            }
        };

        Some(match result {
            Ok(value) => JsonRpcResponse::success(id, value),
            Err(error) => JsonRpcResponse::failure(id, error),
        })
    }

    fn initialize(&self, params: &Value) -> Value {
        let requested = params.get("protocolVersion").and_then(Value::as_str);
        let version = negotiate_protocol_version(requested);

        if let Some(info) = client_info_from_initialize(params) {
            tracing::info!(
                client = info.ide.as_deref().unwrap_or("unknown"),
                client_version = info.version.as_deref().unwrap_or("unknown"),
                protocol_version = version,
                "MCP client initialized"
            );
        }

        json!({
            "protocolVersion": version,
            "capabilities": {
                "tools": { "listChanged": false }
            },
            "serverInfo": {
                "name": self.server_name,
                "version": self.server_version
            },
            "instructions": SERVER_INSTRUCTIONS
        })
    }

    async fn call(&self, params: Value, context: &RequestContext) -> Result<Value, JsonRpcError> {
        let name = params
            .get("name")
            .and_then(Value::as_str)
            .ok_or_else(|| JsonRpcError::invalid_params("Missing tool name"))?
            .to_string();
        let arguments = params.get("arguments").cloned().unwrap_or(Value::Null);

        tracing::info!(
            tool = %name,
            transport = context.transport.map(|t| t.as_str()).unwrap_or("unknown"),
            "Calling tool"
        );

        let text = call_tool(&self.docs, &name, arguments, context).await?;
        Ok(json!({
            "content": [{ "type": "text", "text": text }]
        }))
    }
}

// ============================================================================
// Tests
// ============================================================================
