//! Streamable HTTP endpoint for MCP
//!
//! Each POST is stateless: the body is one JSON-RPC message or a batch, and
//! the request context is rebuilt from the request's own headers.

use axum::{
    body::Bytes,
    extract::{ConnectInfo, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use futures::{future::join_all, FutureExt};
use serde_json::Value;
use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;

use crate::mcp::McpHandler;
use crate::middleware::{extract_api_key, extract_client_ip};
use crate::schemas::jsonrpc::{JsonRpcError, JsonRpcResponse, METHOD_NOT_ALLOWED};
use crate::server::state::AppState;
use crate::services::{ClientInfo, RequestContext, TransportKind};

/// Build the per-call context from request metadata
pub fn request_context(headers: &HeaderMap, peer: Option<SocketAddr>) -> RequestContext {
    let client_info = headers
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .and_then(ClientInfo::from_user_agent);

    let mut context = RequestContext::new(TransportKind::Http)
        .with_api_key(extract_api_key(headers))
        .with_client_info(client_info);
    context.client_ip = extract_client_ip(headers, peer);
    context
}

/// POST /mcp and POST /mcp/oauth
pub async fn handle_mcp(
    State(state): State<AppState>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let context = request_context(&headers, peer.map(|ConnectInfo(addr)| addr));

    let message: Value = match serde_json::from_slice(&body) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(error = %e, "Rejected unparseable MCP body");
            return jsonrpc_error(
                StatusCode::BAD_REQUEST,
                JsonRpcError::parse_error(e),
            );
        }
    };

    // A panic while dispatching becomes a JSON-RPC internal error instead of
    // a dropped connection.
    match AssertUnwindSafe(dispatch(&state.mcp, message, &context))
        .catch_unwind()
        .await
    {
        Ok(response) => response,
        Err(_) => {
            tracing::error!("MCP request handler panicked");
            jsonrpc_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                JsonRpcError::internal_error("Internal server error"),
            )
        }
    }
}

async fn dispatch(handler: &McpHandler, message: Value, context: &RequestContext) -> Response {
    match message {
        Value::Array(batch) if batch.is_empty() => jsonrpc_error(
            StatusCode::BAD_REQUEST,
            JsonRpcError::invalid_request("Invalid request: empty batch"),
        ),
        Value::Array(batch) => {
            tracing::debug!(size = batch.len(), "Handling MCP batch");
            let responses: Vec<JsonRpcResponse> = join_all(
                batch
                    .into_iter()
                    .map(|message| handler.handle_value(message, context)),
            )
            .await
            .into_iter()
            .flatten()
            .collect();

            if responses.is_empty() {
                StatusCode::ACCEPTED.into_response()
            } else {
                Json(responses).into_response()
            }
        }
        message => match handler.handle_value(message, context).await {
            Some(response) => Json(response).into_response(),
            None => StatusCode::ACCEPTED.into_response(),
        },
    }
}

/// GET and DELETE on the MCP paths
///
/// No server-initiated stream and no sessions to terminate.
pub async fn method_not_allowed() -> Response {
    let mut response = jsonrpc_error(
        StatusCode::METHOD_NOT_ALLOWED,
        JsonRpcError::new(METHOD_NOT_ALLOWED, "Method not allowed."),
    );
    response
        .headers_mut()
        .insert(header::ALLOW, HeaderValue::from_static("POST"));
    response
}

fn jsonrpc_error(status: StatusCode, error: JsonRpcError) -> Response {
    (status, Json(JsonRpcResponse::failure(Value::Null, error))).into_response()
}
