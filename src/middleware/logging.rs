//! Request logging middleware
//!
//! Logs every HTTP request with a trace ID for correlation. The trace ID is
//! taken from `x-trace-id` or `x-request-id` when the caller sends one,
//! stored in request extensions and echoed back on the response.

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Header name for trace ID
pub const TRACE_ID_HEADER: &str = "x-trace-id";

/// Header name for request ID (alias for trace ID)
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// MCP protocol version announced by streamable HTTP clients
pub const MCP_PROTOCOL_VERSION_HEADER: &str = "mcp-protocol-version";

/// Extension type for storing trace ID in request extensions
#[derive(Clone, Debug)]
pub struct TraceId(pub String);

impl TraceId {
    /// Generate a new trace ID
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Get the trace ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Reuse the caller's trace ID if present, otherwise generate one
    pub fn from_headers(headers: &HeaderMap) -> Self {
        [TRACE_ID_HEADER, REQUEST_ID_HEADER]
            .iter()
            .find_map(|name| header_str(headers, name))
            .filter(|v| !v.is_empty())
            .map(|v| Self(v.to_string()))
            .unwrap_or_default()
    }
}

impl Default for TraceId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TraceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Middleware to log HTTP requests and responses
///
/// ```ignore
/// Router::new()
///     .layer(axum::middleware::from_fn(log_request))
/// ```
pub async fn log_request(mut request: Request, next: Next) -> Response<Body> {
    let start = Instant::now();
    let trace_id = TraceId::from_headers(request.headers());

    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let user_agent = header_str(request.headers(), header::USER_AGENT.as_str()).unwrap_or("-").to_string();
    let protocol_version = header_str(request.headers(), MCP_PROTOCOL_VERSION_HEADER)
        .unwrap_or("-")
        .to_string();

    tracing::info!(
        trace_id = %trace_id,
        method = %method,
        path = %path,
        user_agent = %user_agent,
        mcp_protocol_version = %protocol_version,
        "Incoming request"
    );

    request.extensions_mut().insert(trace_id.clone());

    let span = tracing::info_span!(
        "http_request",
        trace_id = %trace_id,
        method = %method,
        path = %path,
    );
    let mut response = next.run(request).instrument(span).await;

    let duration_ms = format!("{:.2}", start.elapsed().as_secs_f64() * 1000.0);
    log_completion(response.status(), &trace_id, &path, &duration_ms);

    if let Ok(value) = HeaderValue::from_str(trace_id.as_str()) {
        response.headers_mut().insert(TRACE_ID_HEADER, value.clone());
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }

    response
}

fn log_completion(status: StatusCode, trace_id: &TraceId, path: &str, duration_ms: &str) {
    let status_code = status.as_u16();
    if status.is_server_error() {
        tracing::error!(trace_id = %trace_id, path = %path, status = status_code, duration_ms = %duration_ms, "Server error");
    } else if status.is_client_error() {
        tracing::warn!(trace_id = %trace_id, path = %path, status = status_code, duration_ms = %duration_ms, "Client error");
    } else {
        tracing::info!(trace_id = %trace_id, path = %path, status = status_code, duration_ms = %duration_ms, "Request completed");
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trace_id_generation() {
        let trace_id = TraceId::new();
        // UUID v4 format: xxxxxxxx-xxxx-4xxx-yxxx-xxxxxxxxxxxx
        assert_eq!(trace_id.0.len(), 36);
    }

    #[test]
    fn test_trace_id_prefers_caller_header() {
        let mut headers = HeaderMap::new();
        headers.insert(REQUEST_ID_HEADER, HeaderValue::from_static("req-1"));
        assert_eq!(TraceId::from_headers(&headers).as_str(), "req-1");

        headers.insert(TRACE_ID_HEADER, HeaderValue::from_static("trace-1"));
        assert_eq!(TraceId::from_headers(&headers).as_str(), "trace-1");
    }

    #[test]
    fn test_trace_id_generated_when_absent() {
        let trace_id = TraceId::from_headers(&HeaderMap::new());
        assert_eq!(trace_id.as_str().len(), 36);
    }
}
