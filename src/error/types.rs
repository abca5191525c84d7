//! API error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Upstream returned {status}: {message}")]
    Upstream { status: StatusCode, message: String },

    #[error("Proxy error: {0}")]
    Proxy(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// 404 for any path the gateway does not serve
    pub fn endpoint_not_found() -> Self {
        ApiError::NotFound(
            "Endpoint not found. Use /mcp for MCP protocol communication.".to_string(),
        )
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Upstream { status, message } => (status, "upstream_error", message),
            ApiError::Proxy(msg) => (StatusCode::BAD_GATEWAY, "proxy_error", msg),
            ApiError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "Internal server error".to_string(),
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_type.to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// JSON body of every non-MCP error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            ApiError::endpoint_not_found().into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::Upstream {
                status: StatusCode::SERVICE_UNAVAILABLE,
                message: "down".to_string()
            }
            .into_response()
            .status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::Proxy("refused".to_string()).into_response().status(),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            ApiError::Internal(anyhow::anyhow!("boom")).into_response().status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
