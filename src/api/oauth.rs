//! OAuth discovery endpoints
//!
//! `/.well-known/oauth-protected-resource` describes this server as a
//! protected resource. `/.well-known/oauth-authorization-server` relays the
//! authorization server's own metadata so clients that only know the MCP
//! origin can still discover it.

use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;
use crate::server::state::AppState;

const AUTHORIZATION_SERVER_METADATA_PATH: &str = "/.well-known/oauth-authorization-server";

/// Protected resource metadata (RFC 9728)
#[derive(Debug, Serialize)]
pub struct ProtectedResourceMetadata {
    pub resource: String,
    pub authorization_servers: Vec<String>,
    pub scopes_supported: Vec<&'static str>,
    pub bearer_methods_supported: Vec<&'static str>,
}

/// GET /.well-known/oauth-protected-resource
pub async fn protected_resource(State(state): State<AppState>) -> Json<ProtectedResourceMetadata> {
    Json(ProtectedResourceMetadata {
        resource: state.settings.resource_url.clone(),
        authorization_servers: vec![state.settings.auth_server_url.clone()],
        scopes_supported: vec!["profile", "email"],
        bearer_methods_supported: vec!["header"],
    })
}

/// GET /.well-known/oauth-authorization-server
///
/// # Errors
/// - Upstream non-2xx status is passed through with an `upstream_error` body
/// - Network or decode failure becomes 502 `proxy_error`
pub async fn authorization_server(State(state): State<AppState>) -> Result<Json<Value>, ApiError> {
    let url = format!(
        "{}{}",
        state.settings.auth_server_url.trim_end_matches('/'),
        AUTHORIZATION_SERVER_METADATA_PATH
    );

    let response = state.http.get(&url).send().await.map_err(|e| {
        tracing::warn!(url = %url, error = %e, "Authorization server metadata request failed");
        ApiError::Proxy("Failed to fetch authorization server metadata".to_string())
    })?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(url = %url, status = status.as_u16(), "Authorization server returned an error");
        return Err(ApiError::Upstream {
            status: StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::BAD_GATEWAY),
            message: "Failed to fetch authorization server metadata".to_string(),
        });
    }

    let metadata = response.json::<Value>().await.map_err(|e| {
        tracing::warn!(url = %url, error = %e, "Authorization server metadata was not JSON");
        ApiError::Proxy("Invalid authorization server metadata".to_string())
    })?;

    Ok(Json(metadata))
}
