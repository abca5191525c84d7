//! API endpoint handlers module
//!
//! Contains all HTTP endpoint handler implementations.

pub mod health;
pub mod mcp;
pub mod oauth;

use crate::error::ApiError;

/// Fallback for any path the gateway does not serve
pub async fn not_found() -> ApiError {
    ApiError::endpoint_not_found()
}
