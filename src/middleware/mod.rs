//! Middleware module
//!
//! Contains HTTP middleware for authentication, client address resolution
//! and request logging.

pub mod auth;
pub mod client_ip;
pub mod logging;

// Re-export commonly used items
pub use auth::{attach_challenge, extract_api_key, require_credential, AuthError, AuthState};
pub use client_ip::extract_client_ip;
pub use logging::{log_request, TraceId, REQUEST_ID_HEADER, TRACE_ID_HEADER};
