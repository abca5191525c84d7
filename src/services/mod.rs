//! Service layer
//!
//! The documentation backend client and the pieces it is built from:
//! credential rotation, client address obfuscation and per-call request
//! context.

pub mod client_ip;
pub mod credential_pool;
pub mod docs_api;
pub mod request_context;

pub use client_ip::ClientIpCipher;
pub use credential_pool::{Credential, CredentialPool, PoolConfig, PoolStats};
pub use docs_api::{DocsApiConfig, DocsApiError, DocsApiService};
pub use request_context::{ClientInfo, RequestContext, RequestHeaders, TransportKind};
