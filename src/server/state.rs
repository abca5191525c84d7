//! Application state container
//!
//! This module defines the shared application state that is passed
//! to all request handlers via Axum's state extraction. It is also the
//! composition root: the credential pool, address cipher and backend client
//! are created here once and shared by both transports.

use crate::config::Settings;
use crate::mcp::McpHandler;
use crate::middleware::AuthState;
use crate::services::{
    ClientIpCipher, CredentialPool, DocsApiConfig, DocsApiService, PoolConfig, RequestHeaders,
};
use anyhow::Context;
use std::sync::Arc;
use std::time::Instant;

/// Shared application state
///
/// Cheap to clone; every field is reference counted.
#[derive(Clone)]
pub struct AppState {
    /// Application settings
    pub settings: Arc<Settings>,

    /// Documentation backend client (owns the credential pool)
    pub docs: Arc<DocsApiService>,

    /// MCP request handler shared by both transports
    pub mcp: McpHandler,

    /// `WWW-Authenticate` challenge for MCP responses
    pub auth: AuthState,

    /// Plain client for the authorization server metadata proxy
    pub http: reqwest::Client,

    /// Application start time (for uptime calculation)
    pub start_time: Instant,
}

impl AppState {
    /// Create a new application state
    pub fn new(settings: Settings) -> anyhow::Result<Self> {
        let settings = Arc::new(settings);

        let pool = CredentialPool::from_source(settings.rotation_source().unwrap_or_default())
            .with_config(PoolConfig::default().with_cooldown(settings.key_cooldown()));

        let cipher = ClientIpCipher::new(&settings.client_ip_encryption_key);
        let headers = RequestHeaders::new(cipher, settings.app_version.clone());

        let docs_config = DocsApiConfig::default()
            .with_base_url(settings.docs_api_base_url.clone())
            .with_timeout(settings.request_timeout())
            .with_server_version(settings.app_version.clone());
        let docs = Arc::new(
            DocsApiService::new(docs_config, Arc::new(pool), headers)
                .context("Failed to initialize documentation backend client")?,
        );

        let mcp = McpHandler::new(
            Arc::clone(&docs),
            settings.app_name.clone(),
            settings.app_version.clone(),
        );

        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()
            .context("Failed to build HTTP client")?;

        let auth = AuthState::new(&settings.resource_metadata_url());

        tracing::info!(
            transport = %settings.transport,
            backend = %settings.docs_api_base_url,
            "Application state initialized successfully"
        );

        Ok(Self {
            settings,
            docs,
            mcp,
            auth,
            http,
            start_time: Instant::now(),
        })
    }

    /// Get the application uptime in seconds
    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }
}
