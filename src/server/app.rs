//! Application server
//!
//! This module provides the main application server implementation
//! including initialization, transport selection and graceful shutdown
//! handling.

use crate::{
    config::{Settings, TransportMode},
    mcp::{run_stdio_server, StdioSession},
    server::{routes, state::AppState},
    services::Credential,
};
use anyhow::{anyhow, Context, Result};
use std::io::ErrorKind;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;

/// Consecutive ports tried when the configured one is taken
pub const MAX_PORT_ATTEMPTS: u16 = 10;

/// Main application struct
pub struct App {
    state: AppState,
}

impl App {
    /// Create a new application instance
    ///
    /// This initializes all services and prepares the application for running.
    pub fn new(settings: Settings) -> Result<Self> {
        tracing::debug!("Initializing application state");
        let state = AppState::new(settings)?;

        Ok(Self { state })
    }

    /// Run on the configured transport until shutdown
    pub async fn run(self) -> Result<()> {
        match self.state.settings.transport {
            TransportMode::Stdio => self.run_stdio().await,
            TransportMode::Http => self.run_http().await,
        }
    }

    /// Serve MCP over stdin/stdout
    ///
    /// Ends when stdin closes or a shutdown signal arrives.
    pub async fn run_stdio(self) -> Result<()> {
        let api_key = self
            .state
            .settings
            .stdio_api_key()
            .and_then(Credential::parse);
        let session = StdioSession::new(api_key);

        tokio::select! {
            result = run_stdio_server(self.state.mcp.clone(), session) => result,
            _ = shutdown_signal() => Ok(()),
        }
    }

    /// Serve MCP over HTTP with graceful shutdown support
    ///
    /// The server will shut down gracefully when receiving SIGINT (Ctrl+C)
    /// or SIGTERM signals.
    pub async fn run_http(self) -> Result<()> {
        let settings = &self.state.settings;
        let listener = bind_with_fallback(&settings.host, settings.port, MAX_PORT_ATTEMPTS).await?;
        let addr = listener.local_addr()?;

        if addr.port() != settings.port {
            tracing::warn!(requested = settings.port, actual = addr.port(), "Configured port was in use");
        }
        tracing::info!(
            "Starting MCP server on http://{} with graceful shutdown enabled (endpoints: /mcp, /mcp/oauth, /ping, /health)",
            addr
        );

        let router = routes::create_router(self.state.clone());
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown_signal())
        .await?;

        Ok(())
    }

    /// Get a reference to the application state
    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Get a reference to the settings
    pub fn settings(&self) -> &Settings {
        &self.state.settings
    }
}

/// Bind `host:port`, moving to the next port while the address is in use
///
/// Any other bind error is returned immediately.
pub async fn bind_with_fallback(host: &str, first_port: u16, max_attempts: u16) -> Result<TcpListener> {
    let mut port = first_port;
    let mut attempt = 1;

    loop {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => return Ok(listener),
            Err(e) if e.kind() == ErrorKind::AddrInUse && attempt < max_attempts => {
                tracing::warn!(port, "Port in use, trying next port");
                attempt += 1;
                port = port
                    .checked_add(1)
                    .ok_or_else(|| anyhow!("No free port found after {}", first_port))?;
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to bind {}:{}", host, port));
            }
        }
    }
}

/// Create a future that completes when a shutdown signal is received
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_bind_skips_port_in_use() {
        let taken = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let taken_port = taken.local_addr().unwrap().port();

        let listener = bind_with_fallback("127.0.0.1", taken_port, MAX_PORT_ATTEMPTS)
            .await
            .unwrap();
        let port = listener.local_addr().unwrap().port();

        assert_ne!(port, taken_port);
        assert!(port > taken_port);
        assert!(u32::from(port) <= u32::from(taken_port) + u32::from(MAX_PORT_ATTEMPTS));
    }

    #[tokio::test]
    async fn test_bind_gives_up_after_single_attempt() {
        let taken = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let taken_port = taken.local_addr().unwrap().port();

        let result = bind_with_fallback("127.0.0.1", taken_port, 1).await;
        assert!(result.is_err());
    }
}
