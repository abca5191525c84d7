//! Documentation MCP Gateway
//!
//! An MCP server that answers library lookups and documentation queries
//! from a hosted documentation backend, over stdio or streamable HTTP.

use anyhow::Result;
use clap::Parser;
use docs_mcp_gateway::{
    config::{Environment, Settings, TransportMode},
    logging,
    server::App,
};
use std::path::PathBuf;

/// Documentation MCP Gateway
///
/// Serves library search and documentation context tools to MCP clients.
#[derive(Parser, Debug)]
#[command(name = "docs-mcp-gateway")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Transport: stdio or http
    #[arg(long, value_enum, default_value_t = TransportMode::Stdio)]
    transport: TransportMode,

    /// Port to listen on, http transport only (overrides PORT env var)
    #[arg(short, long)]
    port: Option<u16>,

    /// Host to bind to (overrides HOST env var)
    #[arg(long)]
    host: Option<String>,

    /// Backend API key, stdio transport only (overrides CONTEXT7_API_KEYS)
    #[arg(long)]
    api_key: Option<String>,

    /// Log level: trace, debug, info, warn, error (overrides LOG_LEVEL env var)
    #[arg(long)]
    log_level: Option<String>,

    /// Environment: dev, staging, prod (overrides ENVIRONMENT env var)
    #[arg(short, long)]
    env: Option<Environment>,

    /// Log file path for JSON logs (enables file logging with 10MB rotation)
    /// Example: --log-file /var/log/docs-mcp/app.log
    #[arg(long)]
    log_file: Option<PathBuf>,
}

impl Args {
    /// Reject flags that make no sense for the chosen transport
    fn check_transport_flags(&self) -> Result<()> {
        match self.transport {
            TransportMode::Http if self.api_key.is_some() => anyhow::bail!(
                "The --api-key flag is not allowed with --transport http. \
                 Pass the key in request headers instead."
            ),
            TransportMode::Stdio if self.port.is_some() => {
                anyhow::bail!("The --port flag is only allowed with --transport http.")
            }
            _ => Ok(()),
        }
    }

    /// Apply CLI overrides on top of environment settings
    fn apply(self, settings: &mut Settings) {
        settings.transport = self.transport;
        if let Some(port) = self.port {
            settings.port = port;
        }
        if let Some(host) = self.host {
            settings.host = host;
        }
        if let Some(api_key) = self.api_key.filter(|k| !k.trim().is_empty()) {
            settings.cli_api_key = Some(api_key);
        }
        if let Some(log_level) = self.log_level {
            settings.log_level = log_level;
        }
        if let Some(env) = self.env {
            settings.environment = env;
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();
    args.check_transport_flags()?;
    let log_file = args.log_file.clone();

    // Load configuration first (before logging, so we can use log_level)
    let mut settings = Settings::load()?;
    args.apply(&mut settings);
    settings.validate()?;

    // Initialize tracing subscriber with JSON output on stderr
    logging::init(&settings.log_level, log_file.as_deref())?;

    print_banner(&settings);

    tracing::info!(
        app_name = %settings.app_name,
        version = %settings.app_version,
        environment = %settings.environment,
        transport = %settings.transport,
        "Starting application"
    );

    // Build the application
    let app = App::new(settings)?;

    // Run until stdin closes or a shutdown signal arrives
    app.run().await?;

    tracing::info!("Application shutdown complete");

    Ok(())
}

/// Startup banner on stderr; stdout belongs to the stdio transport
fn print_banner(settings: &Settings) {
    eprintln!("{}", "=".repeat(60));
    eprintln!("  {} v{}", settings.app_name, settings.app_version);
    match settings.transport {
        TransportMode::Stdio => eprintln!("  Transport: stdio"),
        TransportMode::Http => {
            eprintln!("  Transport: http");
            eprintln!("  Endpoint:  http://{}/mcp", settings.server_addr());
        }
    }
    eprintln!("{}", "=".repeat(60));
}
