//! Application settings and configuration
//!
//! This module provides configuration management for the application,
//! loading settings from environment variables with sensible defaults.

use crate::services::client_ip::DEFAULT_ENCRYPTION_KEY;
use crate::services::docs_api::DEFAULT_BASE_URL;
use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::time::Duration;

/// Application environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    #[value(alias = "dev")]
    Development,
    #[value(alias = "stage")]
    Staging,
    #[value(alias = "prod")]
    Production,
}

impl fmt::Display for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Staging => write!(f, "staging"),
            Environment::Production => write!(f, "production"),
        }
    }
}

impl std::str::FromStr for Environment {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" | "stage" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => anyhow::bail!("Invalid environment: {}. Expected: development, staging, or production", s),
        }
    }
}

/// Transport the MCP server listens on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, ValueEnum, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Stdio,
    Http,
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportMode::Stdio => write!(f, "stdio"),
            TransportMode::Http => write!(f, "http"),
        }
    }
}

/// Main application settings
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    // App settings
    pub app_name: String,
    pub app_version: String,
    pub environment: Environment,
    pub log_level: String,

    // Server settings
    pub transport: TransportMode,
    pub host: String,
    pub port: u16,

    // Backend credentials
    /// Comma-separated rotation keys (CONTEXT7_API_KEYS)
    #[serde(skip_serializing)]
    pub api_keys: Option<String>,
    /// Single key (CONTEXT7_API_KEY)
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    /// Key passed with --api-key, takes precedence over both env vars
    #[serde(skip_serializing)]
    pub cli_api_key: Option<String>,

    // Backend
    pub docs_api_base_url: String,
    pub request_timeout_seconds: u64,
    pub key_cooldown_seconds: u64,

    // Client address obfuscation
    #[serde(skip_serializing)]
    pub client_ip_encryption_key: String,

    // OAuth metadata
    pub resource_url: String,
    pub auth_server_url: String,
}

impl Settings {
    /// Load settings from environment variables with defaults
    pub fn load() -> Result<Self> {
        // Load .env file if it exists (ignored in production typically)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build settings from an arbitrary variable lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let settings = Self {
            // App settings
            app_name: var("APP_NAME", "docs-mcp-gateway"),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: var("ENVIRONMENT", "development")
                .parse()
                .unwrap_or_default(),
            log_level: var("LOG_LEVEL", "info"),

            // Server settings
            transport: TransportMode::Stdio,
            host: var("HOST", "0.0.0.0"),
            port: var("PORT", "3000").parse().context("Invalid PORT value")?,

            // Backend credentials
            api_keys: non_empty("CONTEXT7_API_KEYS"),
            api_key: non_empty("CONTEXT7_API_KEY"),
            cli_api_key: None,

            // Backend
            docs_api_base_url: var("CONTEXT7_API_BASE_URL", DEFAULT_BASE_URL),
            request_timeout_seconds: var("REQUEST_TIMEOUT_SECONDS", "30")
                .parse()
                .context("Invalid REQUEST_TIMEOUT_SECONDS value")?,
            key_cooldown_seconds: var("KEY_COOLDOWN_SECONDS", "3600")
                .parse()
                .context("Invalid KEY_COOLDOWN_SECONDS value")?,

            // Client address obfuscation
            client_ip_encryption_key: var("CLIENT_IP_ENCRYPTION_KEY", DEFAULT_ENCRYPTION_KEY),

            // OAuth metadata
            resource_url: var("RESOURCE_URL", "https://mcp.context7.com/mcp/oauth"),
            auth_server_url: var("AUTH_SERVER_URL", "https://context7.com"),
        };

        settings.validate()?;

        Ok(settings)
    }

    /// Validate settings
    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            anyhow::bail!("Port cannot be 0");
        }

        if self.request_timeout_seconds == 0 {
            anyhow::bail!("REQUEST_TIMEOUT_SECONDS must be > 0");
        }

        reqwest::Url::parse(&self.docs_api_base_url)
            .with_context(|| format!("Invalid CONTEXT7_API_BASE_URL: {}", self.docs_api_base_url))?;
        reqwest::Url::parse(&self.resource_url)
            .with_context(|| format!("Invalid RESOURCE_URL: {}", self.resource_url))?;

        Ok(())
    }

    /// Source string for the credential rotation pool
    ///
    /// `--api-key` wins over `CONTEXT7_API_KEYS`, which wins over
    /// `CONTEXT7_API_KEY`.
    pub fn rotation_source(&self) -> Option<&str> {
        self.cli_api_key
            .as_deref()
            .or(self.api_keys.as_deref())
            .or(self.api_key.as_deref())
    }

    /// Caller credential for the stdio session
    pub fn stdio_api_key(&self) -> Option<&str> {
        self.cli_api_key.as_deref().or(self.api_key.as_deref())
    }

    /// Per-attempt deadline for backend requests
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_seconds)
    }

    /// How long rate-limited keys stay out of rotation
    pub fn key_cooldown(&self) -> Duration {
        Duration::from_secs(self.key_cooldown_seconds)
    }

    /// URL of the protected resource metadata document, advertised in
    /// `WWW-Authenticate` challenges
    pub fn resource_metadata_url(&self) -> String {
        let origin = reqwest::Url::parse(&self.resource_url)
            .map(|url| url.origin().ascii_serialization())
            .unwrap_or_else(|_| self.resource_url.trim_end_matches('/').to_string());
        format!("{}/.well-known/oauth-protected-resource", origin)
    }

    /// Check if running in production mode
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }

    /// Get the server address string
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "docs-mcp-gateway".to_string(),
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            environment: Environment::Development,
            log_level: "info".to_string(),
            transport: TransportMode::Stdio,
            host: "0.0.0.0".to_string(),
            port: 3000,
            api_keys: None,
            api_key: None,
            cli_api_key: None,
            docs_api_base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout_seconds: 30,
            key_cooldown_seconds: 3600,
            client_ip_encryption_key: DEFAULT_ENCRYPTION_KEY.to_string(),
            resource_url: "https://mcp.context7.com/mcp/oauth".to_string(),
            auth_server_url: "https://context7.com".to_string(),
        }
    }
}
