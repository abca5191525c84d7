//! Per-call request context
//!
//! A `RequestContext` carries the caller identity for one logical call:
//! client address, caller credential, client software identity and the
//! transport the call arrived on. It is built by the transport adapter and
//! passed explicitly down to the dispatcher, which turns it into outbound
//! headers with [`RequestHeaders::build`].

use super::client_ip::ClientIpCipher;
use super::credential_pool::Credential;
use std::collections::BTreeMap;
use std::fmt;

// Outbound header names
pub const HEADER_SOURCE: &str = "X-M0X-Source";
pub const HEADER_SERVER_VERSION: &str = "X-M0X-Server-Version";
pub const HEADER_CLIENT_IP: &str = "mcp-client-ip";
pub const HEADER_AUTHORIZATION: &str = "Authorization";
pub const HEADER_CLIENT_IDE: &str = "X-M0X-Client-IDE";
pub const HEADER_CLIENT_VERSION: &str = "X-M0X-Client-Version";
pub const HEADER_TRANSPORT: &str = "X-M0X-Transport";

const SOURCE_VALUE: &str = "mcp-server";

// ============================================================================
// Context Types
// ============================================================================

/// Transport a call arrived on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    Stdio,
    Http,
}

impl TransportKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportKind::Stdio => "stdio",
            TransportKind::Http => "http",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Name and version of the client software making the call
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClientInfo {
    pub ide: Option<String>,
    pub version: Option<String>,
}

impl ClientInfo {
    pub fn new(ide: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            ide: Some(ide.into()),
            version: Some(version.into()),
        }
    }

    /// Parse a leading `name/version` token from a user-agent string
    ///
    /// `"Cursor/1.2.3 (darwin)"` yields `Cursor` and `1.2.3`. Anything that
    /// does not start with such a token yields `None`.
    pub fn from_user_agent(user_agent: &str) -> Option<Self> {
        let (name, rest) = user_agent.split_once('/')?;
        if name.is_empty() || name.chars().any(char::is_whitespace) {
            return None;
        }

        let version: String = rest
            .chars()
            .take_while(|c| !c.is_whitespace() && *c != '(')
            .collect();
        if version.is_empty() {
            return None;
        }

        Some(Self::new(name, version))
    }
}

/// Caller identity for one logical call
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub client_ip: Option<String>,
    pub api_key: Option<Credential>,
    pub client_info: Option<ClientInfo>,
    pub transport: Option<TransportKind>,
}

impl RequestContext {
    pub fn new(transport: TransportKind) -> Self {
        Self {
            transport: Some(transport),
            ..Default::default()
        }
    }

    pub fn with_client_ip(mut self, client_ip: impl Into<String>) -> Self {
        self.client_ip = Some(client_ip.into());
        self
    }

    pub fn with_api_key(mut self, api_key: Option<Credential>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_client_info(mut self, client_info: Option<ClientInfo>) -> Self {
        self.client_info = client_info;
        self
    }
}

// ============================================================================
// Header Builder
// ============================================================================

/// Builds the outbound backend headers for a request context
#[derive(Debug, Clone)]
pub struct RequestHeaders {
    cipher: ClientIpCipher,
    server_version: String,
}

impl RequestHeaders {
    pub fn new(cipher: ClientIpCipher, server_version: impl Into<String>) -> Self {
        Self {
            cipher,
            server_version: server_version.into(),
        }
    }

    /// Header name/value pairs for one outbound attempt
    ///
    /// `credential` is the key chosen for this attempt, which may differ from
    /// the caller's own key when the rotation pool is in use. Optional
    /// headers are only present when their value is known and non-empty.
    pub fn build(
        &self,
        context: &RequestContext,
        credential: Option<&Credential>,
    ) -> BTreeMap<&'static str, String> {
        let mut headers = BTreeMap::new();
        headers.insert(HEADER_SOURCE, SOURCE_VALUE.to_string());
        headers.insert(HEADER_SERVER_VERSION, self.server_version.clone());

        if let Some(ip) = non_empty(context.client_ip.as_deref()) {
            headers.insert(HEADER_CLIENT_IP, self.cipher.encode(ip));
        }

        if let Some(key) = credential.filter(|k| !k.expose().is_empty()) {
            headers.insert(HEADER_AUTHORIZATION, format!("Bearer {}", key.expose()));
        }

        if let Some(info) = &context.client_info {
            if let Some(ide) = non_empty(info.ide.as_deref()) {
                headers.insert(HEADER_CLIENT_IDE, ide.to_string());
            }
            if let Some(version) = non_empty(info.version.as_deref()) {
                headers.insert(HEADER_CLIENT_VERSION, version.to_string());
            }
        }

        if let Some(transport) = context.transport {
            headers.insert(HEADER_TRANSPORT, transport.as_str().to_string());
        }

        headers
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

// ============================================================================
// Tests
// ============================================================================
