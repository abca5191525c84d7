//! Documentation backend client
//!
//! Every logical call is dispatched through [`DocsApiService::dispatch`],
//! which retries over the credential pool when the backend rate-limits a
//! key. At most `max(pool size, 1)` attempts are made. Any other failure
//! ends the call at once, and every outcome is folded into the operation's
//! result type so callers never see a fault.

use crate::schemas::docs::{BackendErrorBody, ContextResponse, SearchResponse};
use crate::services::credential_pool::{Credential, CredentialPool, PoolStats};
use crate::services::request_context::{RequestContext, RequestHeaders};
use crate::utils::{truncate_str, LOG_PREVIEW_CHARS};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// Constants
// ============================================================================

pub const DEFAULT_BASE_URL: &str = "https://context7.com/api";

const SEARCH_PATH: &str = "/v2/libs/search";
const CONTEXT_PATH: &str = "/v2/context";

pub const ALL_KEYS_RATE_LIMITED: &str = "All API keys are rate-limited. Please try again later.";

pub const DOCUMENTATION_NOT_FOUND: &str = "Documentation not found or not finalized for this library. \
This might have happened because you used an invalid m0x-context-compatible library ID. \
To get a valid m0x-context-compatible library ID, use the 'resolve-library-id' with the package name you wish to retrieve documentation for.";

const RATE_LIMITED_WITH_KEY: &str = "Rate limited or quota exceeded. \
Upgrade your plan at https://context7.com/plans for higher limits.";
const RATE_LIMITED_WITHOUT_KEY: &str = "Rate limited or quota exceeded. \
Create a free API key at https://context7.com/dashboard for higher limits.";
const LIBRARY_NOT_FOUND: &str = "The library you are trying to access does not exist. \
Please try with a different library ID.";
const INVALID_API_KEY: &str = "Invalid API key. Please check your API key. \
API keys should start with 'ctx7sk' prefix.";

// ============================================================================
// Error Types
// ============================================================================

/// Errors raised while setting up the backend client
#[derive(Error, Debug)]
pub enum DocsApiError {
    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),

    #[error("Invalid backend base URL: {0}")]
    InvalidBaseUrl(String),
}

// ============================================================================
// Configuration
// ============================================================================

/// Configuration for the documentation backend client
#[derive(Debug, Clone)]
pub struct DocsApiConfig {
    /// Base URL, without trailing slash
    pub base_url: String,

    /// Deadline for each outbound attempt
    pub timeout: Duration,

    /// Gateway version sent with every request
    pub server_version: String,
}

impl Default for DocsApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: Duration::from_secs(30),
            server_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

impl DocsApiConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_server_version(mut self, version: impl Into<String>) -> Self {
        self.server_version = version.into();
        self
    }
}

// ============================================================================
// Operations
// ============================================================================

/// A logical backend operation the dispatcher can run
#[async_trait]
pub trait DocsOperation: Send + Sync {
    type Output: Send;

    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Endpoint path relative to the base URL
    fn path(&self) -> &'static str;

    /// Query string parameters
    fn query(&self) -> Vec<(&'static str, String)>;

    /// Turn a 2xx response into the operation result
    async fn read_success(&self, response: Response) -> Result<Self::Output, reqwest::Error>;

    /// Wrap a diagnostic message in the operation result
    fn failure(&self, message: String) -> Self::Output;

    /// Diagnostic for a transport-level failure
    fn transport_failure(&self, error: &reqwest::Error) -> String;
}

/// Search libraries by name, ranked by relevance to a question
#[derive(Debug, Clone)]
pub struct SearchLibraries {
    pub query: String,
    pub library_name: String,
}

#[async_trait]
impl DocsOperation for SearchLibraries {
    type Output = SearchResponse;

    fn name(&self) -> &'static str {
        "search_libraries"
    }

    fn path(&self) -> &'static str {
        SEARCH_PATH
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("query", self.query.clone()),
            ("libraryName", self.library_name.clone()),
        ]
    }

    async fn read_success(&self, response: Response) -> Result<SearchResponse, reqwest::Error> {
        response.json::<SearchResponse>().await
    }

    fn failure(&self, message: String) -> SearchResponse {
        SearchResponse::failed(message)
    }

    fn transport_failure(&self, error: &reqwest::Error) -> String {
        format!("Error searching libraries: {}", error)
    }
}

/// Fetch documentation text for a library, focused on a question
#[derive(Debug, Clone)]
pub struct FetchContext {
    pub library_id: String,
    pub query: String,
}

#[async_trait]
impl DocsOperation for FetchContext {
    type Output = ContextResponse;

    fn name(&self) -> &'static str {
        "fetch_context"
    }

    fn path(&self) -> &'static str {
        CONTEXT_PATH
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("query", self.query.clone()),
            ("libraryId", self.library_id.clone()),
        ]
    }

    async fn read_success(&self, response: Response) -> Result<ContextResponse, reqwest::Error> {
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(ContextResponse::new(DOCUMENTATION_NOT_FOUND));
        }
        Ok(ContextResponse::new(text))
    }

    fn failure(&self, message: String) -> ContextResponse {
        ContextResponse::new(message)
    }

    fn transport_failure(&self, error: &reqwest::Error) -> String {
        format!(
            "Error fetching library context. Please try again later. {}",
            error
        )
    }
}

// ============================================================================
// Dispatch Records
// ============================================================================

/// How one outbound attempt ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptClass {
    Success,
    RateLimited,
    UpstreamError,
    NetworkError,
}

/// One outbound attempt within a logical call
#[derive(Debug, Clone)]
pub struct DispatchAttempt {
    pub index: usize,
    pub credential: Option<Credential>,
    pub class: AttemptClass,
    pub status: Option<u16>,
}

/// Terminal result of a logical call with the attempts that produced it
#[derive(Debug)]
pub struct DispatchOutcome<T> {
    pub value: T,
    pub attempts: Vec<DispatchAttempt>,
}

// ============================================================================
// Docs API Service
// ============================================================================

/// Client for the documentation backend with credential rotation
#[derive(Clone)]
pub struct DocsApiService {
    client: Client,
    base_url: String,
    pool: Arc<CredentialPool>,
    headers: RequestHeaders,
}

impl DocsApiService {
    pub fn new(
        config: DocsApiConfig,
        pool: Arc<CredentialPool>,
        headers: RequestHeaders,
    ) -> Result<Self, DocsApiError> {
        let base_url = config.base_url.trim_end_matches('/').to_string();
        reqwest::Url::parse(&base_url)
            .map_err(|e| DocsApiError::InvalidBaseUrl(format!("{}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(format!("docs-mcp-gateway/{}", config.server_version))
            .build()?;

        tracing::info!(
            base_url = %base_url,
            key_count = pool.total_count(),
            timeout_secs = config.timeout.as_secs(),
            "Initialized documentation backend client"
        );

        Ok(Self {
            client,
            base_url,
            pool,
            headers,
        })
    }

    pub fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }

    /// Search for libraries matching `library_name`
    pub async fn search_libraries(
        &self,
        query: &str,
        library_name: &str,
        context: &RequestContext,
    ) -> SearchResponse {
        let operation = SearchLibraries {
            query: query.to_string(),
            library_name: library_name.to_string(),
        };
        self.dispatch(&operation, context).await.value
    }

    /// Fetch documentation for `library_id`
    pub async fn fetch_context(
        &self,
        library_id: &str,
        query: &str,
        context: &RequestContext,
    ) -> ContextResponse {
        let operation = FetchContext {
            library_id: library_id.to_string(),
            query: query.to_string(),
        };
        self.dispatch(&operation, context).await.value
    }

    /// Run an operation, rotating credentials on rate limits
    pub async fn dispatch<O: DocsOperation>(
        &self,
        operation: &O,
        context: &RequestContext,
    ) -> DispatchOutcome<O::Output> {
        let max_attempts = self.pool.total_count().max(1);
        let url = format!("{}{}", self.base_url, operation.path());
        let query = operation.query();
        let mut attempts = Vec::with_capacity(max_attempts);

        for index in 0..max_attempts {
            let from_pool = self.pool.has_any();
            let credential = if from_pool {
                self.pool.next()
            } else {
                context.api_key.clone()
            };

            tracing::debug!(
                operation = operation.name(),
                attempt = index + 1,
                max_attempts,
                credential = ?credential,
                "Calling documentation backend"
            );

            let sent = self
                .client
                .get(&url)
                .query(&query)
                .headers(self.header_map(context, credential.as_ref()))
                .send()
                .await;

            let response = match sent {
                Ok(response) => response,
                Err(e) => {
                    tracing::error!(
                        operation = operation.name(),
                        attempt = index + 1,
                        error = %e,
                        "Documentation backend request failed"
                    );
                    let message = operation.transport_failure(&e);
                    attempts.push(attempt(index, credential, AttemptClass::NetworkError, None));
                    return DispatchOutcome {
                        value: operation.failure(message),
                        attempts,
                    };
                }
            };

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS && from_pool {
                if let Some(key) = &credential {
                    self.pool.mark_failed(key);
                    tracing::warn!(
                        operation = operation.name(),
                        credential = %key,
                        "Rate limited, trying next API key (attempt {}/{})...",
                        index + 1,
                        max_attempts
                    );
                    attempts.push(attempt(
                        index,
                        credential,
                        AttemptClass::RateLimited,
                        Some(status.as_u16()),
                    ));
                    continue;
                }
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                let message = error_message(status, &body, credential.is_some());
                tracing::warn!(
                    operation = operation.name(),
                    status = status.as_u16(),
                    message = %message,
                    body = truncate_str(&body, LOG_PREVIEW_CHARS),
                    "Documentation backend returned an error"
                );
                attempts.push(attempt(
                    index,
                    credential,
                    AttemptClass::UpstreamError,
                    Some(status.as_u16()),
                ));
                return DispatchOutcome {
                    value: operation.failure(message),
                    attempts,
                };
            }

            let value = match operation.read_success(response).await {
                Ok(value) => {
                    attempts.push(attempt(
                        index,
                        credential,
                        AttemptClass::Success,
                        Some(status.as_u16()),
                    ));
                    value
                }
                Err(e) => {
                    tracing::error!(
                        operation = operation.name(),
                        error = %e,
                        "Failed to read documentation backend response"
                    );
                    let message = operation.transport_failure(&e);
                    attempts.push(attempt(
                        index,
                        credential,
                        AttemptClass::NetworkError,
                        Some(status.as_u16()),
                    ));
                    operation.failure(message)
                }
            };
            return DispatchOutcome { value, attempts };
        }

        tracing::error!(
            operation = operation.name(),
            max_attempts,
            "All API keys are rate-limited"
        );
        DispatchOutcome {
            value: operation.failure(ALL_KEYS_RATE_LIMITED.to_string()),
            attempts,
        }
    }

    fn header_map(&self, context: &RequestContext, credential: Option<&Credential>) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in self.headers.build(context, credential) {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(&value),
            ) {
                (Ok(name), Ok(value)) => {
                    map.insert(name, value);
                }
                _ => tracing::warn!(header = name, "Dropping header with invalid value"),
            }
        }
        map
    }
}

fn attempt(
    index: usize,
    credential: Option<Credential>,
    class: AttemptClass,
    status: Option<u16>,
) -> DispatchAttempt {
    DispatchAttempt {
        index,
        credential,
        class,
        status,
    }
}

/// Diagnostic for a non-2xx backend response
///
/// The backend's own `message` wins; otherwise a canned text is chosen by
/// status code.
pub fn error_message(status: StatusCode, body: &str, had_credential: bool) -> String {
    if let Ok(parsed) = serde_json::from_str::<BackendErrorBody>(body) {
        if let Some(message) = parsed.message.filter(|m| !m.is_empty()) {
            return message;
        }
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS if had_credential => RATE_LIMITED_WITH_KEY.to_string(),
        StatusCode::TOO_MANY_REQUESTS => RATE_LIMITED_WITHOUT_KEY.to_string(),
        StatusCode::NOT_FOUND => LIBRARY_NOT_FOUND.to_string(),
        StatusCode::UNAUTHORIZED => INVALID_API_KEY.to_string(),
        other => format!(
            "Request failed with status {}. Please try again later.",
            other.as_u16()
        ),
    }
}

// ============================================================================
// Tests
// ============================================================================
