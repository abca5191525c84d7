//! MCP stdio transport
//!
//! Newline-delimited JSON-RPC over stdin/stdout. Logs must never go to
//! stdout while this transport is running.

use super::handler::{client_info_from_initialize, McpHandler};
use crate::schemas::jsonrpc::{JsonRpcError, JsonRpcResponse};
use crate::services::credential_pool::Credential;
use crate::services::request_context::{ClientInfo, RequestContext, TransportKind};
use crate::utils::{truncate_with_suffix, LOG_PREVIEW_CHARS};
use serde_json::Value;
use std::sync::RwLock;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};

// ============================================================================
// Stdio Session
// ============================================================================

/// Process-wide caller identity for the stdio transport
///
/// The caller credential comes from startup configuration; the client
/// identity is captured from the `initialize` handshake.
#[derive(Debug, Default)]
pub struct StdioSession {
    api_key: Option<Credential>,
    client_info: RwLock<Option<ClientInfo>>,
}

impl StdioSession {
    pub fn new(api_key: Option<Credential>) -> Self {
        Self {
            api_key,
            client_info: RwLock::new(None),
        }
    }

    pub fn set_client_info(&self, info: ClientInfo) {
        if let Ok(mut guard) = self.client_info.write() {
            *guard = Some(info);
        }
    }

    pub fn client_info(&self) -> Option<ClientInfo> {
        self.client_info.read().ok().and_then(|guard| guard.clone())
    }

    /// Context for the next call on this session
    pub fn context(&self) -> RequestContext {
        RequestContext::new(TransportKind::Stdio)
            .with_api_key(self.api_key.clone())
            .with_client_info(self.client_info())
    }

    fn observe(&self, message: &Value) {
        if message.get("method").and_then(Value::as_str) == Some("initialize") {
            if let Some(info) = message.get("params").and_then(client_info_from_initialize) {
                self.set_client_info(info);
            }
        }
    }
}

// ============================================================================
// Server Loop
// ============================================================================

/// Serve MCP on the process's stdin and stdout until stdin closes
pub async fn run_stdio_server(handler: McpHandler, session: StdioSession) -> anyhow::Result<()> {
    tracing::info!("MCP stdio server started");
    serve(
        &handler,
        &session,
        BufReader::new(tokio::io::stdin()),
        tokio::io::stdout(),
    )
    .await?;
    tracing::info!("MCP stdio server stopped (stdin closed)");
    Ok(())
}

/// Serve MCP over any line-oriented reader and writer
pub async fn serve<R, W>(
    handler: &McpHandler,
    session: &StdioSession,
    reader: R,
    writer: W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut writer = BufWriter::new(writer);
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let message: Value = match serde_json::from_str(line) {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    line = %truncate_with_suffix(line, LOG_PREVIEW_CHARS, "..."),
                    "Failed to parse JSON-RPC message"
                );
                let response = JsonRpcResponse::failure(Value::Null, JsonRpcError::parse_error(e));
                write_line(&mut writer, &response).await?;
                continue;
            }
        };

        match message {
            Value::Array(batch) => {
                let mut responses = Vec::with_capacity(batch.len());
                for item in batch {
                    session.observe(&item);
                    if let Some(response) = handler.handle_value(item, &session.context()).await {
                        responses.push(response);
                    }
                }
                if !responses.is_empty() {
                    write_line(&mut writer, &responses).await?;
                }
            }
            message => {
                session.observe(&message);
                if let Some(response) = handler.handle_value(message, &session.context()).await {
                    write_line(&mut writer, &response).await?;
                }
            }
        }
    }

    Ok(())
}

async fn write_line<W, T>(writer: &mut BufWriter<W>, payload: &T) -> anyhow::Result<()>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let json = serde_json::to_string(payload)?;
    writer.write_all(json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schemas::jsonrpc::PARSE_ERROR;
    use crate::services::client_ip::ClientIpCipher;
    use crate::services::credential_pool::CredentialPool;
    use crate::services::docs_api::{DocsApiConfig, DocsApiService};
    use crate::services::request_context::RequestHeaders;
    use mockito::Matcher;
    use std::sync::Arc;

    fn handler(base_url: &str) -> McpHandler {
        let docs = DocsApiService::new(
            DocsApiConfig::default().with_base_url(base_url),
            Arc::new(CredentialPool::empty()),
            RequestHeaders::new(ClientIpCipher::default(), "0.1.0"),
        )
        .unwrap();
        McpHandler::new(Arc::new(docs), "docs-mcp-gateway", "0.1.0")
    }

    async fn run(handler: &McpHandler, session: &StdioSession, input: &str) -> Vec<Value> {
        let mut output = Vec::new();
        serve(handler, session, input.as_bytes(), &mut output)
            .await
            .unwrap();
        String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_one_response_per_request_line() {
        let handler = handler("http://127.0.0.1:9");
        let session = StdioSession::default();
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-06-18","clientInfo":{"name":"cursor","version":"1.7.0"}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/list"}"#,
            "\n",
        );

        let responses = run(&handler, &session, input).await;

        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], 1);
        assert_eq!(responses[1]["id"], 2);
        assert_eq!(
            session.client_info(),
            Some(ClientInfo::new("cursor", "1.7.0"))
        );
    }

    #[tokio::test]
    async fn test_invalid_json_yields_parse_error() {
        let handler = handler("http://127.0.0.1:9");
        let responses = run(&handler, &StdioSession::default(), "{not json\n").await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0]["error"]["code"], PARSE_ERROR);
        assert_eq!(responses[0]["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_batch_request() {
        let handler = handler("http://127.0.0.1:9");
        let input = concat!(
            r#"[{"jsonrpc":"2.0","id":1,"method":"ping"},{"jsonrpc":"2.0","method":"notifications/initialized"},{"jsonrpc":"2.0","id":2,"method":"ping"}]"#,
            "\n"
        );
        let responses = run(&handler, &StdioSession::default(), input).await;
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_session_identity_reaches_backend() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/context")
            .match_query(Matcher::Any)
            .match_header("authorization", "Bearer ctx7sk-local")
            .match_header("x-m0x-transport", "stdio")
            .match_header("x-m0x-client-ide", "cursor")
            .match_header("x-m0x-client-version", "1.7.0")
            .with_status(200)
            .with_body("docs")
            .expect(1)
            .create_async()
            .await;

        let handler = handler(&server.url());
        let session = StdioSession::new(Some(Credential::new("ctx7sk-local")));
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2025-06-18","clientInfo":{"name":"cursor","version":"1.7.0"}}}"#,
            "\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"query-docs","arguments":{"libraryId":"/a/b","query":"q"}}}"#,
            "\n",
        );

        let responses = run(&handler, &session, input).await;
        assert_eq!(responses[1]["result"]["content"][0]["text"], "docs");
        mock.assert_async().await;
    }
}
