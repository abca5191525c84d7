//! Application routing
//!
//! This module defines all HTTP routes for the application.

use axum::{
    http::{header, HeaderName, Method},
    middleware,
    routing::{get, post, MethodRouter},
    Router,
};
use tower_http::cors::{Any, CorsLayer};

use crate::api::{self, health, mcp, oauth};
use crate::middleware::{attach_challenge, log_request, require_credential};
use crate::server::state::AppState;

/// Create the main application router
pub fn create_router(state: AppState) -> Router {
    // Anonymous MCP endpoint; a caller credential is forwarded when present
    let anonymous_mcp = Router::new().route("/mcp", mcp_route());

    // Authenticated MCP endpoint
    let authenticated_mcp = Router::new()
        .route("/mcp/oauth", mcp_route())
        .route_layer(middleware::from_fn(require_credential));

    // Layer order: last added = outermost = runs first
    // So the challenge header lands on 401s from require_credential too
    let mcp_routes = anonymous_mcp
        .merge(authenticated_mcp)
        .layer(middleware::from_fn_with_state(state.auth.clone(), attach_challenge));

    // Health check routes (no authentication required)
    let health_routes = Router::new()
        .route("/ping", get(health::ping))
        .route("/health", get(health::health_check));

    // OAuth discovery routes
    let oauth_routes = Router::new()
        .route(
            "/.well-known/oauth-protected-resource",
            get(oauth::protected_resource),
        )
        .route(
            "/.well-known/oauth-authorization-server",
            get(oauth::authorization_server),
        );

    Router::new()
        .merge(mcp_routes)
        .merge(health_routes)
        .merge(oauth_routes)
        .fallback(api::not_found)
        // Apply middleware layers (order matters: last added = outermost = runs first)
        .layer(create_cors_layer())
        // Custom request logging with trace IDs
        .layer(middleware::from_fn(log_request))
        .with_state(state)
}

fn mcp_route() -> MethodRouter<AppState> {
    post(mcp::handle_mcp)
        .get(mcp::method_not_allowed)
        .delete(mcp::method_not_allowed)
}

/// Create CORS layer for browser-based MCP clients
fn create_cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS, Method::DELETE])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("mcp-session-id"),
            HeaderName::from_static("mcp-protocol-version"),
            HeaderName::from_static("context7-api-key"),
            HeaderName::from_static("x-api-key"),
        ])
        .expose_headers([
            HeaderName::from_static("mcp-session-id"),
            header::WWW_AUTHENTICATE,
            // Expose trace ID headers to clients
            HeaderName::from_static("x-trace-id"),
            HeaderName::from_static("x-request-id"),
        ])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::schemas::jsonrpc::{AUTHENTICATION_REQUIRED, METHOD_NOT_ALLOWED, PARSE_ERROR};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use mockito::Matcher;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn router_with(settings: Settings) -> Router {
        create_router(AppState::new(settings).unwrap())
    }

    fn router() -> Router {
        router_with(Settings {
            docs_api_base_url: "http://127.0.0.1:9".to_string(),
            ..Settings::default()
        })
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_ping() {
        let response = router().oneshot(get_request("/ping")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({"status": "ok", "message": "pong"}));
    }

    #[tokio::test]
    async fn test_health_reports_pool() {
        let settings = Settings {
            api_keys: Some("k1,k2,k3".to_string()),
            ..Settings::default()
        };
        let response = router_with(settings).oneshot(get_request("/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["credentials"], json!({"total": 3, "failed": 0, "available": 3}));
    }

    #[tokio::test]
    async fn test_oauth_endpoint_requires_credential() {
        let request = post_json("/mcp/oauth", json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}));
        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let challenge = response.headers().get(header::WWW_AUTHENTICATE).unwrap();
        assert_eq!(
            challenge,
            "Bearer resource_metadata=\"https://mcp.context7.com/.well-known/oauth-protected-resource\""
        );
        let body = json_body(response).await;
        assert_eq!(body["error"]["code"], AUTHENTICATION_REQUIRED);
        assert_eq!(body["id"], Value::Null);
    }

    #[tokio::test]
    async fn test_anonymous_tools_list() {
        let request = post_json("/mcp", json!({"jsonrpc": "2.0", "id": 1, "method": "tools/list"}));
        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().contains_key(header::WWW_AUTHENTICATE));
        let body = json_body(response).await;
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"]["tools"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_notification_only_body_is_accepted() {
        let single = post_json("/mcp", json!({"jsonrpc": "2.0", "method": "notifications/initialized"}));
        let response = router().oneshot(single).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);

        let batch = post_json(
            "/mcp",
            json!([
                {"jsonrpc": "2.0", "method": "notifications/initialized"},
                {"jsonrpc": "2.0", "method": "notifications/cancelled", "params": {"requestId": 1}}
            ]),
        );
        let response = router().oneshot(batch).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn test_batch_returns_responses_for_requests_only() {
        let batch = post_json(
            "/mcp",
            json!([
                {"jsonrpc": "2.0", "id": "a", "method": "ping"},
                {"jsonrpc": "2.0", "method": "notifications/initialized"},
                {"jsonrpc": "2.0", "id": "b", "method": "tools/list"}
            ]),
        );
        let response = router().oneshot(batch).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let responses = body.as_array().unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0]["id"], "a");
        assert_eq!(responses[1]["id"], "b");
    }

    #[tokio::test]
    async fn test_unparseable_body() {
        let request = Request::builder()
            .method("POST")
            .uri("/mcp")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let response = router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"]["code"], PARSE_ERROR);
    }

    #[tokio::test]
    async fn test_get_and_delete_not_allowed() {
        for method in ["GET", "DELETE"] {
            let request = Request::builder()
                .method(method)
                .uri("/mcp")
                .body(Body::empty())
                .unwrap();
            let response = router().oneshot(request).await.unwrap();
            assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
            assert_eq!(json_body(response).await["error"]["code"], METHOD_NOT_ALLOWED);
        }
    }

    #[tokio::test]
    async fn test_unknown_path() {
        let response = router().oneshot(get_request("/v1/messages")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            json_body(response).await,
            json!({
                "error": "not_found",
                "message": "Endpoint not found. Use /mcp for MCP protocol communication."
            })
        );
    }

    #[tokio::test]
    async fn test_protected_resource_metadata() {
        let response = router()
            .oneshot(get_request("/.well-known/oauth-protected-resource"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({
                "resource": "https://mcp.context7.com/mcp/oauth",
                "authorization_servers": ["https://context7.com"],
                "scopes_supported": ["profile", "email"],
                "bearer_methods_supported": ["header"]
            })
        );
    }

    #[tokio::test]
    async fn test_authorization_server_metadata_proxy() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/.well-known/oauth-authorization-server")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"issuer":"https://auth.example.com"}"#)
            .create_async()
            .await;

        let settings = Settings {
            auth_server_url: server.url(),
            ..Settings::default()
        };
        let response = router_with(settings)
            .oneshot(get_request("/.well-known/oauth-authorization-server"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["issuer"], "https://auth.example.com");
    }

    #[tokio::test]
    async fn test_authorization_server_upstream_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/.well-known/oauth-authorization-server")
            .with_status(503)
            .create_async()
            .await;

        let settings = Settings {
            auth_server_url: server.url(),
            ..Settings::default()
        };
        let response = router_with(settings)
            .oneshot(get_request("/.well-known/oauth-authorization-server"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json_body(response).await["error"], "upstream_error");
    }

    #[tokio::test]
    async fn test_authorization_server_unreachable() {
        let settings = Settings {
            auth_server_url: "http://127.0.0.1:9".to_string(),
            ..Settings::default()
        };
        let response = router_with(settings)
            .oneshot(get_request("/.well-known/oauth-authorization-server"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(json_body(response).await["error"], "proxy_error");
    }

    #[tokio::test]
    async fn test_caller_context_reaches_backend() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/v2/libs/search")
            .match_query(Matcher::UrlEncoded("libraryName".into(), "next.js".into()))
            .match_header("authorization", "Bearer ctx7sk-caller")
            .match_header("x-m0x-transport", "http")
            .match_header("x-m0x-client-ide", "Cursor")
            .match_header("x-m0x-client-version", "1.7.0")
            .match_header("mcp-client-ip", Matcher::Regex("^[0-9a-f]{32}:[0-9a-f]+$".into()))
            .with_status(200)
            .with_body(r#"{"results":[{"id":"/vercel/next.js","title":"Next.js","description":"React framework"}]}"#)
            .create_async()
            .await;

        let settings = Settings {
            docs_api_base_url: server.url(),
            ..Settings::default()
        };
        let request = Request::builder()
            .method("POST")
            .uri("/mcp/oauth")
            .header(header::CONTENT_TYPE, "application/json")
            .header(header::AUTHORIZATION, "Bearer ctx7sk-caller")
            .header(header::USER_AGENT, "Cursor/1.7.0 (darwin arm64)")
            .header("x-forwarded-for", "203.0.113.50")
            .body(Body::from(
                json!({
                    "jsonrpc": "2.0",
                    "id": 9,
                    "method": "tools/call",
                    "params": {
                        "name": "resolve-library-id",
                        "arguments": {"query": "app router", "libraryName": "next.js"}
                    }
                })
                .to_string(),
            ))
            .unwrap();

        let response = router_with(settings).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        let text = body["result"]["content"][0]["text"].as_str().unwrap();
        assert!(text.contains("- m0x-context-compatible library ID: /vercel/next.js"));
        mock.assert_async().await;
    }
}
