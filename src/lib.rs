use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

pub mod config;
pub mod domain;
pub mod errors;
pub mod http;
pub mod logging;
pub mod mcp;
pub mod providers;
pub mod transport;

use mcp::server::McpEngine;
use transport::SessionTable;

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<McpEngine>,
    pub sessions: Arc<SessionTable>,
}

impl AppState {
    pub fn new(engine: Arc<McpEngine>, sessions: Arc<SessionTable>) -> Self {
        Self { engine, sessions }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(http::handlers::health))
        .route("/.well-known/mcp", get(http::handlers::discovery))
        .route(
            "/mcp",
            post(http::handlers::mcp_post)
                .get(http::handlers::mcp_get)
                .delete(http::handlers::mcp_delete),
        )
        .route("/sse", get(http::handlers::sse_get))
        .route("/messages", post(http::handlers::messages_post))
        .layer(middleware::from_fn(logging::request_logging_middleware))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::{Body, BodyDataStream},
        http::{header, Request, StatusCode},
    };
    use futures_util::StreamExt;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::mcp::server::SUPPORTED_PROTOCOL_VERSION;
    use crate::providers::{
        ProviderError, ProviderRegistry, SearchHit, SearchProvider, SearchRequest,
    };

    use super::*;

    const INITIALIZE_BODY: &str = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"2024-11-05","clientInfo":{"name":"test-client","version":"1.0.0"},"capabilities":{}}}"#;
    const TOOLS_LIST_BODY: &str = r#"{"jsonrpc":"2.0","id":2,"method":"tools/list","params":{}}"#;

    #[derive(Debug)]
    struct MockProvider;

    #[async_trait::async_trait]
    impl SearchProvider for MockProvider {
        fn id(&self) -> &'static str {
            "mock"
        }

        fn name(&self) -> &'static str {
            "Mock Search"
        }

        async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, ProviderError> {
            if request.query == "fail" {
                return Err(ProviderError::upstream_status("mock", 502));
            }

            Ok(vec![SearchHit {
                title: format!("Result for {}", request.query),
                url: "https://example.com/doc".to_string(),
                snippet: Some("A matching snippet".to_string()),
            }])
        }
    }

    fn app() -> Router {
        let registry = ProviderRegistry::with_providers(vec![Arc::new(MockProvider)], "mock");
        let engine = Arc::new(McpEngine::new(Arc::new(registry)));
        let sessions = Arc::new(SessionTable::new());
        build_app(AppState::new(engine, sessions))
    }

    fn mcp_post_request(session_id: Option<&str>, body: &str) -> Request<Body> {
        let mut builder = Request::builder()
            .uri("/mcp")
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(id) = session_id {
            builder = builder.header("mcp-session-id", id);
        }
        builder
            .body(Body::from(body.to_string()))
            .expect("request build")
    }

    fn mcp_get_request(session_id: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/mcp").method("GET");
        if let Some(id) = session_id {
            builder = builder.header("mcp-session-id", id);
        }
        builder.body(Body::empty()).expect("request build")
    }

    fn mcp_delete_request(session_id: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri("/mcp").method("DELETE");
        if let Some(id) = session_id {
            builder = builder.header("mcp-session-id", id);
        }
        builder.body(Body::empty()).expect("request build")
    }

    fn sse_request() -> Request<Body> {
        Request::builder()
            .uri("/sse")
            .method("GET")
            .body(Body::empty())
            .expect("request build")
    }

    fn messages_request(session_id: &str, body: &str) -> Request<Body> {
        Request::builder()
            .uri(format!("/messages?sessionId={session_id}"))
            .method("POST")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .expect("request build")
    }

    fn tools_call_body(query: &str) -> String {
        json!({
            "jsonrpc": "2.0",
            "id": 3,
            "method": "tools/call",
            "params": {"name": "web_search", "arguments": {"query": query}}
        })
        .to_string()
    }

    async fn establish_session(app: &Router) -> String {
        let response = app
            .clone()
            .oneshot(mcp_post_request(None, INITIALIZE_BODY))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::OK);
        response
            .headers()
            .get("mcp-session-id")
            .expect("session id header")
            .to_str()
            .expect("ascii header")
            .to_string()
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let body = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        serde_json::from_slice(&body).expect("valid json response")
    }

    async fn body_text(response: axum::response::Response) -> String {
        let body = response
            .into_body()
            .collect()
            .await
            .expect("collect body")
            .to_bytes();
        String::from_utf8(body.to_vec()).expect("utf8 body")
    }

    async fn next_frame(frames: &mut BodyDataStream) -> String {
        let chunk = frames
            .next()
            .await
            .expect("stream frame")
            .expect("frame read");
        String::from_utf8(chunk.to_vec()).expect("utf8 frame")
    }

    fn session_id_from_announce(frame: &str) -> String {
        let data_line = frame
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .expect("announce data line");
        data_line
            .strip_prefix("/messages?sessionId=")
            .expect("endpoint path")
            .to_string()
    }

    fn payload_from_frame(frame: &str) -> Value {
        let data_line = frame
            .lines()
            .find_map(|line| line.strip_prefix("data: "))
            .expect("message data line");
        serde_json::from_str(data_line).expect("valid json payload")
    }

    fn assert_no_session_envelope(body: &Value) {
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["error"]["code"], -32000);
        assert_eq!(
            body["error"]["message"],
            "Bad Request: No valid session ID provided"
        );
        assert!(body["id"].is_null());
    }

    #[tokio::test]
    async fn health_reports_sessions_and_providers() {
        let app = app();

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .method("GET")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["active_sessions"], 0);
        assert_eq!(body["providers"], json!(["mock"]));

        establish_session(&app).await;

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/health")
                    .method("GET")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");
        let body = body_json(response).await;
        assert_eq!(body["active_sessions"], 1);
    }

    #[tokio::test]
    async fn discovery_describes_both_endpoints() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/.well-known/mcp")
                    .method("GET")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["mcp_endpoint"], "/mcp");
        assert_eq!(body["sse_endpoint"], "/sse");
        assert_eq!(body["protocol_version"], SUPPORTED_PROTOCOL_VERSION);
        assert_eq!(body["name"], env!("CARGO_PKG_NAME"));
    }

    #[tokio::test]
    async fn initialize_creates_session_and_returns_id_header() {
        let response = app()
            .oneshot(mcp_post_request(None, INITIALIZE_BODY))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        let session_id = response
            .headers()
            .get("mcp-session-id")
            .expect("session id header")
            .to_str()
            .expect("ascii header")
            .to_string();
        uuid::Uuid::parse_str(&session_id).expect("session id is a uuid");

        let body = body_json(response).await;
        assert_eq!(body["jsonrpc"], "2.0");
        assert_eq!(body["id"], 1);
        assert_eq!(body["result"]["protocolVersion"], SUPPORTED_PROTOCOL_VERSION);
        assert_eq!(body["result"]["serverInfo"]["name"], env!("CARGO_PKG_NAME"));
        assert!(body["result"]["capabilities"]["tools"].is_object());
    }

    #[tokio::test]
    async fn non_initialize_without_session_is_rejected() {
        let response = app()
            .oneshot(mcp_post_request(None, TOOLS_LIST_BODY))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_no_session_envelope(&body);
    }

    #[tokio::test]
    async fn unknown_session_id_is_rejected() {
        let response = app()
            .oneshot(mcp_post_request(Some("does-not-exist"), TOOLS_LIST_BODY))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_no_session_envelope(&body);
    }

    #[tokio::test]
    async fn initialize_with_unsupported_version_creates_no_session() {
        let body = r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{"protocolVersion":"1999-01-01","clientInfo":{"name":"test-client","version":"1.0.0"},"capabilities":{}}}"#;
        let response = app()
            .oneshot(mcp_post_request(None, body))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("mcp-session-id").is_none());
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32602);
    }

    #[tokio::test]
    async fn follow_up_requests_route_through_the_session() {
        let app = app();
        let session_id = establish_session(&app).await;

        let response = app
            .clone()
            .oneshot(mcp_post_request(Some(&session_id), TOOLS_LIST_BODY))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], 2);
        let tools: Vec<&str> = body["result"]["tools"]
            .as_array()
            .expect("tools array")
            .iter()
            .filter_map(|tool| tool["name"].as_str())
            .collect();
        assert!(tools.contains(&"web_search"));
        assert!(tools.contains(&"list_search_providers"));
    }

    #[tokio::test]
    async fn web_search_executes_over_the_session() {
        let app = app();
        let session_id = establish_session(&app).await;

        let response = app
            .clone()
            .oneshot(mcp_post_request(Some(&session_id), &tools_call_body("rust")))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["id"], 3);
        let text = body["result"]["content"][0]["text"]
            .as_str()
            .expect("text content");
        assert!(text.contains("from Mock Search"));
        assert_eq!(body["result"]["structuredContent"]["provider"], "mock");
        assert_eq!(
            body["result"]["structuredContent"]["results"][0]["url"],
            "https://example.com/doc"
        );
    }

    #[tokio::test]
    async fn web_search_provider_failure_is_reported_in_result() {
        let app = app();
        let session_id = establish_session(&app).await;

        let response = app
            .clone()
            .oneshot(mcp_post_request(Some(&session_id), &tools_call_body("fail")))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["result"]["isError"], true);
        let text = body["result"]["content"][0]["text"]
            .as_str()
            .expect("text content");
        assert!(text.starts_with("Search failed:"));
    }

    #[tokio::test]
    async fn notification_returns_no_content() {
        let app = app();
        let session_id = establish_session(&app).await;

        let response = app
            .clone()
            .oneshot(mcp_post_request(
                Some(&session_id),
                r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#,
            ))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
    }

    #[tokio::test]
    async fn malformed_json_with_session_gets_parse_error() {
        let app = app();
        let session_id = establish_session(&app).await;

        let response = app
            .clone()
            .oneshot(mcp_post_request(Some(&session_id), "{not json"))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["error"]["code"], -32700);
    }

    #[tokio::test]
    async fn malformed_json_without_session_gets_envelope() {
        let response = app()
            .oneshot(mcp_post_request(None, "{not json"))
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_no_session_envelope(&body);
    }

    #[tokio::test]
    async fn concurrent_initializes_get_distinct_ids() {
        let app = app();
        let (first, second) = tokio::join!(establish_session(&app), establish_session(&app));
        assert_ne!(first, second);

        for session_id in [&first, &second] {
            let response = app
                .clone()
                .oneshot(mcp_post_request(Some(session_id), TOOLS_LIST_BODY))
                .await
                .expect("request execution");
            assert_eq!(response.status(), StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn delete_terminates_the_session_exactly_once() {
        let app = app();
        let session_id = establish_session(&app).await;

        let response = app
            .clone()
            .oneshot(mcp_delete_request(Some(&session_id)))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .clone()
            .oneshot(mcp_post_request(Some(&session_id), TOOLS_LIST_BODY))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_no_session_envelope(&body);

        let response = app
            .clone()
            .oneshot(mcp_get_request(Some(&session_id)))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(mcp_delete_request(Some(&session_id)))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Invalid or missing session ID");
    }

    #[tokio::test]
    async fn get_and_delete_reject_missing_or_unknown_sessions() {
        let app = app();

        for request in [
            mcp_get_request(None),
            mcp_get_request(Some("does-not-exist")),
            mcp_delete_request(None),
            mcp_delete_request(Some("does-not-exist")),
        ] {
            let response = app.clone().oneshot(request).await.expect("request execution");
            assert_eq!(response.status(), StatusCode::BAD_REQUEST);
            assert_eq!(body_text(response).await, "Invalid or missing session ID");
        }
    }

    #[tokio::test]
    async fn push_stream_is_exclusive_and_drop_terminates_the_session() {
        let app = app();
        let session_id = establish_session(&app).await;

        let first = app
            .clone()
            .oneshot(mcp_get_request(Some(&session_id)))
            .await
            .expect("request execution");
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(
            first
                .headers()
                .get(header::CONTENT_TYPE)
                .expect("content type")
                .to_str()
                .expect("ascii header"),
            "text/event-stream"
        );

        let second = app
            .clone()
            .oneshot(mcp_get_request(Some(&session_id)))
            .await
            .expect("request execution");
        assert_eq!(second.status(), StatusCode::CONFLICT);

        drop(first);

        let response = app
            .clone()
            .oneshot(mcp_post_request(Some(&session_id), TOOLS_LIST_BODY))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_no_session_envelope(&body);
    }

    #[tokio::test]
    async fn sse_announces_endpoint_and_streams_responses() {
        let app = app();

        let response = app
            .clone()
            .oneshot(sse_request())
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response
                .headers()
                .get(header::CONTENT_TYPE)
                .expect("content type")
                .to_str()
                .expect("ascii header"),
            "text/event-stream"
        );

        let mut frames = response.into_body().into_data_stream();
        let announce = next_frame(&mut frames).await;
        assert!(announce.starts_with("event: endpoint\n"));
        let session_id = session_id_from_announce(&announce);
        assert!(!session_id.is_empty());

        let response = app
            .clone()
            .oneshot(messages_request(&session_id, INITIALIZE_BODY))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        assert_eq!(body_text(response).await, "Accepted");

        let frame = next_frame(&mut frames).await;
        assert!(frame.starts_with("event: message\n"));
        let payload = payload_from_frame(&frame);
        assert_eq!(payload["id"], 1);
        assert_eq!(
            payload["result"]["protocolVersion"],
            SUPPORTED_PROTOCOL_VERSION
        );
    }

    #[tokio::test]
    async fn dropped_sse_stream_unregisters_the_session() {
        let app = app();

        let response = app
            .clone()
            .oneshot(sse_request())
            .await
            .expect("request execution");
        let mut frames = response.into_body().into_data_stream();
        let session_id = session_id_from_announce(&next_frame(&mut frames).await);
        drop(frames);

        let response = app
            .clone()
            .oneshot(messages_request(&session_id, INITIALIZE_BODY))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "No transport found for sessionId");
    }

    #[tokio::test]
    async fn messages_without_known_session_is_rejected() {
        let app = app();

        let response = app
            .clone()
            .oneshot(messages_request("nope", INITIALIZE_BODY))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "No transport found for sessionId");

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/messages")
                    .method("POST")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(INITIALIZE_BODY))
                    .expect("request build"),
            )
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "No transport found for sessionId");
    }

    #[tokio::test]
    async fn messages_with_invalid_json_is_rejected() {
        let app = app();

        let response = app
            .clone()
            .oneshot(sse_request())
            .await
            .expect("request execution");
        let mut frames = response.into_body().into_data_stream();
        let session_id = session_id_from_announce(&next_frame(&mut frames).await);

        let response = app
            .clone()
            .oneshot(messages_request(&session_id, "{not json"))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_text(response).await, "Invalid message");
    }

    #[tokio::test]
    async fn transport_families_are_isolated() {
        let app = app();

        let response = app
            .clone()
            .oneshot(sse_request())
            .await
            .expect("request execution");
        let mut frames = response.into_body().into_data_stream();
        let legacy_id = session_id_from_announce(&next_frame(&mut frames).await);

        // A legacy session id is not valid on the streamable route.
        let response = app
            .clone()
            .oneshot(mcp_post_request(Some(&legacy_id), TOOLS_LIST_BODY))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_no_session_envelope(&body);

        let response = app
            .clone()
            .oneshot(mcp_delete_request(Some(&legacy_id)))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        // The legacy session is untouched by the attempts above.
        let response = app
            .clone()
            .oneshot(messages_request(&legacy_id, INITIALIZE_BODY))
            .await
            .expect("request execution");
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }

    #[tokio::test]
    async fn root_get_is_not_found() {
        let response = app()
            .oneshot(
                Request::builder()
                    .uri("/")
                    .method("GET")
                    .body(Body::empty())
                    .expect("request build"),
            )
            .await
            .expect("request execution");

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
