//! Axum HTTP handlers for the session router
//!
//! Provides the Streamable HTTP endpoint (`/mcp`), the legacy SSE pair
//! (`/sse` + `/messages`), and general metadata endpoints. Handlers only
//! classify requests and resolve sessions; protocol semantics live in the
//! engine and the endpoint types.

use std::{
    convert::Infallible,
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
};

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode},
    response::{
        sse::{Event, KeepAlive, Sse},
        IntoResponse, Response,
    },
    Json,
};
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::sync::mpsc;
use tracing::{error, info};

use crate::errors::AppError;
use crate::http::MCP_SESSION_ID_HEADER;
use crate::mcp::rpc::{is_initialize_request, is_json_rpc_error, json_rpc_error};
use crate::mcp::server::SUPPORTED_PROTOCOL_VERSION;
use crate::transport::{SessionEndpoint, SseEndpoint, StreamableEndpoint, TransportKind};
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub active_sessions: usize,
    pub providers: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct DiscoveryResponse {
    pub name: &'static str,
    pub version: &'static str,
    pub protocol_version: &'static str,
    pub mcp_endpoint: &'static str,
    pub sse_endpoint: &'static str,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        active_sessions: state.sessions.len(),
        providers: state.engine.providers().ids(),
    })
}

pub async fn discovery() -> Json<DiscoveryResponse> {
    Json(DiscoveryResponse {
        name: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        protocol_version: SUPPORTED_PROTOCOL_VERSION,
        mcp_endpoint: "/mcp",
        sse_endpoint: "/sse",
    })
}

/// POST `/mcp`: forward to an existing session, or create one for a
/// well-formed `initialize` request that arrives without a session id.
pub async fn mcp_post(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let payload: Option<Value> = serde_json::from_slice(&body).ok();

    if let Some(session_id) = session_id_from_headers(&headers) {
        let Some(endpoint) = state
            .sessions
            .lookup(TransportKind::Streamable, &session_id)
            .and_then(|session| session.as_streamable().cloned())
        else {
            return bad_session_response();
        };

        let Some(payload) = payload else {
            return (
                StatusCode::OK,
                Json(json_rpc_error(None, -32700, "Parse error")),
            )
                .into_response();
        };

        return match endpoint.forward(&state.engine, payload).await {
            Ok(Some(response)) => (StatusCode::OK, Json(response)).into_response(),
            Ok(None) => StatusCode::NO_CONTENT.into_response(),
            Err(_) => bad_session_response(),
        };
    }

    match payload {
        Some(payload) if is_initialize_request(&payload) => {
            initialize_session(&state, payload).await
        }
        _ => bad_session_response(),
    }
}

async fn initialize_session(state: &AppState, payload: Value) -> Response {
    let endpoint = StreamableEndpoint::new(Arc::downgrade(&state.sessions));

    let response = match endpoint.forward(&state.engine, payload).await {
        Ok(Some(response)) => response,
        // A notification-shaped initialize cannot complete a handshake, and
        // a fresh endpoint cannot already be closed.
        Ok(None) | Err(_) => return bad_session_response(),
    };

    if is_json_rpc_error(&response) {
        // Handshake failed; report the error without creating a session.
        return (StatusCode::OK, Json(response)).into_response();
    }

    endpoint.activate();
    let session_id = endpoint.session_id().to_string();
    if let Err(err) = state.sessions.insert(SessionEndpoint::Streamable(endpoint)) {
        error!(error = %err, "freshly generated session id collided");
        return AppError::internal("session id collision").into_response();
    }

    info!(
        session_id = %session_id,
        transport = %TransportKind::Streamable,
        "session established"
    );

    (
        StatusCode::OK,
        [(MCP_SESSION_ID_HEADER, session_id)],
        Json(response),
    )
        .into_response()
}

/// GET `/mcp`: open the server-push stream for an existing session.
pub async fn mcp_get(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(endpoint) = session_id_from_headers(&headers)
        .and_then(|id| state.sessions.lookup(TransportKind::Streamable, &id))
        .and_then(|session| session.as_streamable().cloned())
    else {
        return invalid_session_response();
    };

    let Some(receiver) = endpoint.take_push_stream() else {
        return (
            StatusCode::CONFLICT,
            "SSE stream already established for this session",
        )
            .into_response();
    };

    let stream = SessionEventStream {
        announce: None,
        receiver,
        _guard: CloseOnDrop(SessionEndpoint::Streamable(endpoint)),
    };
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

/// DELETE `/mcp`: terminate an existing session.
pub async fn mcp_delete(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let Some(session) = session_id_from_headers(&headers)
        .and_then(|id| state.sessions.lookup(TransportKind::Streamable, &id))
    else {
        return invalid_session_response();
    };

    session.close();
    StatusCode::OK.into_response()
}

/// GET `/sse`: open a legacy session. The first frame announces the
/// companion message endpoint, every later frame carries a server message.
pub async fn sse_get(State(state): State<AppState>) -> Response {
    let (endpoint, receiver) = SseEndpoint::new(Arc::downgrade(&state.sessions));

    if let Err(err) = state.sessions.insert(SessionEndpoint::LegacySse(endpoint.clone())) {
        error!(error = %err, "freshly generated session id collided");
        return AppError::internal("session id collision").into_response();
    }

    info!(
        session_id = %endpoint.session_id(),
        transport = %TransportKind::LegacySse,
        "session established"
    );

    let announce = Event::default()
        .event("endpoint")
        .data(endpoint.messages_path());
    let stream = SessionEventStream {
        announce: Some(announce),
        receiver,
        _guard: CloseOnDrop(SessionEndpoint::LegacySse(endpoint)),
    };
    Sse::new(stream)
        .keep_alive(KeepAlive::default())
        .into_response()
}

#[derive(Debug, Deserialize)]
pub struct MessagesQuery {
    #[serde(rename = "sessionId")]
    pub session_id: Option<String>,
}

/// POST `/messages?sessionId=...`: deliver a client message to a legacy
/// session. Responses travel back over the session's SSE stream.
pub async fn messages_post(
    State(state): State<AppState>,
    Query(query): Query<MessagesQuery>,
    body: Bytes,
) -> Response {
    let Some(endpoint) = query
        .session_id
        .as_deref()
        .and_then(|id| state.sessions.lookup(TransportKind::LegacySse, id))
        .and_then(|session| session.as_legacy_sse().cloned())
    else {
        return no_transport_response();
    };

    let payload: Value = match serde_json::from_slice(&body) {
        Ok(value) => value,
        Err(_) => return (StatusCode::BAD_REQUEST, "Invalid message").into_response(),
    };

    match endpoint.deliver(&state.engine, payload).await {
        Ok(()) => (StatusCode::ACCEPTED, "Accepted").into_response(),
        Err(_) => no_transport_response(),
    }
}

fn session_id_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(MCP_SESSION_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
}

fn bad_session_response() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "jsonrpc": "2.0",
            "error": {
                "code": -32000,
                "message": "Bad Request: No valid session ID provided"
            },
            "id": null
        })),
    )
        .into_response()
}

fn invalid_session_response() -> Response {
    (StatusCode::BAD_REQUEST, "Invalid or missing session ID").into_response()
}

fn no_transport_response() -> Response {
    (StatusCode::BAD_REQUEST, "No transport found for sessionId").into_response()
}

/// Server-push event stream for one session.
///
/// Emits the optional announcement frame first, then every queued server
/// message as an SSE `message` event.
struct SessionEventStream {
    announce: Option<Event>,
    receiver: mpsc::Receiver<Value>,
    _guard: CloseOnDrop,
}

impl Stream for SessionEventStream {
    type Item = Result<Event, Infallible>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if let Some(event) = this.announce.take() {
            return Poll::Ready(Some(Ok(event)));
        }

        this.receiver.poll_recv(cx).map(|message| {
            message.map(|payload| Ok(Event::default().event("message").data(payload.to_string())))
        })
    }
}

/// Closes the session when the response stream is dropped, which covers
/// orderly stream ends as well as client disconnects.
struct CloseOnDrop(SessionEndpoint);

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.0.close();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::transport::SessionTable;

    #[test]
    fn dropping_the_push_stream_closes_the_session() {
        let table = Arc::new(SessionTable::new());
        let endpoint = StreamableEndpoint::new(Arc::downgrade(&table));
        endpoint.activate();
        let session_id = endpoint.session_id().to_string();
        table
            .insert(SessionEndpoint::Streamable(endpoint.clone()))
            .expect("fresh session id");

        let receiver = endpoint.take_push_stream().expect("first stream take");
        let stream = SessionEventStream {
            announce: None,
            receiver,
            _guard: CloseOnDrop(SessionEndpoint::Streamable(endpoint)),
        };
        drop(stream);

        assert!(table
            .lookup(TransportKind::Streamable, &session_id)
            .is_none());
        assert!(table.is_empty());
    }

    #[test]
    fn dropping_the_legacy_stream_closes_the_session() {
        let table = Arc::new(SessionTable::new());
        let (endpoint, receiver) = SseEndpoint::new(Arc::downgrade(&table));
        table
            .insert(SessionEndpoint::LegacySse(endpoint.clone()))
            .expect("fresh session id");
        assert_eq!(table.len(), 1);

        let stream = SessionEventStream {
            announce: Some(Event::default().event("endpoint").data(endpoint.messages_path())),
            receiver,
            _guard: CloseOnDrop(SessionEndpoint::LegacySse(endpoint)),
        };
        drop(stream);

        assert!(table.is_empty());
    }
}
