//! HTTP transport layer for the Model Context Protocol
//!
//! Provides the session router over `/mcp` (Streamable HTTP), the legacy
//! `/sse` + `/messages` pair, and the metadata endpoints.

pub mod handlers;

use axum::http::HeaderName;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;

/// Header that carries the Streamable HTTP session id.
pub const MCP_SESSION_ID_HEADER: &str = "mcp-session-id";

/// Builds the cross-origin layer, or `None` when CORS is disabled.
///
/// With a pinned origin only that origin is allowed; otherwise the layer is
/// fully permissive. Either way the session id header must be exposed so
/// browser clients can read it from the initialize response.
pub fn cors_layer(config: &Config) -> Option<CorsLayer> {
    if !config.enable_cors {
        return None;
    }

    let layer = match &config.cors_origin {
        Some(origin) => CorsLayer::new()
            .allow_origin(origin.clone())
            .allow_methods(Any)
            .allow_headers(Any)
            .expose_headers([HeaderName::from_static(MCP_SESSION_ID_HEADER)]),
        None => CorsLayer::permissive(),
    };
    Some(layer)
}
