//! The central Model Context Protocol engine
//!
//! Provides the primary MCP JSON-RPC decoding, method execution routing,
//! capabilities negotiation (`initialize`), and tool call routing. The engine
//! is transport-agnostic: every endpoint variant feeds it raw payloads.

use std::sync::Arc;

use rust_mcp_sdk::schema::{
    CallToolRequest, Implementation, InitializeRequest, InitializeResult, JsonrpcMessage,
    JsonrpcRequest, ListToolsRequest, ListToolsResult, PingRequest, ProtocolVersion,
    ServerCapabilities, ServerCapabilitiesTools,
};
use serde_json::{json, Value};
use tracing::info;

use crate::domain::tools::{build_tools_list, handle_tools_call};
use crate::errors::AppError;
use crate::mcp::rpc::{
    app_error_to_json_rpc, is_json_rpc_error, json_rpc_error, json_rpc_result, request_id_to_value,
};
use crate::providers::ProviderRegistry;

pub const SUPPORTED_PROTOCOL_VERSION: &str = "2024-11-05";

/// Transport-agnostic JSON-RPC request handler shared by every endpoint.
#[derive(Debug)]
pub struct McpEngine {
    providers: Arc<ProviderRegistry>,
}

impl McpEngine {
    pub fn new(providers: Arc<ProviderRegistry>) -> Self {
        Self { providers }
    }

    pub fn providers(&self) -> &ProviderRegistry {
        &self.providers
    }

    /// Handle one framed message. Requests produce `Some(response)`,
    /// notifications produce `None`.
    pub async fn handle_json_rpc_value(&self, payload: Value) -> Option<Value> {
        if !payload.is_object() {
            return Some(json_rpc_error(None, -32600, "Invalid Request"));
        }

        let request_id = payload.get("id").cloned();
        let parsed: JsonrpcMessage = match serde_json::from_value(payload) {
            Ok(message) => message,
            Err(_) => return Some(json_rpc_error(request_id, -32600, "Invalid Request")),
        };

        match parsed {
            JsonrpcMessage::Request(request) => {
                if let Err(error_response) = validate_request_shape(&request) {
                    return Some(error_response);
                }

                let request_id = request_id_to_value(request.id);
                if request.method.trim().is_empty() {
                    return Some(json_rpc_error(Some(request_id), -32600, "Invalid Request"));
                }

                Some(
                    self.handle_json_rpc_request(
                        Some(request_id),
                        request.method,
                        request.params.map(Value::Object),
                    )
                    .await,
                )
            }
            JsonrpcMessage::Notification(notification) => {
                if notification.method.trim().is_empty() {
                    return None;
                }

                let _ = self
                    .handle_json_rpc_request(
                        None,
                        notification.method,
                        notification.params.map(Value::Object),
                    )
                    .await;
                None
            }
            JsonrpcMessage::ResultResponse(_) | JsonrpcMessage::ErrorResponse(_) => {
                Some(json_rpc_error(request_id, -32600, "Invalid Request"))
            }
        }
    }

    async fn handle_json_rpc_request(
        &self,
        id: Option<Value>,
        method: String,
        params: Option<Value>,
    ) -> Value {
        let response = match method.as_str() {
            "initialize" => {
                let protocol_version = match negotiate_protocol_version(params.as_ref()) {
                    Ok(version) => version,
                    Err(err) => return app_error_to_json_rpc(id, err),
                };

                let initialize_result = InitializeResult {
                    server_info: Implementation {
                        name: env!("CARGO_PKG_NAME").to_string(),
                        version: env!("CARGO_PKG_VERSION").to_string(),
                        title: None,
                        description: None,
                        icons: vec![],
                        website_url: None,
                    },
                    capabilities: ServerCapabilities {
                        tools: Some(ServerCapabilitiesTools {
                            list_changed: Some(false),
                        }),
                        ..Default::default()
                    },
                    protocol_version: protocol_version.into(),
                    instructions: None,
                    meta: None,
                };

                json_rpc_result(
                    id,
                    serde_json::to_value(initialize_result)
                        .expect("initialize result serialization"),
                )
            }
            "ping" => json_rpc_result(id, json!({})),
            "tools/list" => json_rpc_result(
                id,
                serde_json::to_value(ListToolsResult {
                    meta: None,
                    next_cursor: None,
                    tools: build_tools_list(),
                })
                .expect("tools list result serialization"),
            ),
            "tools/call" => handle_tools_call(&self.providers, id, params).await,
            _ => json_rpc_error(id, -32601, "Method not found"),
        };

        info!(
            method = %method,
            outcome = if is_json_rpc_error(&response) { "failure" } else { "success" },
            "mcp request handled"
        );

        response
    }
}

pub fn validate_request_shape(request: &JsonrpcRequest) -> Result<(), Value> {
    let payload = serde_json::to_value(request).expect("jsonrpc request serialization");
    let request_id = Some(request_id_to_value(request.id.clone()));

    let valid = match request.method.as_str() {
        "tools/call" => serde_json::from_value::<CallToolRequest>(payload).is_ok(),
        "tools/list" => serde_json::from_value::<ListToolsRequest>(payload).is_ok(),
        "ping" => serde_json::from_value::<PingRequest>(payload).is_ok(),
        "initialize" => serde_json::from_value::<InitializeRequest>(payload).is_ok(),
        _ => true,
    };

    if valid {
        Ok(())
    } else {
        Err(json_rpc_error(request_id, -32602, "Invalid params"))
    }
}

pub fn negotiate_protocol_version(params: Option<&Value>) -> Result<ProtocolVersion, AppError> {
    let offered_version = params
        .and_then(Value::as_object)
        .and_then(|object| object.get("protocolVersion"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|version| !version.is_empty())
        .ok_or_else(|| {
            AppError::bad_request(
                "invalid_protocol_version",
                "initialize params.protocolVersion is required",
            )
        })?;

    if offered_version != SUPPORTED_PROTOCOL_VERSION {
        return Err(AppError::bad_request(
            "unsupported_protocol_version",
            "unsupported initialize protocolVersion",
        ));
    }

    Ok(ProtocolVersion::V2024_11_05)
}
