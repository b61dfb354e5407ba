//! Interactive tools exposed via Model Context Protocol
//!
//! Provides `web_search` and `list_search_providers` implementations by
//! delegating to the configured `SearchProvider` registry.

use chrono::{SecondsFormat, Utc};
use rust_mcp_sdk::{
    macros,
    schema::{CallToolRequestParams, CallToolResult, ContentBlock, TextContent, Tool},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::warn;

use crate::domain::utils::{
    normalize_language, normalize_provider_id, normalize_query, normalize_search_limit,
};
use crate::mcp::rpc::{
    app_error_to_json_rpc, json_rpc_error, json_rpc_error_with_data, json_rpc_result,
};
use crate::providers::{ProviderRegistry, SearchRequest};
use crate::errors::AppError;

#[derive(Debug, Deserialize)]
pub struct WebSearchQueryParams {
    pub query: String,
    pub provider: Option<String>,
    pub max_results: Option<u32>,
    pub language: Option<String>,
}

#[macros::mcp_tool(
    name = "web_search",
    description = "Search the web and return result titles, URLs, and snippets"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct WebSearchTool {
    pub query: String,
    pub provider: Option<String>,
    pub max_results: Option<u32>,
    pub language: Option<String>,
}

#[macros::mcp_tool(
    name = "list_search_providers",
    description = "List registered search providers and which one is the default"
)]
#[derive(Debug, Deserialize, Serialize, macros::JsonSchema)]
pub struct ListSearchProvidersTool {}

pub fn build_tools_list() -> Vec<Tool> {
    vec![WebSearchTool::tool(), ListSearchProvidersTool::tool()]
}

pub fn build_search_request(
    params: WebSearchQueryParams,
) -> Result<(Option<String>, SearchRequest), AppError> {
    let provider = normalize_provider_id(params.provider);
    let request = SearchRequest {
        query: normalize_query(params.query)?,
        max_results: normalize_search_limit(params.max_results)?,
        language: normalize_language(params.language)?,
    };

    Ok((provider, request))
}

pub async fn handle_tools_call(
    providers: &ProviderRegistry,
    id: Option<Value>,
    params: Option<Value>,
) -> Value {
    let Some(raw_params) = params else {
        return json_rpc_error(id, -32602, "Invalid params");
    };

    let tool_call: CallToolRequestParams = match serde_json::from_value(raw_params) {
        Ok(value) => value,
        Err(_) => return json_rpc_error(id, -32602, "Invalid params"),
    };

    match tool_call.name.as_str() {
        "web_search" => {
            let query_params: WebSearchQueryParams =
                match serde_json::from_value(json!(tool_call.arguments.unwrap_or_default())) {
                    Ok(value) => value,
                    Err(_) => return json_rpc_error(id, -32602, "Invalid params"),
                };

            let (provider_id, request) = match build_search_request(query_params) {
                Ok(value) => value,
                Err(err) => return app_error_to_json_rpc(id, err),
            };
            let provider = match providers.resolve(provider_id.as_deref()) {
                Ok(provider) => provider,
                Err(err) => return app_error_to_json_rpc(id, err),
            };

            match provider.search(&request).await {
                Ok(hits) => {
                    let returned = hits.len();
                    let generated_at_utc = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

                    json_rpc_result(
                        id,
                        serde_json::to_value(CallToolResult {
                            content: vec![ContentBlock::from(TextContent::new(
                                format!(
                                    "Returned {returned} results for \"{}\" from {}",
                                    request.query,
                                    provider.name()
                                ),
                                None,
                                None,
                            ))],
                            is_error: None,
                            meta: None,
                            structured_content: Some(serde_json::Map::from_iter([
                                ("results".to_string(), json!(hits)),
                                ("provider".to_string(), json!(provider.id())),
                                ("query".to_string(), json!(request.query)),
                                ("returned".to_string(), json!(returned)),
                                ("generated_at_utc".to_string(), json!(generated_at_utc)),
                            ])),
                        })
                        .expect("web_search tool result serialization"),
                    )
                }
                Err(err) => {
                    warn!(provider = provider.id(), error = %err, "search request failed");

                    json_rpc_result(
                        id,
                        serde_json::to_value(CallToolResult {
                            content: vec![ContentBlock::from(TextContent::new(
                                format!("Search failed: {err}"),
                                None,
                                None,
                            ))],
                            is_error: Some(true),
                            meta: None,
                            structured_content: None,
                        })
                        .expect("web_search tool error serialization"),
                    )
                }
            }
        }
        "list_search_providers" => {
            let listed = providers
                .all()
                .iter()
                .map(|provider| {
                    json!({
                        "id": provider.id(),
                        "name": provider.name(),
                        "configured": provider.configured(),
                        "default": provider.id() == providers.default_id(),
                    })
                })
                .collect::<Vec<_>>();
            let generated_at_utc = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);

            json_rpc_result(
                id,
                serde_json::to_value(CallToolResult {
                    content: vec![ContentBlock::from(TextContent::new(
                        format!("{} search providers registered", listed.len()),
                        None,
                        None,
                    ))],
                    is_error: None,
                    meta: None,
                    structured_content: Some(serde_json::Map::from_iter([
                        ("providers".to_string(), json!(listed)),
                        ("default".to_string(), json!(providers.default_id())),
                        ("generated_at_utc".to_string(), json!(generated_at_utc)),
                    ])),
                })
                .expect("list_search_providers tool result serialization"),
            )
        }
        _ => json_rpc_error_with_data(
            id,
            -32601,
            "Method not found",
            Some(json!({
                "code": "tool_not_found",
                "message": "unknown tool name",
                "details": {
                    "name": tool_call.name,
                },
            })),
        ),
    }
}
