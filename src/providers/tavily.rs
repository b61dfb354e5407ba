use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;

use super::{ProviderError, SearchHit, SearchProvider, SearchRequest};

const PROVIDER_ID: &str = "tavily";
const API_URL: &str = "https://api.tavily.com/search";

/// Tavily search API client, enabled via `TAVILY_API_KEY`.
#[derive(Debug, Clone)]
pub struct TavilyProvider {
    client: Client,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TavilyResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: Option<String>,
}

impl TavilyProvider {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl SearchProvider for TavilyProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn name(&self) -> &'static str {
        "Tavily"
    }

    fn configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, ProviderError> {
        let Some(api_key) = &self.api_key else {
            return Err(ProviderError::NotConfigured(PROVIDER_ID));
        };

        let response = self
            .client
            .post(API_URL)
            .json(&json!({
                "api_key": api_key,
                "query": request.query,
                "max_results": request.max_results,
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::upstream_status(PROVIDER_ID, status.as_u16()));
        }

        let body: TavilyResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::parse(PROVIDER_ID, err))?;

        Ok(map_results(body, request.max_results))
    }
}

fn map_results(body: TavilyResponse, limit: usize) -> Vec<SearchHit> {
    body.results
        .into_iter()
        .take(limit)
        .map(|result| SearchHit {
            title: if result.title.trim().is_empty() {
                result.url.clone()
            } else {
                result.title
            },
            url: result.url,
            snippet: result.content.filter(|content| !content.trim().is_empty()),
        })
        .collect()
}
