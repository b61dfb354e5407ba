use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{ProviderError, SearchHit, SearchProvider, SearchRequest};

const PROVIDER_ID: &str = "brave";
const API_URL: &str = "https://api.search.brave.com/res/v1/web/search";
// The web search endpoint caps `count` at 20 regardless of plan.
const MAX_COUNT: usize = 20;

/// Brave Search API client, enabled via `BRAVE_API_KEY`.
#[derive(Debug, Clone)]
pub struct BraveProvider {
    client: Client,
    api_key: Option<String>,
}

#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: Option<BraveWebResults>,
}

#[derive(Debug, Deserialize)]
struct BraveWebResults {
    #[serde(default)]
    results: Vec<BraveResult>,
}

#[derive(Debug, Deserialize)]
struct BraveResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    description: Option<String>,
}

impl BraveProvider {
    pub fn new(client: Client, api_key: Option<String>) -> Self {
        Self { client, api_key }
    }
}

#[async_trait]
impl SearchProvider for BraveProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn name(&self) -> &'static str {
        "Brave Search"
    }

    fn configured(&self) -> bool {
        self.api_key.is_some()
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, ProviderError> {
        let Some(api_key) = &self.api_key else {
            return Err(ProviderError::NotConfigured(PROVIDER_ID));
        };

        let count = request.max_results.min(MAX_COUNT);
        let mut query = vec![
            ("q".to_string(), request.query.clone()),
            ("count".to_string(), count.to_string()),
        ];
        if let Some(language) = &request.language {
            query.push(("search_lang".to_string(), language.clone()));
        }

        let response = self
            .client
            .get(API_URL)
            .header("Accept", "application/json")
            .header("X-Subscription-Token", api_key)
            .query(&query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::upstream_status(PROVIDER_ID, status.as_u16()));
        }

        let body: BraveResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::parse(PROVIDER_ID, err))?;

        Ok(map_results(body, request.max_results))
    }
}

fn map_results(body: BraveResponse, limit: usize) -> Vec<SearchHit> {
    body.web
        .map(|web| web.results)
        .unwrap_or_default()
        .into_iter()
        .take(limit)
        .map(|result| SearchHit {
            title: if result.title.trim().is_empty() {
                result.url.clone()
            } else {
                result.title
            },
            url: result.url,
            snippet: result
                .description
                .filter(|description| !description.trim().is_empty()),
        })
        .collect()
}
