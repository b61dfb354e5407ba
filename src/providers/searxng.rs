use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use url::Url;

use super::{ProviderError, SearchHit, SearchProvider, SearchRequest};

const PROVIDER_ID: &str = "searxng";

/// Client for a self-hosted SearXNG instance, enabled via `SEARXNG_URL`.
#[derive(Debug, Clone)]
pub struct SearxngProvider {
    client: Client,
    base_url: Option<Url>,
}

#[derive(Debug, Deserialize)]
struct SearxngResponse {
    #[serde(default)]
    results: Vec<SearxngResult>,
}

#[derive(Debug, Deserialize)]
struct SearxngResult {
    #[serde(default)]
    title: String,
    url: String,
    #[serde(default)]
    content: Option<String>,
}

impl SearxngProvider {
    pub fn new(client: Client, base_url: Option<Url>) -> Self {
        Self { client, base_url }
    }
}

#[async_trait]
impl SearchProvider for SearxngProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn name(&self) -> &'static str {
        "SearXNG"
    }

    fn configured(&self) -> bool {
        self.base_url.is_some()
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, ProviderError> {
        let Some(base_url) = &self.base_url else {
            return Err(ProviderError::NotConfigured(PROVIDER_ID));
        };
        let endpoint = base_url
            .join("search")
            .map_err(|err| ProviderError::parse(PROVIDER_ID, err))?;

        let mut query = vec![
            ("q".to_string(), request.query.clone()),
            ("format".to_string(), "json".to_string()),
        ];
        if let Some(language) = &request.language {
            query.push(("language".to_string(), language.clone()));
        }

        let response = self.client.get(endpoint).query(&query).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::upstream_status(PROVIDER_ID, status.as_u16()));
        }

        let body: SearxngResponse = response
            .json()
            .await
            .map_err(|err| ProviderError::parse(PROVIDER_ID, err))?;

        Ok(map_results(body, request.max_results))
    }
}

fn map_results(body: SearxngResponse, limit: usize) -> Vec<SearchHit> {
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
