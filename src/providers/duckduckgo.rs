use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

use super::{ProviderError, SearchHit, SearchProvider, SearchRequest};

const PROVIDER_ID: &str = "duckduckgo";
const API_URL: &str = "https://api.duckduckgo.com/";

/// DuckDuckGo Instant Answer API client. Keyless, so it is always registered.
#[derive(Debug, Clone)]
pub struct DuckDuckGoProvider {
    client: Client,
}

#[derive(Debug, Deserialize)]
struct InstantAnswer {
    #[serde(rename = "Heading", default)]
    heading: String,
    #[serde(rename = "AbstractText", default)]
    abstract_text: String,
    #[serde(rename = "AbstractURL", default)]
    abstract_url: String,
    #[serde(rename = "RelatedTopics", default)]
    related_topics: Vec<RelatedTopic>,
}

/// Related topics are either a leaf (`FirstURL` + `Text`) or a named group
/// carrying nested `Topics`; one struct with optional fields covers both.
#[derive(Debug, Deserialize, Default)]
struct RelatedTopic {
    #[serde(rename = "FirstURL")]
    first_url: Option<String>,
    #[serde(rename = "Text")]
    text: Option<String>,
    #[serde(rename = "Topics", default)]
    topics: Vec<RelatedTopic>,
}

impl DuckDuckGoProvider {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    fn id(&self) -> &'static str {
        PROVIDER_ID
    }

    fn name(&self) -> &'static str {
        "DuckDuckGo"
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, ProviderError> {
        let response = self
            .client
            .get(API_URL)
            .query(&[
                ("q", request.query.as_str()),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderError::upstream_status(PROVIDER_ID, status.as_u16()));
        }

        let answer: InstantAnswer = response
            .json()
            .await
            .map_err(|err| ProviderError::parse(PROVIDER_ID, err))?;

        Ok(map_instant_answer(answer, request.max_results))
    }
}

fn map_instant_answer(answer: InstantAnswer, limit: usize) -> Vec<SearchHit> {
    let mut hits = Vec::new();

    if !answer.abstract_url.trim().is_empty() {
        hits.push(SearchHit {
            title: if answer.heading.trim().is_empty() {
                answer.abstract_url.clone()
            } else {
                answer.heading.clone()
            },
            url: answer.abstract_url.clone(),
            snippet: if answer.abstract_text.trim().is_empty() {
                None
            } else {
                Some(answer.abstract_text.clone())
            },
        });
    }

    collect_related_topics(&answer.related_topics, limit, &mut hits);
    hits.truncate(limit);
    hits
}

fn collect_related_topics(topics: &[RelatedTopic], limit: usize, hits: &mut Vec<SearchHit>) {
    for topic in topics {
        if hits.len() >= limit {
            return;
        }

        match (&topic.first_url, &topic.text) {
            (Some(url), Some(text)) if !url.trim().is_empty() => {
                hits.push(SearchHit {
                    title: text.clone(),
                    url: url.clone(),
                    snippet: None,
                });
            }
            _ => collect_related_topics(&topic.topics, limit, hits),
        }
    }
}
