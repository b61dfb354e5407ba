//! Search provider clients
//!
//! Each provider adapts one upstream search API to the `SearchProvider`
//! contract consumed by the tool layer.

pub mod brave;
pub mod duckduckgo;
pub mod registry;
pub mod searxng;
pub mod tavily;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

pub use registry::ProviderRegistry;

pub const HTTP_TIMEOUT_SECS: u64 = 15;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub query: String,
    pub max_results: usize,
    pub language: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub url: String,
    pub snippet: Option<String>,
}

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("{provider} returned HTTP {status}")]
    UpstreamStatus { provider: &'static str, status: u16 },
    #[error("failed to parse {provider} response: {message}")]
    Parse {
        provider: &'static str,
        message: String,
    },
    #[error("provider {0} is not configured")]
    NotConfigured(&'static str),
}

impl ProviderError {
    pub fn upstream_status(provider: &'static str, status: u16) -> Self {
        Self::UpstreamStatus { provider, status }
    }

    pub fn parse(provider: &'static str, message: impl ToString) -> Self {
        Self::Parse {
            provider,
            message: message.to_string(),
        }
    }
}

#[async_trait]
pub trait SearchProvider: Send + Sync + std::fmt::Debug {
    /// Stable identifier clients pass in tool arguments.
    fn id(&self) -> &'static str;

    /// Human-readable provider name.
    fn name(&self) -> &'static str;

    /// Whether the provider has the configuration it needs to serve queries.
    fn configured(&self) -> bool {
        true
    }

    async fn search(&self, request: &SearchRequest) -> Result<Vec<SearchHit>, ProviderError>;
}
