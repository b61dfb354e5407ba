//! Provider registry built once at startup from process configuration.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tracing::warn;

use crate::config::Config;
use crate::errors::AppError;

use super::{
    brave::BraveProvider, duckduckgo::DuckDuckGoProvider, searxng::SearxngProvider,
    tavily::TavilyProvider, SearchProvider, HTTP_TIMEOUT_SECS,
};

#[derive(Debug)]
pub struct ProviderRegistry {
    providers: Vec<Arc<dyn SearchProvider>>,
    default_id: String,
}

impl ProviderRegistry {
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|err| AppError::internal(format!("failed to build http client: {err}")))?;

        let providers: Vec<Arc<dyn SearchProvider>> = vec![
            Arc::new(DuckDuckGoProvider::new(client.clone())),
            Arc::new(SearxngProvider::new(
                client.clone(),
                config.searxng_url.clone(),
            )),
            Arc::new(BraveProvider::new(
                client.clone(),
                config.brave_api_key.clone(),
            )),
            Arc::new(TavilyProvider::new(client, config.tavily_api_key.clone())),
        ];

        Ok(Self::with_providers(providers, &config.default_provider))
    }

    /// Build a registry from explicit providers. Kept public so tests and
    /// embedders can wire their own implementations.
    pub fn with_providers(providers: Vec<Arc<dyn SearchProvider>>, default_id: &str) -> Self {
        let registry = Self {
            providers,
            default_id: default_id.to_string(),
        };

        if registry.get(default_id).is_none() {
            warn!(
                provider = default_id,
                "default search provider is not registered; explicit provider selection required"
            );
        }

        registry
    }

    pub fn get(&self, id: &str) -> Option<&Arc<dyn SearchProvider>> {
        self.providers.iter().find(|provider| provider.id() == id)
    }

    /// Pick the provider for a request: the explicitly requested id, or the
    /// configured default. Unknown and unconfigured providers are rejected.
    pub fn resolve(&self, requested: Option<&str>) -> Result<Arc<dyn SearchProvider>, AppError> {
        let id = requested.unwrap_or(&self.default_id);
        let provider = self.get(id).cloned().ok_or_else(|| {
            AppError::bad_request(
                "unknown_provider",
                format!(
                    "unknown search provider '{id}'; available: {}",
                    self.ids().join(", ")
                ),
            )
        })?;

        if !provider.configured() {
            return Err(AppError::bad_request(
                "provider_not_configured",
                format!("search provider '{id}' is not configured"),
            ));
        }

        Ok(provider)
    }

    pub fn ids(&self) -> Vec<&'static str> {
        self.providers.iter().map(|provider| provider.id()).collect()
    }

    pub fn all(&self) -> &[Arc<dyn SearchProvider>] {
        &self.providers
    }

    pub fn default_id(&self) -> &str {
        &self.default_id
    }
}
