use std::{env, net::SocketAddr};

use axum::http::HeaderValue;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    Both,
    Http,
    Stdio,
}

impl TransportMode {
    pub fn http_enabled(self) -> bool {
        matches!(self, Self::Both | Self::Http)
    }

    pub fn stdio_enabled(self) -> bool {
        matches!(self, Self::Both | Self::Stdio)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Both => "both",
            Self::Http => "http",
            Self::Stdio => "stdio",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub bind_port: u16,
    pub transport_mode: TransportMode,
    pub enable_cors: bool,
    pub cors_origin: Option<HeaderValue>,
    pub default_provider: String,
    pub searxng_url: Option<Url>,
    pub brave_api_key: Option<String>,
    pub tavily_api_key: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("BIND_PORT must be a valid u16")]
    InvalidPort,
    #[error("MCP_TRANSPORT must be one of: both, http, stdio")]
    InvalidTransport,
    #[error("ENABLE_CORS must be a boolean (true/false)")]
    InvalidCorsToggle,
    #[error("CORS_ORIGIN must be a valid header value")]
    InvalidCorsOrigin,
    #[error("SEARXNG_URL must be a valid URL")]
    InvalidSearxngUrl,
    #[error("invalid bind address or port")]
    InvalidSocket,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let bind_addr = env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
        let bind_port = env::var("BIND_PORT")
            .ok()
            .map(|value| value.parse::<u16>().map_err(|_| ConfigError::InvalidPort))
            .transpose()?
            .unwrap_or(3000);

        let transport_mode = env::var("MCP_TRANSPORT")
            .ok()
            .map(|value| match value.trim().to_ascii_lowercase().as_str() {
                "both" => Ok(TransportMode::Both),
                "http" => Ok(TransportMode::Http),
                "stdio" => Ok(TransportMode::Stdio),
                _ => Err(ConfigError::InvalidTransport),
            })
            .transpose()?
            .unwrap_or(TransportMode::Both);

        let enable_cors = env::var("ENABLE_CORS")
            .ok()
            .map(|value| match value.trim().to_ascii_lowercase().as_str() {
                "1" | "true" | "yes" => Ok(true),
                "0" | "false" | "no" => Ok(false),
                _ => Err(ConfigError::InvalidCorsToggle),
            })
            .transpose()?
            .unwrap_or(false);

        let cors_origin = env::var("CORS_ORIGIN")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(|value| {
                value
                    .parse::<HeaderValue>()
                    .map_err(|_| ConfigError::InvalidCorsOrigin)
            })
            .transpose()?;

        let default_provider = env::var("SEARCH_PROVIDER")
            .ok()
            .map(|value| value.trim().to_ascii_lowercase())
            .filter(|value| !value.is_empty())
            .unwrap_or_else(|| "duckduckgo".to_string());

        let searxng_url = env::var("SEARXNG_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(|value| {
                value
                    .parse::<Url>()
                    .map_err(|_| ConfigError::InvalidSearxngUrl)
            })
            .transpose()?;

        let brave_api_key = non_empty_var("BRAVE_API_KEY");
        let tavily_api_key = non_empty_var("TAVILY_API_KEY");

        let config = Self {
            bind_addr,
            bind_port,
            transport_mode,
            enable_cors,
            cors_origin,
            default_provider,
            searxng_url,
            brave_api_key,
            tavily_api_key,
        };

        if config.transport_mode.http_enabled() {
            let _ = config.bind_socket()?;
        }
        Ok(config)
    }

    pub fn bind_socket(&self) -> Result<SocketAddr, ConfigError> {
        format!("{}:{}", self.bind_addr, self.bind_port)
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::InvalidSocket)
    }
}

fn non_empty_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
