//! Transport endpoint variants and session plumbing
//!
//! Adapts the three physical transports (stdio, streamable HTTP, legacy SSE)
//! to one request/response contract and tracks the HTTP-backed sessions.

pub mod session;
pub mod sse;
pub mod stdio;
pub mod streamable;

use std::fmt;
use std::sync::Arc;

use thiserror::Error;

pub use session::{DuplicateSessionError, SessionTable};
pub use sse::SseEndpoint;
pub use streamable::StreamableEndpoint;

/// The two HTTP transport families with session tracking. Stdio carries the
/// one implicit session and never appears in the table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    Streamable,
    LegacySse,
}

impl TransportKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Streamable => "streamable-http",
            Self::LegacySse => "legacy-sse",
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Request arrived for a session that has already shut down.
#[derive(Debug, Error)]
#[error("session is no longer active")]
pub struct SessionClosed;

/// Table-resident endpoint handle. The explicit variant tag keeps router
/// dispatch exhaustive and the two HTTP families cross-match-proof.
#[derive(Debug, Clone)]
pub enum SessionEndpoint {
    Streamable(Arc<StreamableEndpoint>),
    LegacySse(Arc<SseEndpoint>),
}

impl SessionEndpoint {
    pub fn kind(&self) -> TransportKind {
        match self {
            Self::Streamable(_) => TransportKind::Streamable,
            Self::LegacySse(_) => TransportKind::LegacySse,
        }
    }

    pub fn session_id(&self) -> &str {
        match self {
            Self::Streamable(endpoint) => endpoint.session_id(),
            Self::LegacySse(endpoint) => endpoint.session_id(),
        }
    }

    pub fn close(&self) {
        match self {
            Self::Streamable(endpoint) => endpoint.close(),
            Self::LegacySse(endpoint) => endpoint.close(),
        }
    }

    pub fn as_streamable(&self) -> Option<&Arc<StreamableEndpoint>> {
        match self {
            Self::Streamable(endpoint) => Some(endpoint),
            Self::LegacySse(_) => None,
        }
    }

    pub fn as_legacy_sse(&self) -> Option<&Arc<SseEndpoint>> {
        match self {
            Self::LegacySse(endpoint) => Some(endpoint),
            Self::Streamable(_) => None,
        }
    }
}
