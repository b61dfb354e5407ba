//! Process-wide session tracking
//!
//! The table is the only mutable state shared across connection tasks; all
//! access goes through `lookup`/`insert`/`remove`, never the raw map.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::RwLock;

use thiserror::Error;
use tracing::debug;

use super::{SessionEndpoint, TransportKind};

/// An `insert` hit an id that is already live. Server-generated ids make this
/// an internal invariant violation rather than a client error.
#[derive(Debug, Error)]
#[error("session id '{id}' is already registered on the {kind} transport")]
pub struct DuplicateSessionError {
    pub kind: TransportKind,
    pub id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct SessionKey {
    kind: TransportKind,
    id: String,
}

impl SessionKey {
    fn new(kind: TransportKind, id: &str) -> Self {
        Self {
            kind,
            id: id.to_string(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SessionTable {
    sessions: RwLock<HashMap<SessionKey, SessionEndpoint>>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Side-effect free; returns a clone of the endpoint handle so no lock is
    /// held while the caller awaits on it.
    pub fn lookup(&self, kind: TransportKind, id: &str) -> Option<SessionEndpoint> {
        let sessions = self.sessions.read().expect("session table lock poisoned");
        sessions.get(&SessionKey::new(kind, id)).cloned()
    }

    /// Register a freshly established session. The key is derived from the
    /// endpoint itself, so an entry can never carry a mismatched variant.
    pub fn insert(&self, endpoint: SessionEndpoint) -> Result<(), DuplicateSessionError> {
        let kind = endpoint.kind();
        let key = SessionKey::new(kind, endpoint.session_id());
        let mut sessions = self.sessions.write().expect("session table lock poisoned");

        match sessions.entry(key) {
            Entry::Occupied(entry) => Err(DuplicateSessionError {
                kind,
                id: entry.key().id.clone(),
            }),
            Entry::Vacant(entry) => {
                debug!(session_id = %entry.key().id, transport = %kind, "session registered");
                entry.insert(endpoint);
                Ok(())
            }
        }
    }

    /// Idempotent: removing an absent id is a no-op. Returns whether an entry
    /// was actually removed, so close paths can log exactly once.
    pub fn remove(&self, kind: TransportKind, id: &str) -> bool {
        let mut sessions = self.sessions.write().expect("session table lock poisoned");
        sessions.remove(&SessionKey::new(kind, id)).is_some()
    }

    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .expect("session table lock poisoned")
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every remaining session, used on process shutdown. Endpoints are
    /// drained first so their `close` calls re-enter the table lock-free.
    pub fn close_all(&self) {
        let endpoints: Vec<SessionEndpoint> = {
            let mut sessions = self.sessions.write().expect("session table lock poisoned");
            sessions.drain().map(|(_, endpoint)| endpoint).collect()
        };

        for endpoint in endpoints {
            debug!(session_id = %endpoint.session_id(), "closing session on shutdown");
            endpoint.close();
        }
    }
}
