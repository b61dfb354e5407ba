//! Legacy SSE endpoint
//!
//! One-directional push binding: the stream is established by GET `/sse` with
//! a server-assigned session id and no handshake, and requests arrive through
//! the companion POST `/messages` route. Responses only ever travel over the
//! stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::mcp::server::McpEngine;

use super::{SessionClosed, SessionTable, TransportKind};

const STREAM_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug)]
pub struct SseEndpoint {
    session_id: String,
    table: Weak<SessionTable>,
    closed: AtomicBool,
    stream_tx: Mutex<Option<mpsc::Sender<Value>>>,
    // Serializes message delivery so one session sees arrival order.
    request_gate: tokio::sync::Mutex<()>,
}

impl SseEndpoint {
    /// The server assigns the id up front; the receiver half feeds the HTTP
    /// response stream and ends when the endpoint closes.
    pub fn new(table: Weak<SessionTable>) -> (Arc<Self>, mpsc::Receiver<Value>) {
        let (stream_tx, stream_rx) = mpsc::channel(STREAM_CHANNEL_CAPACITY);
        let endpoint = Arc::new(Self {
            session_id: Uuid::new_v4().to_string(),
            table,
            closed: AtomicBool::new(false),
            stream_tx: Mutex::new(Some(stream_tx)),
            request_gate: tokio::sync::Mutex::new(()),
        });

        (endpoint, stream_rx)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Relative URI clients must post follow-up messages to, announced as the
    /// stream's first event.
    pub fn messages_path(&self) -> String {
        format!("/messages?sessionId={}", self.session_id)
    }

    /// Forward one posted message; any engine response is pushed onto the
    /// stream rather than returned to the posting request.
    pub async fn deliver(&self, engine: &McpEngine, payload: Value) -> Result<(), SessionClosed> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(SessionClosed);
        }

        let _ordered = self.request_gate.lock().await;
        debug!(session_id = %self.session_id, "delivering posted message to engine");
        let Some(response) = engine.handle_json_rpc_value(payload).await else {
            return Ok(());
        };

        let sender = self
            .stream_tx
            .lock()
            .expect("stream channel lock poisoned")
            .clone();
        let Some(sender) = sender else {
            return Err(SessionClosed);
        };
        sender.send(response).await.map_err(|_| SessionClosed)
    }

    /// Exactly-once closure, whether triggered by client disconnect or
    /// process shutdown.
    pub fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }

        self.stream_tx
            .lock()
            .expect("stream channel lock poisoned")
            .take();

        if let Some(table) = self.table.upgrade() {
            if table.remove(TransportKind::LegacySse, &self.session_id) {
                info!(
                    session_id = %self.session_id,
                    transport = %TransportKind::LegacySse,
                    "session terminated"
                );
            }
        }
    }
}
