//! Bidirectional streamable HTTP endpoint
//!
//! One instance per `mcp-session-id`. The endpoint owns the session's
//! server-push channel and drives the uninitialized/active/closed lifecycle;
//! the table entry is removed through a non-owning back-reference on close.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, Weak};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::mcp::server::McpEngine;

use super::{SessionClosed, SessionTable, TransportKind};

const STATE_UNINITIALIZED: u8 = 0;
const STATE_ACTIVE: u8 = 1;
const STATE_CLOSED: u8 = 2;

const PUSH_CHANNEL_CAPACITY: usize = 32;

#[derive(Debug)]
pub struct StreamableEndpoint {
    session_id: String,
    table: Weak<SessionTable>,
    state: AtomicU8,
    push_tx: Mutex<Option<mpsc::Sender<Value>>>,
    push_rx: Mutex<Option<mpsc::Receiver<Value>>>,
    // Serializes request handling so one session sees arrival order.
    request_gate: tokio::sync::Mutex<()>,
}

impl StreamableEndpoint {
    /// Endpoints start uninitialized with a fresh random id; the router
    /// activates and registers them only after the handshake succeeds.
    pub fn new(table: Weak<SessionTable>) -> Arc<Self> {
        let (push_tx, push_rx) = mpsc::channel(PUSH_CHANNEL_CAPACITY);
        Arc::new(Self {
            session_id: Uuid::new_v4().to_string(),
            table,
            state: AtomicU8::new(STATE_UNINITIALIZED),
            push_tx: Mutex::new(Some(push_tx)),
            push_rx: Mutex::new(Some(push_rx)),
            request_gate: tokio::sync::Mutex::new(()),
        })
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn is_active(&self) -> bool {
        self.state.load(Ordering::SeqCst) == STATE_ACTIVE
    }

    pub fn activate(&self) {
        let _ = self.state.compare_exchange(
            STATE_UNINITIALIZED,
            STATE_ACTIVE,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Forward one framed request to the engine. Used for the initialize
    /// handshake (pre-activation, before the endpoint is visible to anyone
    /// else) and for every routed request afterwards.
    pub async fn forward(
        &self,
        engine: &McpEngine,
        payload: Value,
    ) -> Result<Option<Value>, SessionClosed> {
        if self.state.load(Ordering::SeqCst) == STATE_CLOSED {
            return Err(SessionClosed);
        }

        let _ordered = self.request_gate.lock().await;
        debug!(session_id = %self.session_id, "forwarding request to engine");
        Ok(engine.handle_json_rpc_value(payload).await)
    }

    /// Hand the push channel to the session's single GET stream. A second
    /// concurrent stream request gets `None`.
    pub fn take_push_stream(&self) -> Option<mpsc::Receiver<Value>> {
        self.push_rx.lock().expect("push stream lock poisoned").take()
    }

    /// Exactly-once closure, whether triggered by DELETE, push-stream drop,
    /// or process shutdown. Dropping the sender ends an established stream.
    pub fn close(&self) {
        if self.state.swap(STATE_CLOSED, Ordering::SeqCst) == STATE_CLOSED {
            return;
        }

        self.push_tx.lock().expect("push channel lock poisoned").take();

        if let Some(table) = self.table.upgrade() {
            if table.remove(TransportKind::Streamable, &self.session_id) {
                info!(
                    session_id = %self.session_id,
                    transport = %TransportKind::Streamable,
                    "session terminated"
                );
            }
        }
    }
}
