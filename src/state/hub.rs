//! Connection registry: the single source of truth for which user has a live
//! WebSocket and the only door other components push realtime events through.

use std::collections::HashMap;

use axum::extract::ws::Message;
use serde::Serialize;
use tokio::sync::{RwLock, mpsc};
use tracing::warn;
use uuid::Uuid;

/// Outbound frames buffered per connection before sends start failing.
///
/// The bound is what keeps a slow or wedged receiver from stalling senders:
/// once the buffer is full the send fails and the payload counts as
/// undelivered.
pub const OUTBOUND_BUFFER: usize = 64;

/// Write handle for one live connection, registered in the [`Hub`].
#[derive(Clone)]
pub struct ClientConnection {
    conn_id: Uuid,
    user_id: String,
    tx: mpsc::Sender<Message>,
}

impl ClientConnection {
    /// Wrap an outbound channel as a registrable connection handle.
    pub fn new(user_id: String, tx: mpsc::Sender<Message>) -> Self {
        Self {
            conn_id: Uuid::new_v4(),
            user_id,
            tx,
        }
    }

    /// Identifier distinguishing this handle from later ones for the same user.
    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    /// Identity the connection is registered under.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Push a Close frame at the transport, best-effort.
    pub fn close(&self) {
        let _ = self.tx.try_send(Message::Close(None));
    }
}

/// Registry of live connections keyed by user identity.
///
/// Registration and unregistration take the write lock; lookups and
/// notification sends take the read lock, so fan-out never serializes behind
/// admission churn. One slot per identity: a new connection replaces the
/// previous one.
#[derive(Default)]
pub struct Hub {
    clients: RwLock<HashMap<String, ClientConnection>>,
}

impl Hub {
    /// Create an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Install `connection` as the current handle for its user, returning the
    /// replaced handle so the caller can close the orphaned transport.
    pub async fn register(&self, connection: ClientConnection) -> Option<ClientConnection> {
        let mut clients = self.clients.write().await;
        clients.insert(connection.user_id.clone(), connection)
    }

    /// Remove the mapping only if `conn_id` still identifies the stored handle.
    ///
    /// A connection that closes late must not evict the newer connection that
    /// already replaced it. Returns whether a mapping was removed.
    pub async fn unregister(&self, user_id: &str, conn_id: Uuid) -> bool {
        let mut clients = self.clients.write().await;
        match clients.get(user_id) {
            Some(current) if current.conn_id == conn_id => {
                clients.remove(user_id);
                true
            }
            _ => false,
        }
    }

    /// Current handle for `user_id`, if one is registered.
    pub async fn lookup(&self, user_id: &str) -> Option<ClientConnection> {
        let clients = self.clients.read().await;
        clients.get(user_id).cloned()
    }

    /// Serialize `payload` as JSON and write it to the user's connection.
    ///
    /// Returns whether the frame was handed to the connection's writer. Absent
    /// connection, full buffer, and closed channel all count as "not
    /// delivered" and are never escalated to the caller; a broken connection
    /// unregisters itself when its read loop fails.
    pub async fn notify<T: Serialize>(&self, user_id: &str, payload: &T) -> bool {
        let tx = {
            let clients = self.clients.read().await;
            match clients.get(user_id) {
                Some(connection) => connection.tx.clone(),
                None => return false,
            }
        };

        let frame = match serde_json::to_string(payload) {
            Ok(json) => Message::Text(json.into()),
            Err(err) => {
                warn!(user = %user_id, error = %err, "failed to serialize notification");
                return false;
            }
        };

        match tx.try_send(frame) {
            Ok(()) => true,
            Err(err) => {
                warn!(user = %user_id, error = %err, "notification send failed; connection considered stale");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};

    fn connection(user: &str) -> (ClientConnection, mpsc::Receiver<Message>) {
        let (tx, rx) = mpsc::channel(OUTBOUND_BUFFER);
        (ClientConnection::new(user.into(), tx), rx)
    }

    #[tokio::test]
    async fn register_then_lookup_returns_the_handle() {
        let hub = Hub::new();
        let (conn, _rx) = connection("alice");
        let conn_id = conn.conn_id();

        assert!(hub.register(conn).await.is_none());
        let found = hub.lookup("alice").await.expect("registered");
        assert_eq!(found.conn_id(), conn_id);
        assert!(hub.lookup("bob").await.is_none());
    }

    #[tokio::test]
    async fn new_connection_replaces_the_previous_one() {
        let hub = Hub::new();
        let (old, _old_rx) = connection("alice");
        let old_id = old.conn_id();
        let (new, _new_rx) = connection("alice");
        let new_id = new.conn_id();

        hub.register(old).await;
        let replaced = hub.register(new).await.expect("old handle returned");
        assert_eq!(replaced.conn_id(), old_id);
        assert_eq!(hub.lookup("alice").await.unwrap().conn_id(), new_id);
    }

    #[tokio::test]
    async fn stale_unregister_does_not_evict_newer_connection() {
        let hub = Hub::new();
        let (old, _old_rx) = connection("alice");
        let old_id = old.conn_id();
        let (new, _new_rx) = connection("alice");
        let new_id = new.conn_id();

        hub.register(old).await;
        hub.register(new).await;

        assert!(!hub.unregister("alice", old_id).await);
        assert!(hub.lookup("alice").await.is_some());

        assert!(hub.unregister("alice", new_id).await);
        assert!(hub.lookup("alice").await.is_none());
    }

    #[tokio::test]
    async fn notify_writes_json_to_the_registered_connection() {
        let hub = Hub::new();
        let (conn, mut rx) = connection("alice");
        hub.register(conn).await;

        assert!(hub.notify("alice", &json!({ "type": "ping" })).await);
        let frame = rx.recv().await.expect("frame queued");
        let Message::Text(text) = frame else {
            panic!("expected a text frame");
        };
        let value: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["type"], "ping");
    }

    #[tokio::test]
    async fn notify_reports_undelivered_for_absent_or_full_connections() {
        let hub = Hub::new();
        assert!(!hub.notify("nobody", &json!({})).await);

        let (tx, _rx) = mpsc::channel(1);
        let conn = ClientConnection::new("alice".into(), tx);
        hub.register(conn).await;
        assert!(hub.notify("alice", &json!({ "n": 1 })).await);
        // Buffer of one is now full; the next send fails without blocking.
        assert!(!hub.notify("alice", &json!({ "n": 2 })).await);
    }
}
