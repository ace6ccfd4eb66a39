use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::ws::Message;
use gaswatch_core::types::DeviceId;
use gaswatch_events::{DomainEvent, ServerMessage};
use tokio::sync::{mpsc, RwLock};

/// Channel sender half for pushing messages to a WebSocket connection.
pub type WsSender = mpsc::UnboundedSender<Message>;

/// Metadata for a single WebSocket connection.
pub struct WsConnection {
    /// Channel sender for outbound messages to this connection.
    pub sender: WsSender,
    /// Device the client subscribed to, if it narrowed its feed.
    pub device_filter: Option<DeviceId>,
}

/// Manages all active WebSocket connections.
///
/// Thread-safe via interior `RwLock`; designed to be wrapped in `Arc` and
/// shared across the application.
pub struct WsManager {
    connections: RwLock<HashMap<String, WsConnection>>,
}

impl WsManager {
    /// Create a new, empty connection manager.
    pub fn new() -> Self {
        Self {
            connections: RwLock::new(HashMap::new()),
        }
    }

    /// Register a new connection.
    ///
    /// Returns the receiver half of the message channel so the caller can
    /// forward messages to the WebSocket sink.
    pub async fn add(&self, conn_id: String) -> mpsc::UnboundedReceiver<Message> {
        let (tx, rx) = mpsc::unbounded_channel();
        let conn = WsConnection {
            sender: tx,
            device_filter: None,
        };
        self.connections.write().await.insert(conn_id, conn);
        rx
    }

    /// Remove a connection by its ID.
    pub async fn remove(&self, conn_id: &str) {
        self.connections.write().await.remove(conn_id);
    }

    /// Narrow (or with `None`, widen) the events a connection receives.
    ///
    /// Returns `false` if the connection is unknown.
    pub async fn set_device_filter(&self, conn_id: &str, device_id: Option<DeviceId>) -> bool {
        match self.connections.write().await.get_mut(conn_id) {
            Some(conn) => {
                conn.device_filter = device_id;
                true
            }
            None => false,
        }
    }

    /// Send a message to a single connection.
    pub async fn send_to(&self, conn_id: &str, message: Message) -> bool {
        match self.connections.read().await.get(conn_id) {
            Some(conn) => conn.sender.send(message).is_ok(),
            None => false,
        }
    }

    /// Encode a bus event once and send it to every connection whose device
    /// filter admits it.
    ///
    /// Returns the number of connections the frame was queued for.
    pub async fn broadcast_event(&self, event: &DomainEvent) -> usize {
        let text = match ServerMessage::from(event).to_text() {
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "Failed to encode realtime frame");
                return 0;
            }
        };
        let message = Message::Text(text.into());

        let conns = self.connections.read().await;
        let mut count = 0;
        for conn in conns.values() {
            if event.is_visible_to(conn.device_filter.as_deref())
                && conn.sender.send(message.clone()).is_ok()
            {
                count += 1;
            }
        }
        count
    }

    /// Return the current number of active connections.
    pub async fn connection_count(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Send a Close frame to every connection, then clear the map.
    ///
    /// Used during graceful shutdown to notify all clients before the
    /// server exits.
    pub async fn shutdown_all(&self) {
        let mut conns = self.connections.write().await;
        let count = conns.len();
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Close(None));
        }
        conns.clear();
        tracing::info!(count, "Closed all WebSocket connections");
    }

    /// Send a Ping frame to every connected client.
    pub async fn ping_all(&self) {
        let conns = self.connections.read().await;
        for conn in conns.values() {
            let _ = conn.sender.send(Message::Ping(Bytes::new()));
        }
    }
}

impl Default for WsManager {
    fn default() -> Self {
        Self::new()
    }
}
