use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use gaswatch_events::{ClientMessage, ServerMessage};

use crate::state::AppState;

/// HTTP handler that upgrades the connection to WebSocket.
///
/// After the upgrade the connection is registered with `WsManager`, sent
/// the current device list, and managed by a sender task plus the receive
/// loop.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Manage a single WebSocket connection after upgrade.
///
/// Splits the socket into a sink (outbound) and stream (inbound), then:
///   1. Registers the connection with `WsManager`.
///   2. Queues a `deviceUpdate` frame with the current registry.
///   3. Spawns a sender task that forwards messages from the manager channel.
///   4. Processes inbound `subscribe` / `unsubscribe` messages.
///   5. Cleans up on disconnect.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let ws_manager = Arc::clone(&state.ws_manager);
    let conn_id = uuid::Uuid::new_v4().to_string();
    tracing::info!(conn_id = %conn_id, "WebSocket connected");

    let mut rx = ws_manager.add(conn_id.clone()).await;

    let greeting = ServerMessage::DeviceUpdate {
        devices: state.monitor.devices().await,
    };
    // Open sockets must not hold the bus open past shutdown.
    drop(state);

    match greeting.to_text() {
        Ok(text) => {
            ws_manager.send_to(&conn_id, Message::Text(text.into())).await;
        }
        Err(e) => tracing::error!(conn_id = %conn_id, error = %e, "Failed to encode device list"),
    }

    let (mut sink, mut stream) = socket.split();

    // Sender task: forward channel messages to the WebSocket sink.
    let sender_conn_id = conn_id.clone();
    let send_task = tokio::spawn(async move {
        while let Some(msg) = rx.recv().await {
            if sink.send(msg).await.is_err() {
                tracing::debug!(conn_id = %sender_conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Receiver loop: process inbound messages.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(Message::Pong(_)) => {
                tracing::trace!(conn_id = %conn_id, "Pong received");
            }
            Ok(Message::Text(text)) => match ClientMessage::parse(text.as_str()) {
                Ok(ClientMessage::Subscribe { device_id }) => {
                    tracing::debug!(
                        conn_id = %conn_id,
                        device_id = %device_id,
                        "Client subscribed to device"
                    );
                    ws_manager.set_device_filter(&conn_id, Some(device_id)).await;
                }
                Ok(ClientMessage::Unsubscribe {}) => {
                    tracing::debug!(conn_id = %conn_id, "Client unsubscribed from device");
                    ws_manager.set_device_filter(&conn_id, None).await;
                }
                Err(e) => {
                    tracing::debug!(
                        conn_id = %conn_id,
                        error = %e,
                        "Ignoring unrecognised client message"
                    );
                }
            },
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(conn_id = %conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    // Clean up: remove connection and abort sender task.
    ws_manager.remove(&conn_id).await;
    send_task.abort();
    tracing::info!(conn_id = %conn_id, "WebSocket disconnected");
}
