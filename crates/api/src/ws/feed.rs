//! Bus-to-WebSocket relay.

use std::sync::Arc;

use gaswatch_events::Subscription;

use crate::ws::WsManager;

/// Relays every bus event to the connected WebSocket clients.
///
/// Device-scoped events only reach clients that have not narrowed their
/// feed to another device.
pub struct FeedRouter {
    ws_manager: Arc<WsManager>,
}

impl FeedRouter {
    pub fn new(ws_manager: Arc<WsManager>) -> Self {
        Self { ws_manager }
    }

    /// Run the relay loop. Exits when the event bus is dropped.
    pub async fn run(self, mut subscription: Subscription) {
        while let Some(event) = subscription.recv().await {
            let delivered = self.ws_manager.broadcast_event(&event).await;
            tracing::trace!(device_id = ?event.device_id(), delivered, "Relayed event");
        }
        tracing::info!("Event bus closed, feed router shutting down");
    }
}
