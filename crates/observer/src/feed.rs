//! Live feed client for the origin's realtime channel.
//!
//! [`FeedClient`] connects to `/ws`, narrows the feed to one device and
//! yields decoded [`ServerMessage`]s. When the connection drops, call
//! [`reconnect_loop`] to retry with exponential backoff until it succeeds
//! or the [`CancellationToken`] is triggered.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use gaswatch_core::types::DeviceId;
use gaswatch_events::{ClientMessage, ServerMessage};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

use crate::error::ObserverError;

type FeedStream = WebSocketStream<MaybeTlsStream<tokio::net::TcpStream>>;

/// Connection settings for the live feed of one device.
pub struct FeedClient {
    url: String,
    device_id: DeviceId,
}

/// A live, device-scoped feed connection.
pub struct FeedConnection {
    stream: FeedStream,
}

impl FeedClient {
    /// * `url`       - realtime endpoint, e.g. `ws://host:5000/ws`.
    /// * `device_id` - device whose events should be delivered.
    pub fn new(url: impl Into<String>, device_id: impl Into<DeviceId>) -> Self {
        Self {
            url: url.into(),
            device_id: device_id.into(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connect and send the `subscribe` frame for this client's device.
    pub async fn connect(&self) -> Result<FeedConnection, ObserverError> {
        let (mut stream, _response) = connect_async(self.url.as_str()).await?;

        let subscribe = ClientMessage::Subscribe {
            device_id: self.device_id.clone(),
        }
        .to_text()?;
        stream.send(Message::Text(subscribe.into())).await?;

        tracing::info!(url = %self.url, device_id = %self.device_id, "Connected to live feed");
        Ok(FeedConnection { stream })
    }
}

impl FeedConnection {
    /// Next decodable message, or `None` once the connection is gone.
    ///
    /// Control frames and frames that fail to decode are skipped.
    pub async fn next_message(&mut self) -> Option<ServerMessage> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => match ServerMessage::parse(text.as_str()) {
                    Ok(message) => return Some(message),
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring undecodable feed frame");
                    }
                },
                Ok(Message::Close(frame)) => {
                    tracing::info!(?frame, "Origin closed live feed");
                    return None;
                }
                Ok(_) => {
                    // Ping / Pong are answered by tungstenite; binary is unused.
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Live feed receive error");
                    return None;
                }
            }
        }
    }

    /// Close the connection politely.
    pub async fn close(mut self) {
        let _ = self.stream.close(None).await;
    }
}

/// Tunable parameters for the exponential-backoff strategy.
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt.
    pub initial_delay: Duration,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
    /// Factor by which the delay grows after each failure.
    pub multiplier: f64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

/// Calculate the next backoff delay, clamped to [`ReconnectConfig::max_delay`].
pub fn next_delay(current: Duration, config: &ReconnectConfig) -> Duration {
    let next_ms = (current.as_millis() as f64 * config.multiplier) as u64;
    Duration::from_millis(next_ms).min(config.max_delay)
}

/// Connect with exponential backoff.
///
/// Returns `None` if `cancel` is triggered before a connection succeeds.
pub async fn reconnect_loop(
    client: &FeedClient,
    config: &ReconnectConfig,
    cancel: &CancellationToken,
) -> Option<FeedConnection> {
    let mut delay = config.initial_delay;
    let mut attempt = 0u32;

    loop {
        attempt += 1;

        tokio::select! {
            _ = cancel.cancelled() => return None,
            result = client.connect() => {
                match result {
                    Ok(conn) => {
                        if attempt > 1 {
                            tracing::info!(
                                url = %client.url(),
                                attempt,
                                "Reconnected to live feed"
                            );
                        }
                        return Some(conn);
                    }
                    Err(e) => {
                        tracing::warn!(
                            url = %client.url(),
                            error = %e,
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "Live feed connection failed",
                        );
                    }
                }
            }
        }

        // Wait before the next attempt, respecting cancellation.
        tokio::select! {
            _ = cancel.cancelled() => return None,
            _ = tokio::time::sleep(delay) => {}
        }

        delay = next_delay(delay, config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_delay_doubles() {
        let config = ReconnectConfig::default();
        assert_eq!(
            next_delay(Duration::from_secs(1), &config),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn next_delay_clamps_at_max() {
        let config = ReconnectConfig {
            max_delay: Duration::from_secs(10),
            ..Default::default()
        };
        assert_eq!(
            next_delay(Duration::from_secs(8), &config),
            Duration::from_secs(10)
        );
    }

    #[tokio::test]
    async fn cancelled_reconnect_returns_none() {
        let client = FeedClient::new("ws://127.0.0.1:9/ws", "gas-1");
        let cancel = CancellationToken::new();
        cancel.cancel();

        let conn = reconnect_loop(&client, &ReconnectConfig::default(), &cancel).await;
        assert!(conn.is_none());
    }
}
