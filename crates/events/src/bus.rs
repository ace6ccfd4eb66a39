//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`DomainEvent`]s. It is
//! shared via `Arc<EventBus>` between the ingestion path, the realtime
//! feed, and the mirror writer.

use gaswatch_core::alert::AlertEvent;
use gaswatch_core::device::Device;
use gaswatch_core::provenance::Provenance;
use gaswatch_core::reading::Reading;
use gaswatch_core::settings::Settings;
use gaswatch_core::types::DeviceId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// DomainEvent
// ---------------------------------------------------------------------------

/// What changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum EventPayload {
    /// A device registered or re-registered. Carries the full device list.
    DeviceRegistryChanged { devices: Vec<Device> },

    /// A reading was stored.
    #[serde(rename_all = "camelCase")]
    NewReading { device_id: DeviceId, reading: Reading },

    /// A device's settings were written.
    #[serde(rename_all = "camelCase")]
    SettingsChanged { device_id: DeviceId, settings: Settings },

    /// A reading crossed its device threshold.
    AlertRaised { alert: AlertEvent },
}

/// A state change together with where it was first observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DomainEvent {
    pub provenance: Provenance,
    pub payload: EventPayload,
}

impl DomainEvent {
    pub fn origin(payload: EventPayload) -> Self {
        Self {
            provenance: Provenance::Origin,
            payload,
        }
    }

    pub fn external(payload: EventPayload) -> Self {
        Self {
            provenance: Provenance::ExternalStore,
            payload,
        }
    }

    /// The device this event is scoped to. Registry changes are global.
    pub fn device_id(&self) -> Option<&str> {
        match &self.payload {
            EventPayload::DeviceRegistryChanged { .. } => None,
            EventPayload::NewReading { device_id, .. } => Some(device_id),
            EventPayload::SettingsChanged { device_id, .. } => Some(device_id),
            EventPayload::AlertRaised { alert } => Some(&alert.device_id),
        }
    }

    /// Whether a subscriber narrowed to `filter` should see this event.
    pub fn is_visible_to(&self, filter: Option<&str>) -> bool {
        match (filter, self.device_id()) {
            (None, _) | (_, None) => true,
            (Some(wanted), Some(actual)) => wanted == actual,
        }
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// A live receiver on the bus.
///
/// Only events published after the subscription was created are delivered.
/// Dropping the subscription unsubscribes it.
pub struct Subscription {
    receiver: broadcast::Receiver<DomainEvent>,
    device_filter: Option<DeviceId>,
}

impl Subscription {
    /// Wait for the next event visible to this subscription.
    ///
    /// Returns `None` once the bus has been dropped. If this subscriber fell
    /// behind the channel capacity, the missed events are skipped.
    pub async fn recv(&mut self) -> Option<DomainEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => {
                    if event.is_visible_to(self.device_filter.as_deref()) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Bus subscriber lagged, events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Take the next already-published visible event without waiting.
    pub fn try_recv(&mut self) -> Option<DomainEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => {
                    if event.is_visible_to(self.device_filter.as_deref()) {
                        return Some(event);
                    }
                }
                Err(broadcast::error::TryRecvError::Lagged(n)) => {
                    tracing::warn!(skipped = n, "Bus subscriber lagged, events dropped");
                }
                Err(_) => return None,
            }
        }
    }

    pub fn device_filter(&self) -> Option<&str> {
        self.device_filter.as_deref()
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// Every subscriber independently receives every event in publish order.
/// Events for one device are published from inside the monitor's critical
/// section, so per-device order matches the order the state changed.
///
/// # Usage
///
/// ```rust
/// use gaswatch_events::bus::{DomainEvent, EventBus, EventPayload};
///
/// let bus = EventBus::default();
/// let mut sub = bus.subscribe();
///
/// bus.publish(DomainEvent::origin(EventPayload::DeviceRegistryChanged {
///     devices: Vec::new(),
/// }));
/// assert!(sub.try_recv().is_some());
/// ```
pub struct EventBus {
    sender: broadcast::Sender<DomainEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers skip ahead.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Returns the number of subscribers it was handed to. With no
    /// subscribers the event is dropped.
    pub fn publish(&self, event: DomainEvent) -> usize {
        // A SendError only means there are zero receivers.
        self.sender.send(event).unwrap_or(0)
    }

    /// Subscribe to every event published on this bus.
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            device_filter: None,
        }
    }

    /// Subscribe to events for one device plus global registry changes.
    pub fn subscribe_device(&self, device_id: impl Into<DeviceId>) -> Subscription {
        Subscription {
            receiver: self.sender.subscribe(),
            device_filter: Some(device_id.into()),
        }
    }

    /// Deregister a subscription. Equivalent to dropping it.
    pub fn unsubscribe(&self, subscription: Subscription) {
        drop(subscription);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use gaswatch_core::types::new_event_id;

    use super::*;

    fn reading_event(device: &str, value: f64) -> DomainEvent {
        DomainEvent::origin(EventPayload::NewReading {
            device_id: device.to_string(),
            reading: Reading {
                id: new_event_id(),
                device_id: device.to_string(),
                value,
                timestamp: Utc::now(),
                device_timestamp: None,
            },
        })
    }

    fn value_of(event: &DomainEvent) -> f64 {
        match &event.payload {
            EventPayload::NewReading { reading, .. } => reading.value,
            other => panic!("expected reading, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut s1 = bus.subscribe();
        let mut s2 = bus.subscribe();

        assert_eq!(bus.publish(reading_event("gas-1", 1.0)), 2);

        assert_eq!(value_of(&s1.recv().await.unwrap()), 1.0);
        assert_eq!(value_of(&s2.recv().await.unwrap()), 1.0);
    }

    #[tokio::test]
    async fn per_device_order_is_preserved() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe();

        for i in 0..10 {
            bus.publish(reading_event("gas-1", i as f64));
            bus.publish(reading_event("gas-2", 100.0 + i as f64));
        }

        let mut seen = Vec::new();
        while let Some(event) = sub.try_recv() {
            if event.device_id() == Some("gas-1") {
                seen.push(value_of(&event));
            }
        }
        assert_eq!(seen, (0..10).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn device_filter_skips_other_devices_but_keeps_registry_changes() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe_device("gas-2");

        bus.publish(reading_event("gas-1", 1.0));
        bus.publish(DomainEvent::origin(EventPayload::DeviceRegistryChanged {
            devices: Vec::new(),
        }));
        bus.publish(reading_event("gas-2", 2.0));

        let first = sub.recv().await.unwrap();
        assert!(matches!(first.payload, EventPayload::DeviceRegistryChanged { .. }));
        assert_eq!(value_of(&sub.recv().await.unwrap()), 2.0);
        assert!(sub.try_recv().is_none());
    }

    #[test]
    fn late_subscriber_misses_past_events() {
        let bus = EventBus::default();
        let _early = bus.subscribe();
        bus.publish(reading_event("gas-1", 1.0));

        let mut late = bus.subscribe();
        assert!(late.try_recv().is_none());
    }

    #[test]
    fn unsubscribe_releases_receiver() {
        let bus = EventBus::default();
        let sub = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);

        bus.unsubscribe(sub);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.publish(reading_event("gas-1", 1.0)), 0);
    }

    #[tokio::test]
    async fn recv_returns_none_after_bus_dropped() {
        let bus = EventBus::default();
        let mut sub = bus.subscribe();
        drop(bus);
        assert!(sub.recv().await.is_none());
    }

    #[tokio::test]
    async fn lagged_subscriber_skips_ahead() {
        let bus = EventBus::new(2);
        let mut sub = bus.subscribe();
        for i in 0..5 {
            bus.publish(reading_event("gas-1", i as f64));
        }

        assert_eq!(value_of(&sub.recv().await.unwrap()), 3.0);
        assert_eq!(value_of(&sub.recv().await.unwrap()), 4.0);
    }
}
