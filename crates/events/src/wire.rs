//! JSON messages exchanged over the realtime WebSocket channel.
//!
//! Every frame is a text frame of the form `{"event": <name>, "data": <payload>}`.

use gaswatch_core::alert::AlertEvent;
use gaswatch_core::device::Device;
use gaswatch_core::reading::Reading;
use gaswatch_core::settings::Settings;
use gaswatch_core::types::DeviceId;
use serde::{Deserialize, Serialize};

use crate::bus::{DomainEvent, EventPayload};

/// Server-to-client message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerMessage {
    DeviceUpdate {
        devices: Vec<Device>,
    },
    NewData {
        #[serde(rename = "deviceId")]
        device_id: DeviceId,
        data: Reading,
    },
    SettingsUpdate {
        #[serde(rename = "deviceId")]
        device_id: DeviceId,
        settings: Settings,
    },
    Alert(AlertEvent),
}

/// Client-to-server message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Only deliver device-scoped events for this device.
    Subscribe {
        #[serde(rename = "deviceId")]
        device_id: DeviceId,
    },
    /// Go back to receiving every event.
    Unsubscribe {},
}

impl ServerMessage {
    /// Decode a text frame. Unknown event names are an error.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Encode as a text frame.
    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Lift a received message back into a bus event.
    ///
    /// The feed relays origin state, so events are tagged with origin
    /// provenance except alerts, which keep the tag they were sent with.
    pub fn into_event(self) -> DomainEvent {
        match self {
            ServerMessage::DeviceUpdate { devices } => {
                DomainEvent::origin(EventPayload::DeviceRegistryChanged { devices })
            }
            ServerMessage::NewData { device_id, data } => {
                DomainEvent::origin(EventPayload::NewReading {
                    device_id,
                    reading: data,
                })
            }
            ServerMessage::SettingsUpdate {
                device_id,
                settings,
            } => DomainEvent::origin(EventPayload::SettingsChanged {
                device_id,
                settings,
            }),
            ServerMessage::Alert(alert) => DomainEvent {
                provenance: alert.provenance,
                payload: EventPayload::AlertRaised { alert },
            },
        }
    }
}

impl From<&DomainEvent> for ServerMessage {
    fn from(event: &DomainEvent) -> Self {
        match &event.payload {
            EventPayload::DeviceRegistryChanged { devices } => ServerMessage::DeviceUpdate {
                devices: devices.clone(),
            },
            EventPayload::NewReading { device_id, reading } => ServerMessage::NewData {
                device_id: device_id.clone(),
                data: reading.clone(),
            },
            EventPayload::SettingsChanged {
                device_id,
                settings,
            } => ServerMessage::SettingsUpdate {
                device_id: device_id.clone(),
                settings: settings.clone(),
            },
            EventPayload::AlertRaised { alert } => {
                ServerMessage::Alert(alert.clone().with_provenance(event.provenance))
            }
        }
    }
}

impl ClientMessage {
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    pub fn to_text(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}
