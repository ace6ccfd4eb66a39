//! Device identity and liveness.

use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{require_id, CoreError};
use crate::types::{DeviceId, Timestamp};

/// A device seen within this window is reported as online.
pub const ONLINE_WINDOW: Duration = Duration::from_secs(2 * 60);

/// A device seen within this window (but not [`ONLINE_WINDOW`]) is idle.
pub const IDLE_WINDOW: Duration = Duration::from_secs(10 * 60);

/// A registered sensor device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    pub device_id: DeviceId,
    /// Free-form hardware label reported by the firmware (e.g. `"MQ-2"`).
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_seen: Timestamp,
}

/// Liveness derived from how long ago a device was last heard from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    Idle,
    Offline,
}

impl Device {
    /// Classify liveness relative to `now`.
    ///
    /// A `last_seen` in the future (clock skew) counts as online.
    pub fn status_at(&self, now: Timestamp) -> DeviceStatus {
        let age = now
            .signed_duration_since(self.last_seen)
            .to_std()
            .unwrap_or(Duration::ZERO);

        if age < ONLINE_WINDOW {
            DeviceStatus::Online
        } else if age < IDLE_WINDOW {
            DeviceStatus::Idle
        } else {
            DeviceStatus::Offline
        }
    }
}

/// Registry of known devices, kept in registration order.
///
/// Devices are never removed for the lifetime of the registry.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: IndexMap<DeviceId, Device>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the registry from previously persisted devices.
    pub fn from_devices(devices: IndexMap<DeviceId, Device>) -> Self {
        Self { devices }
    }

    /// Insert or replace the device record for `id` and mark it seen at `now`.
    ///
    /// Re-registration keeps the device's original position in [`list`](Self::list).
    pub fn register(
        &mut self,
        id: &str,
        kind: Option<String>,
        ip_address: Option<String>,
        now: Timestamp,
    ) -> Result<Device, CoreError> {
        require_id(id, "deviceId")?;

        let device = Device {
            device_id: id.to_string(),
            kind,
            ip_address,
            last_seen: now,
        };
        self.devices.insert(id.to_string(), device.clone());
        Ok(device)
    }

    /// Update `last_seen` for a known device.
    ///
    /// Unknown ids are ignored: readings may arrive before registration.
    /// Returns whether a device was updated.
    pub fn touch(&mut self, id: &str, now: Timestamp) -> bool {
        match self.devices.get_mut(id) {
            Some(device) => {
                device.last_seen = now;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Device> {
        self.devices.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.devices.contains_key(id)
    }

    /// All devices in registration order.
    pub fn list(&self) -> Vec<Device> {
        self.devices.values().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.devices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Borrow the underlying ordered map (used for snapshots).
    pub fn as_map(&self) -> &IndexMap<DeviceId, Device> {
        &self.devices
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{Duration as ChronoDuration, TimeZone, Utc};

    use super::*;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn register_inserts_device() {
        let mut registry = DeviceRegistry::new();
        let device = registry
            .register("gas-1", Some("MQ-2".into()), Some("10.0.0.7".into()), at(0))
            .unwrap();

        assert_eq!(device.device_id, "gas-1");
        assert_eq!(device.kind.as_deref(), Some("MQ-2"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_rejects_empty_id() {
        let mut registry = DeviceRegistry::new();
        let result = registry.register("", None, None, at(0));
        assert_matches!(result, Err(CoreError::Validation(_)));
        assert!(registry.is_empty());
    }

    #[test]
    fn re_register_updates_last_seen_without_duplicating() {
        let mut registry = DeviceRegistry::new();
        registry.register("gas-1", None, None, at(0)).unwrap();
        registry.register("gas-2", None, None, at(1)).unwrap();
        registry
            .register("gas-1", None, Some("10.0.0.9".into()), at(60))
            .unwrap();

        let devices = registry.list();
        assert_eq!(devices.len(), 2);
        assert_eq!(devices[0].device_id, "gas-1");
        assert_eq!(devices[0].last_seen, at(60));
        assert_eq!(devices[0].ip_address.as_deref(), Some("10.0.0.9"));
        assert_eq!(devices[1].device_id, "gas-2");
    }

    #[test]
    fn touch_unknown_device_is_noop() {
        let mut registry = DeviceRegistry::new();
        assert!(!registry.touch("ghost", at(0)));
        assert!(registry.is_empty());
    }

    #[test]
    fn touch_known_device_updates_last_seen() {
        let mut registry = DeviceRegistry::new();
        registry.register("gas-1", None, None, at(0)).unwrap();
        assert!(registry.touch("gas-1", at(30)));
        assert_eq!(registry.get("gas-1").unwrap().last_seen, at(30));
    }

    #[test]
    fn status_follows_last_seen_age() {
        let device = Device {
            device_id: "gas-1".into(),
            kind: None,
            ip_address: None,
            last_seen: at(0),
        };

        assert_eq!(device.status_at(at(0) + ChronoDuration::seconds(90)), DeviceStatus::Online);
        assert_eq!(device.status_at(at(0) + ChronoDuration::minutes(5)), DeviceStatus::Idle);
        assert_eq!(device.status_at(at(0) + ChronoDuration::minutes(10)), DeviceStatus::Offline);
        assert_eq!(device.status_at(at(0) - ChronoDuration::minutes(1)), DeviceStatus::Online);
    }

    #[test]
    fn device_wire_format_uses_original_field_names() {
        let device = Device {
            device_id: "gas-1".into(),
            kind: Some("MQ-2".into()),
            ip_address: Some("10.0.0.7".into()),
            last_seen: Utc.timestamp_millis_opt(1_700_000_000_123).unwrap(),
        };
        let json = serde_json::to_value(&device).unwrap();

        assert_eq!(json["deviceId"], "gas-1");
        assert_eq!(json["type"], "MQ-2");
        assert_eq!(json["ipAddress"], "10.0.0.7");
        assert_eq!(json["lastSeen"], 1_700_000_000_123_i64);
    }
}
