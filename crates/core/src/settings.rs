//! Per-device alert configuration.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{require_id, CoreError};
use crate::types::{DeviceId, Timestamp};

/// Gas level above which a reading raises an alert, unless configured.
pub const DEFAULT_THRESHOLD: f64 = 800.0;

/// Whether the on-device buzzer/LED fires on alert, unless configured.
pub const DEFAULT_ACTUATOR_ENABLED: bool = true;

/// Alert configuration for one device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    /// Filled from the map key when loading older snapshots that lack it.
    #[serde(default)]
    pub device_id: DeviceId,
    pub threshold: f64,
    #[serde(rename = "buzzerEnabled")]
    pub actuator_enabled: bool,
    #[serde(with = "chrono::serde::ts_milliseconds", default = "epoch")]
    pub updated_at: Timestamp,
}

fn epoch() -> Timestamp {
    chrono::DateTime::UNIX_EPOCH
}

/// A partial settings update. Absent fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f64>,
    #[serde(
        rename = "buzzerEnabled",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub actuator_enabled: Option<bool>,
}

impl Settings {
    pub fn defaults(device_id: &str, now: Timestamp) -> Self {
        Self {
            device_id: device_id.to_string(),
            threshold: DEFAULT_THRESHOLD,
            actuator_enabled: DEFAULT_ACTUATOR_ENABLED,
            updated_at: now,
        }
    }

    /// Merge the supplied fields of `patch` into this record.
    pub fn apply(&mut self, patch: &SettingsPatch, now: Timestamp) {
        if let Some(threshold) = patch.threshold {
            self.threshold = threshold;
        }
        if let Some(enabled) = patch.actuator_enabled {
            self.actuator_enabled = enabled;
        }
        self.updated_at = now;
    }

    /// Resolve two copies of the same device's settings, keeping the most
    /// recently written one. Ties keep `self`.
    ///
    /// Every write stores the full record, so choosing the newer record
    /// gives the same result as choosing each field from its latest write.
    pub fn last_writer_wins(self, other: Settings) -> Settings {
        if other.updated_at > self.updated_at {
            other
        } else {
            self
        }
    }
}

/// Settings for every device that has registered or been configured.
#[derive(Debug, Clone, Default)]
pub struct SettingsStore {
    settings: IndexMap<DeviceId, Settings>,
}

impl SettingsStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_settings(settings: IndexMap<DeviceId, Settings>) -> Self {
        Self { settings }
    }

    pub fn get(&self, id: &str) -> Result<&Settings, CoreError> {
        self.settings
            .get(id)
            .ok_or_else(|| CoreError::device_not_found("Settings", id))
    }

    pub fn find(&self, id: &str) -> Option<&Settings> {
        self.settings.get(id)
    }

    /// Create default settings for `id` if none exist; existing settings are kept.
    pub fn ensure(&mut self, id: &str, now: Timestamp) -> Settings {
        self.settings
            .entry(id.to_string())
            .or_insert_with(|| Settings::defaults(id, now))
            .clone()
    }

    /// Merge `patch` into the existing (or default) record and return the result.
    pub fn upsert(
        &mut self,
        id: &str,
        patch: &SettingsPatch,
        now: Timestamp,
    ) -> Result<Settings, CoreError> {
        require_id(id, "deviceId")?;

        let record = self
            .settings
            .entry(id.to_string())
            .or_insert_with(|| Settings::defaults(id, now));
        record.apply(patch, now);
        Ok(record.clone())
    }

    pub fn len(&self) -> usize {
        self.settings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.settings.is_empty()
    }

    pub fn as_map(&self) -> &IndexMap<DeviceId, Settings> {
        &self.settings
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};

    use super::*;

    fn at(secs: i64) -> Timestamp {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    #[test]
    fn get_unknown_is_not_found() {
        let store = SettingsStore::new();
        assert_matches!(store.get("gas-1"), Err(CoreError::NotFound { .. }));
    }

    #[test]
    fn ensure_creates_defaults_once() {
        let mut store = SettingsStore::new();
        let created = store.ensure("gas-1", at(0));
        assert_eq!(created.threshold, DEFAULT_THRESHOLD);
        assert!(created.actuator_enabled);

        store
            .upsert(
                "gas-1",
                &SettingsPatch { threshold: Some(450.0), actuator_enabled: None },
                at(1),
            )
            .unwrap();
        let kept = store.ensure("gas-1", at(2));
        assert_eq!(kept.threshold, 450.0);
    }

    #[test]
    fn upsert_threshold_only_keeps_actuator_flag() {
        let mut store = SettingsStore::new();
        store
            .upsert(
                "gas-1",
                &SettingsPatch { threshold: None, actuator_enabled: Some(false) },
                at(0),
            )
            .unwrap();

        let updated = store
            .upsert(
                "gas-1",
                &SettingsPatch { threshold: Some(500.0), actuator_enabled: None },
                at(1),
            )
            .unwrap();

        assert_eq!(updated.threshold, 500.0);
        assert!(!updated.actuator_enabled);
        assert_eq!(updated.updated_at, at(1));
    }

    #[test]
    fn upsert_on_absent_record_starts_from_defaults() {
        let mut store = SettingsStore::new();
        let created = store
            .upsert(
                "gas-9",
                &SettingsPatch { threshold: Some(300.0), actuator_enabled: None },
                at(0),
            )
            .unwrap();
        assert_eq!(created.threshold, 300.0);
        assert_eq!(created.actuator_enabled, DEFAULT_ACTUATOR_ENABLED);
        assert_eq!(created.device_id, "gas-9");
    }

    #[test]
    fn last_writer_wins_prefers_newer_record() {
        let older = Settings { threshold: 100.0, ..Settings::defaults("gas-1", at(0)) };
        let newer = Settings { threshold: 200.0, ..Settings::defaults("gas-1", at(5)) };

        assert_eq!(older.clone().last_writer_wins(newer.clone()).threshold, 200.0);
        assert_eq!(newer.last_writer_wins(older).threshold, 200.0);
    }

    #[test]
    fn patch_deserializes_original_field_names() {
        let patch: SettingsPatch = serde_json::from_str(r#"{"buzzerEnabled": false}"#).unwrap();
        assert_eq!(patch.actuator_enabled, Some(false));
        assert_eq!(patch.threshold, None);
    }

    #[test]
    fn legacy_record_without_id_or_stamp_deserializes() {
        let settings: Settings =
            serde_json::from_str(r#"{"threshold": 800, "buzzerEnabled": true}"#).unwrap();
        assert_eq!(settings.device_id, "");
        assert_eq!(settings.updated_at.timestamp(), 0);
    }
}
