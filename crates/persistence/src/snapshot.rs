//! Durable snapshot of the device registry and settings.
//!
//! The snapshot file holds `{devices, settings}` only; readings are never
//! persisted here. Writes go to a sibling temp file that is then renamed
//! over the target, so a crash mid-write leaves the previous snapshot intact.

use std::path::{Path, PathBuf};

use gaswatch_core::device::Device;
use gaswatch_core::settings::Settings;
use gaswatch_core::types::DeviceId;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;

use crate::error::PersistenceError;

/// On-disk snapshot schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub devices: IndexMap<DeviceId, Device>,
    #[serde(default)]
    pub settings: IndexMap<DeviceId, Settings>,
}

impl Snapshot {
    pub fn new(
        devices: IndexMap<DeviceId, Device>,
        settings: IndexMap<DeviceId, Settings>,
    ) -> Self {
        Self { devices, settings }
    }

    /// Older snapshots store settings without a `deviceId`; take it from the key.
    fn normalize(mut self) -> Self {
        for (id, settings) in self.settings.iter_mut() {
            if settings.device_id.is_empty() {
                settings.device_id = id.clone();
            }
        }
        self
    }
}

/// A snapshot file at a fixed path.
#[derive(Debug, Clone)]
pub struct SnapshotFile {
    path: PathBuf,
}

impl SnapshotFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the snapshot. `Ok(None)` if the file does not exist or is empty.
    pub async fn load(&self) -> Result<Option<Snapshot>, PersistenceError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if bytes.is_empty() {
            tracing::warn!(path = %self.path.display(), "Snapshot file is empty");
            return Ok(None);
        }
        let snapshot: Snapshot = serde_json::from_slice(&bytes)?;
        Ok(Some(snapshot.normalize()))
    }

    /// Read the snapshot, falling back to empty state on any problem.
    pub async fn load_or_default(&self) -> Snapshot {
        match self.load().await {
            Ok(Some(snapshot)) => {
                tracing::info!(
                    path = %self.path.display(),
                    devices = snapshot.devices.len(),
                    settings = snapshot.settings.len(),
                    "Loaded snapshot"
                );
                snapshot
            }
            Ok(None) => {
                tracing::info!(path = %self.path.display(), "No snapshot found, starting empty");
                Snapshot::default()
            }
            Err(e) => {
                tracing::warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Snapshot unreadable, starting empty"
                );
                Snapshot::default()
            }
        }
    }

    /// Atomically replace the snapshot file. The temp file is synced to disk
    /// before the rename so the target is never left empty.
    pub async fn save(&self, snapshot: &Snapshot) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let bytes = serde_json::to_vec_pretty(snapshot)?;
        let tmp_path = self.tmp_path();
        let mut file = tokio::fs::File::create(&tmp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);
        tokio::fs::rename(&tmp_path, &self.path).await?;
        Ok(())
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::{TimeZone, Utc};

    use super::*;

    fn sample() -> Snapshot {
        let seen = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();
        let mut devices = IndexMap::new();
        devices.insert(
            "gas-1".to_string(),
            Device {
                device_id: "gas-1".into(),
                kind: Some("MQ-2".into()),
                ip_address: Some("10.0.0.7".into()),
                last_seen: seen,
            },
        );
        let mut settings = IndexMap::new();
        settings.insert("gas-1".to_string(), Settings::defaults("gas-1", seen));
        Snapshot::new(devices, settings)
    }

    #[tokio::test]
    async fn save_then_load_restores_state() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("data.json"));

        file.save(&sample()).await.unwrap();
        let loaded = file.load().await.unwrap().unwrap();

        assert_eq!(loaded, sample());
        assert!(!file.tmp_path().exists());
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("absent.json"));
        assert!(file.load().await.unwrap().is_none());
        assert_eq!(file.load_or_default().await, Snapshot::default());
    }

    #[tokio::test]
    async fn corrupt_file_falls_back_to_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let file = SnapshotFile::new(&path);
        assert_matches!(file.load().await, Err(PersistenceError::Serialize(_)));
        assert_eq!(file.load_or_default().await, Snapshot::default());
    }

    #[tokio::test]
    async fn legacy_settings_take_device_id_from_key() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(
            &path,
            r#"{
                "devices": {
                    "gas-1": {
                        "deviceId": "gas-1",
                        "type": "MQ-2",
                        "ipAddress": "10.0.0.7",
                        "lastSeen": 1700000000000
                    }
                },
                "settings": {"gas-1": {"threshold": 650, "buzzerEnabled": false}}
            }"#,
        )
        .unwrap();

        let loaded = SnapshotFile::new(&path).load().await.unwrap().unwrap();
        let settings = &loaded.settings["gas-1"];
        assert_eq!(settings.device_id, "gas-1");
        assert_eq!(settings.threshold, 650.0);
        assert!(!settings.actuator_enabled);
    }

    #[tokio::test]
    async fn save_replaces_stale_temp_file_and_previous_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("data.json"));
        file.save(&Snapshot::default()).await.unwrap();
        std::fs::write(file.tmp_path(), b"").unwrap();

        file.save(&sample()).await.unwrap();

        assert!(!file.tmp_path().exists());
        let on_disk = std::fs::read(file.path()).unwrap();
        assert!(!on_disk.is_empty());
        assert_eq!(file.load().await.unwrap(), Some(sample()));
    }

    #[tokio::test]
    async fn empty_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        std::fs::write(&path, b"").unwrap();

        let file = SnapshotFile::new(&path);
        assert!(file.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn save_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("state").join("data.json"));
        file.save(&Snapshot::default()).await.unwrap();
        assert!(file.path().exists());
    }
}
