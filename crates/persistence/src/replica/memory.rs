use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use gaswatch_core::alert::AlertEvent;
use gaswatch_core::device::Device;
use gaswatch_core::provenance::Provenance;
use gaswatch_core::reading::Reading;
use gaswatch_core::settings::Settings;
use gaswatch_core::types::{DeviceId, EventId};
use indexmap::IndexMap;
use tokio::sync::RwLock;

use super::ReplicaStore;
use crate::error::ReplicaError;

/// Successful write calls, per record kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriteCounts {
    pub devices: usize,
    pub settings: usize,
    pub readings: usize,
    pub alerts: usize,
}

impl WriteCounts {
    pub fn total(&self) -> usize {
        self.devices + self.settings + self.readings + self.alerts
    }
}

#[derive(Debug, Default)]
struct Records {
    devices: IndexMap<DeviceId, Device>,
    settings: IndexMap<DeviceId, Settings>,
    readings: HashMap<DeviceId, IndexMap<EventId, Reading>>,
    alerts: HashMap<DeviceId, IndexMap<EventId, AlertEvent>>,
    writes: WriteCounts,
}

/// Process-local replica store.
///
/// Used when no external store is configured and by tests. Records are kept
/// in first-write order per device. Every successful write is counted, and
/// the store can be switched offline to exercise failure paths.
#[derive(Debug, Default)]
pub struct InMemoryReplicaStore {
    records: RwLock<Records>,
    offline: AtomicBool,
}

impl InMemoryReplicaStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// While offline every call fails with [`ReplicaError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub async fn write_counts(&self) -> WriteCounts {
        self.records.read().await.writes
    }

    pub async fn reset_write_counts(&self) {
        self.records.write().await.writes = WriteCounts::default();
    }

    /// Number of distinct alert records stored for a device.
    pub async fn alert_count(&self, device_id: &str) -> usize {
        self.records
            .read()
            .await
            .alerts
            .get(device_id)
            .map_or(0, IndexMap::len)
    }

    /// Number of distinct reading records stored for a device.
    pub async fn reading_count(&self, device_id: &str) -> usize {
        self.records
            .read()
            .await
            .readings
            .get(device_id)
            .map_or(0, IndexMap::len)
    }

    fn check_online(&self) -> Result<(), ReplicaError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(ReplicaError::Unavailable("in-memory store is offline".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ReplicaStore for InMemoryReplicaStore {
    async fn put_device(&self, device: &Device) -> Result<(), ReplicaError> {
        self.check_online()?;
        let mut records = self.records.write().await;
        records
            .devices
            .insert(device.device_id.clone(), device.clone());
        records.writes.devices += 1;
        Ok(())
    }

    async fn put_settings(&self, settings: &Settings) -> Result<(), ReplicaError> {
        self.check_online()?;
        let mut records = self.records.write().await;
        records
            .settings
            .insert(settings.device_id.clone(), settings.clone());
        records.writes.settings += 1;
        Ok(())
    }

    async fn put_reading(&self, reading: &Reading) -> Result<(), ReplicaError> {
        self.check_online()?;
        let mut records = self.records.write().await;
        records
            .readings
            .entry(reading.device_id.clone())
            .or_default()
            .insert(reading.id, reading.clone());
        records.writes.readings += 1;
        Ok(())
    }

    async fn put_alert(&self, alert: &AlertEvent) -> Result<(), ReplicaError> {
        self.check_online()?;
        let mut records = self.records.write().await;
        records
            .alerts
            .entry(alert.device_id.clone())
            .or_default()
            .insert(alert.id, alert.clone());
        records.writes.alerts += 1;
        Ok(())
    }

    async fn recent_readings(
        &self,
        device_id: &str,
        limit: usize,
    ) -> Result<Vec<Reading>, ReplicaError> {
        self.check_online()?;
        let records = self.records.read().await;
        let Some(readings) = records.readings.get(device_id) else {
            return Ok(Vec::new());
        };
        let mut recent: Vec<Reading> = readings.values().rev().take(limit).cloned().collect();
        recent.reverse();
        Ok(recent)
    }

    async fn recent_alerts(
        &self,
        device_id: &str,
        limit: usize,
    ) -> Result<Vec<AlertEvent>, ReplicaError> {
        self.check_online()?;
        let records = self.records.read().await;
        let Some(alerts) = records.alerts.get(device_id) else {
            return Ok(Vec::new());
        };
        Ok(alerts
            .values()
            .rev()
            .take(limit)
            .map(|a| a.clone().with_provenance(Provenance::ExternalStore))
            .collect())
    }

    async fn get_settings(&self, device_id: &str) -> Result<Option<Settings>, ReplicaError> {
        self.check_online()?;
        Ok(self.records.read().await.settings.get(device_id).cloned())
    }

    async fn list_devices(&self) -> Result<Vec<Device>, ReplicaError> {
        self.check_online()?;
        Ok(self.records.read().await.devices.values().cloned().collect())
    }
}
