//! External replicated store.
//!
//! Layout (one JSON document per path):
//!
//! | Path | Record | Key |
//! |---|---|---|
//! | `devices/{deviceId}` | [`Device`] | device id |
//! | `settings/{deviceId}` | [`Settings`] | device id |
//! | `sensorData/{deviceId}/{readingId}` | [`Reading`] | reading id |
//! | `alerts/{deviceId}/{alertId}` | [`AlertEvent`] | id of the reading that raised it |
//!
//! Every write is a keyed put, so writing the same record twice leaves a
//! single copy.

mod memory;
mod rest;

use async_trait::async_trait;
use gaswatch_core::alert::AlertEvent;
use gaswatch_core::device::Device;
use gaswatch_core::reading::Reading;
use gaswatch_core::settings::Settings;

use crate::error::ReplicaError;

pub use memory::{InMemoryReplicaStore, WriteCounts};
pub use rest::RestReplicaStore;

/// Readings loaded per device when an observer selects it.
pub const HISTORY_READINGS_LIMIT: usize = 1000;

/// Alerts loaded per device when an observer selects it.
pub const HISTORY_ALERTS_LIMIT: usize = 20;

#[async_trait]
pub trait ReplicaStore: Send + Sync {
    async fn put_device(&self, device: &Device) -> Result<(), ReplicaError>;

    async fn put_settings(&self, settings: &Settings) -> Result<(), ReplicaError>;

    async fn put_reading(&self, reading: &Reading) -> Result<(), ReplicaError>;

    async fn put_alert(&self, alert: &AlertEvent) -> Result<(), ReplicaError>;

    /// The most recent `limit` readings for a device, oldest first.
    async fn recent_readings(
        &self,
        device_id: &str,
        limit: usize,
    ) -> Result<Vec<Reading>, ReplicaError>;

    /// The most recent `limit` alerts for a device, newest first.
    ///
    /// Returned alerts carry `ExternalStore` provenance.
    async fn recent_alerts(
        &self,
        device_id: &str,
        limit: usize,
    ) -> Result<Vec<AlertEvent>, ReplicaError>;

    async fn get_settings(&self, device_id: &str) -> Result<Option<Settings>, ReplicaError>;

    async fn list_devices(&self) -> Result<Vec<Device>, ReplicaError>;
}
