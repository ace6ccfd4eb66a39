//! The origin service's single source of truth.
//!
//! All mutations run under one async mutex, and the resulting events are
//! published before the lock is released. Two readings for the same device
//! therefore reach every subscriber in the order they were appended.

use std::sync::Arc;

use chrono::Utc;
use gaswatch_core::alert::{self, AlertEvent};
use gaswatch_core::device::{Device, DeviceRegistry};
use gaswatch_core::error::{require_id, CoreError};
use gaswatch_core::reading::{Reading, TimeSeriesStore};
use gaswatch_core::settings::{Settings, SettingsPatch, SettingsStore};
use gaswatch_core::types::new_event_id;
use gaswatch_core::window::Since;
use gaswatch_events::{DomainEvent, EventBus, EventPayload};
use gaswatch_persistence::Snapshot;
use tokio::sync::Mutex;

/// Result of a device registration.
#[derive(Debug, Clone)]
pub struct Registration {
    pub device: Device,
    /// The device's settings after registration (existing or freshly defaulted).
    pub settings: Settings,
}

/// Result of ingesting one reading.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub reading: Reading,
    pub alert: Option<AlertEvent>,
}

struct MonitorState {
    registry: DeviceRegistry,
    settings: SettingsStore,
    series: TimeSeriesStore,
}

pub struct Monitor {
    state: Mutex<MonitorState>,
    event_bus: Arc<EventBus>,
}

impl Monitor {
    pub fn new(event_bus: Arc<EventBus>, history_capacity: usize) -> Self {
        Self::from_snapshot(Snapshot::default(), event_bus, history_capacity)
    }

    /// Seed registry and settings from a snapshot. Reading history starts empty.
    pub fn from_snapshot(
        snapshot: Snapshot,
        event_bus: Arc<EventBus>,
        history_capacity: usize,
    ) -> Self {
        Self {
            state: Mutex::new(MonitorState {
                registry: DeviceRegistry::from_devices(snapshot.devices),
                settings: SettingsStore::from_settings(snapshot.settings),
                series: TimeSeriesStore::new(history_capacity),
            }),
            event_bus,
        }
    }

    pub fn event_bus(&self) -> &Arc<EventBus> {
        &self.event_bus
    }

    /// Register (or re-register) a device and make sure it has settings.
    pub async fn register(
        &self,
        device_id: &str,
        kind: Option<String>,
        ip_address: Option<String>,
    ) -> Result<Registration, CoreError> {
        let now = Utc::now();
        let mut state = self.state.lock().await;

        let device = state.registry.register(device_id, kind, ip_address, now)?;
        let settings_created = state.settings.find(device_id).is_none();
        let settings = state.settings.ensure(device_id, now);

        tracing::info!(
            device_id = %device.device_id,
            kind = ?device.kind,
            ip_address = ?device.ip_address,
            "Device registered"
        );

        self.event_bus
            .publish(DomainEvent::origin(EventPayload::DeviceRegistryChanged {
                devices: state.registry.list(),
            }));
        if settings_created {
            self.event_bus
                .publish(DomainEvent::origin(EventPayload::SettingsChanged {
                    device_id: device_id.to_string(),
                    settings: settings.clone(),
                }));
        }

        Ok(Registration { device, settings })
    }

    /// Store a reading and evaluate it against the device's current settings.
    ///
    /// Readings from unregistered devices are stored but never evaluated,
    /// and no settings are created for them.
    pub async fn ingest(
        &self,
        device_id: &str,
        value: f64,
        device_timestamp: Option<i64>,
    ) -> Result<Ingested, CoreError> {
        require_id(device_id, "deviceId")?;
        if !value.is_finite() {
            return Err(CoreError::Validation("gasValue must be a finite number".into()));
        }

        let now = Utc::now();
        let mut state = self.state.lock().await;

        state.registry.touch(device_id, now);
        let reading = state.series.append(Reading {
            id: new_event_id(),
            device_id: device_id.to_string(),
            value,
            timestamp: now,
            device_timestamp,
        });
        let alert = state
            .settings
            .find(device_id)
            .and_then(|settings| alert::evaluate(&reading, settings));

        self.event_bus
            .publish(DomainEvent::origin(EventPayload::NewReading {
                device_id: device_id.to_string(),
                reading: reading.clone(),
            }));
        if let Some(alert) = &alert {
            tracing::warn!(
                device_id = %alert.device_id,
                value = alert.value,
                threshold = alert.threshold,
                "Gas level above threshold"
            );
            self.event_bus
                .publish(DomainEvent::origin(EventPayload::AlertRaised {
                    alert: alert.clone(),
                }));
        }

        Ok(Ingested { reading, alert })
    }

    /// All devices in registration order.
    pub async fn devices(&self) -> Vec<Device> {
        self.state.lock().await.registry.list()
    }

    pub async fn device_count(&self) -> usize {
        self.state.lock().await.registry.len()
    }

    /// Retained readings for a device at or after `since`, oldest first.
    ///
    /// A registered device that has not sent data yet has an empty history;
    /// a device that was never registered and never sent data is not found.
    pub async fn readings(&self, device_id: &str, since: Since) -> Result<Vec<Reading>, CoreError> {
        let state = self.state.lock().await;
        match state.series.query(device_id, since) {
            Some(readings) => Ok(readings),
            None if state.registry.contains(device_id) => Ok(Vec::new()),
            None => Err(CoreError::device_not_found("Device", device_id)),
        }
    }

    pub async fn settings(&self, device_id: &str) -> Result<Settings, CoreError> {
        self.state.lock().await.settings.get(device_id).cloned()
    }

    /// Merge a partial update into the device's settings, creating them if absent.
    pub async fn update_settings(
        &self,
        device_id: &str,
        patch: &SettingsPatch,
    ) -> Result<Settings, CoreError> {
        if let Some(threshold) = patch.threshold {
            if !threshold.is_finite() {
                return Err(CoreError::Validation("threshold must be a finite number".into()));
            }
        }

        let now = Utc::now();
        let mut state = self.state.lock().await;
        let settings = state.settings.upsert(device_id, patch, now)?;

        tracing::info!(
            device_id,
            threshold = settings.threshold,
            buzzer_enabled = settings.actuator_enabled,
            "Settings updated"
        );

        self.event_bus
            .publish(DomainEvent::origin(EventPayload::SettingsChanged {
                device_id: device_id.to_string(),
                settings: settings.clone(),
            }));

        Ok(settings)
    }

    /// A consistent copy of registry and settings for the snapshot file.
    pub async fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().await;
        Snapshot::new(
            state.registry.as_map().clone(),
            state.settings.as_map().clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use gaswatch_core::provenance::Provenance;

    use super::*;

    fn monitor() -> (Monitor, Arc<EventBus>) {
        let bus = Arc::new(EventBus::default());
        (Monitor::new(Arc::clone(&bus), 100), bus)
    }

    fn drain(sub: &mut gaswatch_events::Subscription) -> Vec<DomainEvent> {
        std::iter::from_fn(|| sub.try_recv()).collect()
    }

    #[tokio::test]
    async fn register_creates_default_settings_once() {
        let (monitor, bus) = monitor();
        let mut sub = bus.subscribe();

        let first = monitor.register("gas-1", Some("MQ-2".into()), None).await.unwrap();
        assert_eq!(first.settings.threshold, 800.0);

        let events = drain(&mut sub);
        assert_eq!(events.len(), 2);
        assert_matches!(events[0].payload, EventPayload::DeviceRegistryChanged { .. });
        assert_matches!(events[1].payload, EventPayload::SettingsChanged { .. });

        monitor
            .update_settings(
                "gas-1",
                &SettingsPatch { threshold: Some(450.0), actuator_enabled: None },
            )
            .await
            .unwrap();
        let again = monitor.register("gas-1", Some("MQ-2".into()), None).await.unwrap();
        assert_eq!(again.settings.threshold, 450.0);
        assert_eq!(monitor.device_count().await, 1);
    }

    #[tokio::test]
    async fn reading_above_threshold_raises_one_origin_alert() {
        let (monitor, bus) = monitor();
        monitor.register("gas-1", None, None).await.unwrap();
        let mut sub = bus.subscribe();

        let ingested = monitor.ingest("gas-1", 900.0, Some(1_234)).await.unwrap();
        let alert = ingested.alert.expect("900 > 800");
        assert_eq!(alert.id, ingested.reading.id);

        let events = drain(&mut sub);
        assert_eq!(events.len(), 2);
        assert_matches!(
            &events[0].payload,
            EventPayload::NewReading { reading, .. } if reading.value == 900.0
        );
        assert_matches!(
            &events[1].payload,
            EventPayload::AlertRaised { alert } if alert.threshold == 800.0
        );
        assert!(events.iter().all(|e| e.provenance == Provenance::Origin));
    }

    #[tokio::test]
    async fn unregistered_device_is_stored_but_not_evaluated() {
        let (monitor, _bus) = monitor();

        let ingested = monitor.ingest("stray", 5_000.0, None).await.unwrap();
        assert!(ingested.alert.is_none());
        assert_eq!(monitor.readings("stray", Since::All).await.unwrap().len(), 1);
        assert_matches!(monitor.settings("stray").await, Err(CoreError::NotFound { .. }));
        assert!(monitor.devices().await.is_empty());
    }

    #[tokio::test]
    async fn readings_distinguish_unknown_from_empty() {
        let (monitor, _bus) = monitor();
        monitor.register("gas-1", None, None).await.unwrap();

        assert!(monitor.readings("gas-1", Since::All).await.unwrap().is_empty());
        assert_matches!(
            monitor.readings("ghost", Since::All).await,
            Err(CoreError::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn ingest_rejects_non_finite_values() {
        let (monitor, _bus) = monitor();
        assert_matches!(
            monitor.ingest("gas-1", f64::NAN, None).await,
            Err(CoreError::Validation(_))
        );
        assert_matches!(
            monitor.ingest("", 1.0, None).await,
            Err(CoreError::Validation(_))
        );
    }

    #[tokio::test]
    async fn history_is_bounded_per_device() {
        let bus = Arc::new(EventBus::default());
        let monitor = Monitor::new(bus, 3);
        for i in 0..10 {
            monitor.ingest("gas-1", i as f64, None).await.unwrap();
        }

        let values: Vec<f64> = monitor
            .readings("gas-1", Since::All)
            .await
            .unwrap()
            .iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(values, vec![7.0, 8.0, 9.0]);
    }

    #[tokio::test]
    async fn concurrent_ingest_keeps_per_device_order() {
        let bus = Arc::new(EventBus::new(4096));
        let monitor = Arc::new(Monitor::new(Arc::clone(&bus), 1000));
        let mut sub = bus.subscribe();

        let tasks: Vec<_> = ["a", "b", "c"]
            .into_iter()
            .map(|device| {
                let monitor = Arc::clone(&monitor);
                tokio::spawn(async move {
                    for i in 0..50 {
                        monitor.ingest(device, i as f64, None).await.unwrap();
                    }
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        let published: Vec<f64> = drain(&mut sub)
            .into_iter()
            .filter_map(|e| match e.payload {
                EventPayload::NewReading { device_id, reading } if device_id == "b" => {
                    Some(reading.value)
                }
                _ => None,
            })
            .collect();
        let stored: Vec<f64> = monitor
            .readings("b", Since::All)
            .await
            .unwrap()
            .iter()
            .map(|r| r.value)
            .collect();

        assert_eq!(published, stored);
        assert_eq!(stored, (0..50).map(|i| i as f64).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn snapshot_excludes_readings() {
        let (monitor, _bus) = monitor();
        monitor.register("gas-1", None, None).await.unwrap();
        monitor.ingest("gas-1", 10.0, None).await.unwrap();

        let snapshot = monitor.snapshot().await;
        let restored = Monitor::from_snapshot(snapshot, Arc::new(EventBus::default()), 100);

        assert_eq!(restored.devices().await.len(), 1);
        assert!(restored.readings("gas-1", Since::All).await.unwrap().is_empty());
    }
}
