//! Merged, bounded view of one device's readings, alerts and settings.
//!
//! History comes from two places: the external store (whatever any origin
//! or observer mirrored there) and the origin's own retained readings. The
//! external store wins when it has anything; the origin only seeds an empty
//! one. Live feed events then extend the working set. Every reading and
//! alert is keyed by its id, so the same event arriving from several
//! sources is counted once.

use std::collections::{HashSet, VecDeque};

use chrono::Utc;
use gaswatch_core::alert::{self, classify, AlertEvent, AlertLevel};
use gaswatch_core::device::Device;
use gaswatch_core::reading::Reading;
use gaswatch_core::settings::{Settings, DEFAULT_THRESHOLD};
use gaswatch_core::types::{DeviceId, EventId};
use gaswatch_core::window::{Since, TimeWindow};
use gaswatch_events::{DomainEvent, EventPayload, ServerMessage};
use gaswatch_persistence::replica::{HISTORY_ALERTS_LIMIT, HISTORY_READINGS_LIMIT};

/// Readings kept in the working set.
pub const MAX_READINGS: usize = HISTORY_READINGS_LIMIT;

/// Alerts kept in the working set.
pub const MAX_ALERTS: usize = HISTORY_ALERTS_LIMIT;

/// History gathered when a device is selected or the feed reconnects.
#[derive(Debug, Clone, Default)]
pub struct History {
    /// Most recent readings in the external store, oldest first.
    pub external_readings: Vec<Reading>,
    /// Most recent alerts in the external store, newest first.
    pub external_alerts: Vec<AlertEvent>,
    pub external_settings: Option<Settings>,
    /// Readings the origin still retains, oldest first.
    pub origin_readings: Vec<Reading>,
    pub origin_settings: Option<Settings>,
    /// Registered devices, from the external store or else the origin.
    pub devices: Vec<Device>,
}

/// Which source the reading history was based on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistorySource {
    External,
    Origin,
    Empty,
}

pub struct Reconciler {
    device_id: DeviceId,
    /// Oldest first.
    readings: VecDeque<Reading>,
    reading_ids: HashSet<EventId>,
    /// Newest first.
    alerts: VecDeque<AlertEvent>,
    alert_ids: HashSet<EventId>,
    /// Alerts computed locally from a live reading, awaiting the origin's own.
    derived_alerts: HashSet<EventId>,
    settings: Option<Settings>,
    devices: Vec<Device>,
}

impl Reconciler {
    pub fn new(device_id: impl Into<DeviceId>) -> Self {
        Self {
            device_id: device_id.into(),
            readings: VecDeque::new(),
            reading_ids: HashSet::new(),
            alerts: VecDeque::new(),
            alert_ids: HashSet::new(),
            derived_alerts: HashSet::new(),
            settings: None,
            devices: Vec::new(),
        }
    }

    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Fold loaded history into the working set, keeping everything already known.
    ///
    /// Nothing merged here is ever mirrored.
    pub fn merge_history(&mut self, history: History) -> HistorySource {
        let (source, base) = if !history.external_readings.is_empty() {
            (HistorySource::External, history.external_readings)
        } else if !history.origin_readings.is_empty() {
            (HistorySource::Origin, history.origin_readings)
        } else {
            (HistorySource::Empty, Vec::new())
        };

        let mut merged: Vec<Reading> = self.readings.drain(..).collect();
        for reading in base {
            if reading.device_id == self.device_id && self.reading_ids.insert(reading.id) {
                merged.push(reading);
            }
        }
        merged.sort_by(|a, b| a.timestamp.cmp(&b.timestamp).then(a.id.cmp(&b.id)));
        let excess = merged.len().saturating_sub(MAX_READINGS);
        self.readings = merged.into_iter().skip(excess).collect();
        self.reading_ids = self.readings.iter().map(|r| r.id).collect();

        for stored in history.external_alerts {
            if stored.device_id != self.device_id {
                continue;
            }
            if self.derived_alerts.remove(&stored.id) {
                self.replace_alert(stored);
            } else if self.alert_ids.insert(stored.id) {
                self.alerts.push_back(stored);
            }
        }
        self.alerts
            .make_contiguous()
            .sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then(b.id.cmp(&a.id)));
        self.alerts.truncate(MAX_ALERTS);
        self.alert_ids = self.alerts.iter().map(|a| a.id).collect();
        let alert_ids = &self.alert_ids;
        self.derived_alerts.retain(|id| alert_ids.contains(id));

        for candidate in [history.external_settings, history.origin_settings]
            .into_iter()
            .flatten()
            .filter(|s| s.device_id == self.device_id)
        {
            self.settings = Some(match self.settings.take() {
                Some(current) => current.last_writer_wins(candidate),
                None => candidate,
            });
        }

        for loaded in history.devices {
            match self.devices.iter_mut().find(|d| d.device_id == loaded.device_id) {
                Some(known) if known.last_seen >= loaded.last_seen => {}
                Some(known) => *known = loaded,
                None => self.devices.push(loaded),
            }
        }

        tracing::debug!(
            device_id = %self.device_id,
            source = ?source,
            devices = self.devices.len(),
            readings = self.readings.len(),
            alerts = self.alerts.len(),
            "History merged"
        );
        source
    }

    /// Apply one live feed message.
    ///
    /// Returns the event to hand to the mirror when the message changed the
    /// working set. Duplicates, locally derived alerts and other devices'
    /// events return `None`.
    pub fn apply_live(&mut self, message: ServerMessage) -> Option<DomainEvent> {
        let event = message.into_event();

        match &event.payload {
            EventPayload::DeviceRegistryChanged { devices } => {
                self.devices = devices.clone();
            }
            EventPayload::NewReading { device_id, reading } => {
                if *device_id != self.device_id || !self.push_reading(reading.clone()) {
                    return None;
                }
                let derived = self
                    .settings
                    .as_ref()
                    .and_then(|settings| alert::evaluate(reading, settings));
                if let Some(derived) = derived {
                    if self.alert_ids.insert(derived.id) {
                        self.derived_alerts.insert(derived.id);
                        self.push_alert(derived);
                    }
                }
            }
            EventPayload::AlertRaised { alert } => {
                if alert.device_id != self.device_id {
                    return None;
                }
                if self.derived_alerts.remove(&alert.id) {
                    self.replace_alert(alert.clone());
                } else if self.alert_ids.insert(alert.id) {
                    self.push_alert(alert.clone());
                } else {
                    return None;
                }
            }
            EventPayload::SettingsChanged {
                device_id,
                settings,
            } => {
                if *device_id != self.device_id {
                    return None;
                }
                self.settings = Some(settings.clone());
            }
        }

        Some(event)
    }

    /// Append a live reading. Returns `false` for an id already in the set.
    fn push_reading(&mut self, reading: Reading) -> bool {
        if !self.reading_ids.insert(reading.id) {
            return false;
        }
        self.readings.push_back(reading);
        while self.readings.len() > MAX_READINGS {
            if let Some(evicted) = self.readings.pop_front() {
                self.reading_ids.remove(&evicted.id);
            }
        }
        true
    }

    fn push_alert(&mut self, alert: AlertEvent) {
        self.alerts.push_front(alert);
        while self.alerts.len() > MAX_ALERTS {
            if let Some(evicted) = self.alerts.pop_back() {
                self.alert_ids.remove(&evicted.id);
                self.derived_alerts.remove(&evicted.id);
            }
        }
    }

    fn replace_alert(&mut self, alert: AlertEvent) {
        if let Some(slot) = self.alerts.iter_mut().find(|a| a.id == alert.id) {
            *slot = alert;
        }
    }

    /// Working-set readings, oldest first.
    pub fn readings(&self) -> impl Iterator<Item = &Reading> {
        self.readings.iter()
    }

    pub fn readings_since(&self, since: Since) -> Vec<Reading> {
        self.readings
            .iter()
            .filter(|r| since.admits(r.timestamp))
            .cloned()
            .collect()
    }

    pub fn readings_in(&self, window: TimeWindow) -> Vec<Reading> {
        self.readings_since(window.since(Utc::now()))
    }

    /// Working-set alerts, newest first.
    pub fn alerts(&self) -> impl Iterator<Item = &AlertEvent> {
        self.alerts.iter()
    }

    pub fn reading_count(&self) -> usize {
        self.readings.len()
    }

    pub fn alert_count(&self) -> usize {
        self.alerts.len()
    }

    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    pub fn settings(&self) -> Option<&Settings> {
        self.settings.as_ref()
    }

    /// Threshold in force, or the default when settings are unknown.
    pub fn threshold(&self) -> f64 {
        self.settings
            .as_ref()
            .map_or(DEFAULT_THRESHOLD, |s| s.threshold)
    }

    /// Level of the latest reading against the current threshold.
    pub fn level(&self) -> Option<AlertLevel> {
        self.latest()
            .map(|reading| classify(reading.value, self.threshold()))
    }

    /// Device list from the most recent `deviceUpdate`, or from history.
    pub fn devices(&self) -> &[Device] {
        &self.devices
    }

    /// Registry record of the followed device, if it is known.
    pub fn device(&self) -> Option<&Device> {
        self.devices.iter().find(|d| d.device_id == self.device_id)
    }
}
