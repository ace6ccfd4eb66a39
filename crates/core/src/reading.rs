//! Sensor readings and the bounded per-device history.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::types::{DeviceId, EventId, Timestamp};
use crate::window::Since;

/// Readings retained per device by the origin service.
pub const DEFAULT_CAPACITY: usize = 100;

/// One gas measurement as stored by the origin service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reading {
    pub id: EventId,
    pub device_id: DeviceId,
    pub value: f64,
    /// Server-assigned arrival time; the authoritative ordering key.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
    /// Whatever clock the device reported. Advisory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_timestamp: Option<i64>,
}

/// Fixed-capacity FIFO of one device's readings, oldest first.
#[derive(Debug, Clone)]
pub struct TimeSeries {
    capacity: usize,
    readings: VecDeque<Reading>,
}

impl TimeSeries {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            capacity,
            readings: VecDeque::with_capacity(capacity),
        }
    }

    /// Append a reading, evicting the oldest when full.
    ///
    /// The stored timestamp is clamped so the series never goes backwards
    /// even if the wall clock does. Returns the reading as stored.
    pub fn push(&mut self, mut reading: Reading) -> Reading {
        reading.timestamp = self.next_timestamp(reading.timestamp);
        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading.clone());
        reading
    }

    /// The earliest timestamp a new reading may carry.
    pub fn next_timestamp(&self, now: Timestamp) -> Timestamp {
        match self.readings.back() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        }
    }

    pub fn since(&self, since: Since) -> Vec<Reading> {
        self.readings
            .iter()
            .filter(|r| since.admits(r.timestamp))
            .cloned()
            .collect()
    }

    pub fn last(&self) -> Option<&Reading> {
        self.readings.back()
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Bounded histories for every device that has sent data.
#[derive(Debug, Clone)]
pub struct TimeSeriesStore {
    capacity: usize,
    series: HashMap<DeviceId, TimeSeries>,
}

impl TimeSeriesStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            series: HashMap::new(),
        }
    }

    /// Append to the device's series (creating it on first use).
    pub fn append(&mut self, reading: Reading) -> Reading {
        let capacity = self.capacity;
        self.series
            .entry(reading.device_id.clone())
            .or_insert_with(|| TimeSeries::with_capacity(capacity))
            .push(reading)
    }

    /// Readings at or after `since`, oldest first. `None` if the device never sent data.
    pub fn query(&self, id: &str, since: Since) -> Option<Vec<Reading>> {
        self.series.get(id).map(|series| series.since(since))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.series.contains_key(id)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for TimeSeriesStore {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::*;
    use crate::types::new_event_id;

    fn reading(device: &str, value: f64, ms: i64) -> Reading {
        Reading {
            id: new_event_id(),
            device_id: device.to_string(),
            value,
            timestamp: Utc.timestamp_millis_opt(1_700_000_000_000 + ms).unwrap(),
            device_timestamp: None,
        }
    }

    #[test]
    fn keeps_exactly_the_last_n_in_arrival_order() {
        let mut store = TimeSeriesStore::new(5);
        for i in 0..23 {
            store.append(reading("gas-1", i as f64, i));
            let held = store.query("gas-1", Since::All).unwrap();
            assert!(held.len() <= 5);
        }

        let held: Vec<f64> = store
            .query("gas-1", Since::All)
            .unwrap()
            .iter()
            .map(|r| r.value)
            .collect();
        assert_eq!(held, vec![18.0, 19.0, 20.0, 21.0, 22.0]);
    }

    #[test]
    fn devices_do_not_share_capacity() {
        let mut store = TimeSeriesStore::new(2);
        store.append(reading("a", 1.0, 0));
        store.append(reading("b", 2.0, 1));
        store.append(reading("a", 3.0, 2));

        assert_eq!(store.query("a", Since::All).unwrap().len(), 2);
        assert_eq!(store.query("b", Since::All).unwrap().len(), 1);
    }

    #[test]
    fn query_unknown_device_is_none() {
        let store = TimeSeriesStore::default();
        assert!(store.query("ghost", Since::All).is_none());
    }

    #[test]
    fn query_since_is_inclusive() {
        let mut store = TimeSeriesStore::default();
        for ms in [0, 1_000, 2_000] {
            store.append(reading("gas-1", ms as f64, ms));
        }
        let bound = Utc.timestamp_millis_opt(1_700_000_001_000).unwrap();
        let recent = store.query("gas-1", Since::From(bound)).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].value, 1_000.0);
    }

    #[test]
    fn backwards_clock_is_clamped() {
        let mut series = TimeSeries::with_capacity(10);
        let first = series.push(reading("gas-1", 1.0, 5_000));
        let mut late = reading("gas-1", 2.0, 0);
        late.timestamp = first.timestamp - Duration::seconds(3);

        let stored = series.push(late);
        assert_eq!(stored.timestamp, first.timestamp);
        assert_eq!(series.len(), 2);
    }

    #[test]
    fn zero_capacity_still_holds_latest() {
        let mut series = TimeSeries::with_capacity(0);
        series.push(reading("gas-1", 1.0, 0));
        series.push(reading("gas-1", 2.0, 1));
        assert_eq!(series.len(), 1);
        assert_eq!(series.last().unwrap().value, 2.0);
    }
}
