//! Threshold classification and alert events.
//!
//! Pure logic. Evaluation uses the settings in force when the reading
//! arrives; changing a threshold later never reclassifies stored readings.

use serde::{Deserialize, Serialize};

use crate::provenance::Provenance;
use crate::reading::Reading;
use crate::settings::Settings;
use crate::types::{DeviceId, EventId, Timestamp};

/// Fraction of the threshold above which a reading is a warning.
pub const WARNING_RATIO: f64 = 0.8;

/// Severity of a single reading relative to its device threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertLevel {
    Normal,
    /// Above [`WARNING_RATIO`] of the threshold.
    Warning,
    /// Strictly above the threshold.
    Danger,
}

/// Classify `value` against `threshold`. Both comparisons are strict.
pub fn classify(value: f64, threshold: f64) -> AlertLevel {
    if value > threshold {
        AlertLevel::Danger
    } else if value > threshold * WARNING_RATIO {
        AlertLevel::Warning
    } else {
        AlertLevel::Normal
    }
}

/// A reading that crossed its device's threshold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertEvent {
    /// Same id as the reading that raised the alert.
    pub id: EventId,
    pub device_id: DeviceId,
    pub value: f64,
    /// Threshold in force when the reading was evaluated.
    pub threshold: f64,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: Timestamp,
    #[serde(default)]
    pub provenance: Provenance,
}

impl AlertEvent {
    pub fn from_reading(reading: &Reading, threshold: f64, provenance: Provenance) -> Self {
        Self {
            id: reading.id,
            device_id: reading.device_id.clone(),
            value: reading.value,
            threshold,
            timestamp: reading.timestamp,
            provenance,
        }
    }

    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    pub fn level(&self) -> AlertLevel {
        classify(self.value, self.threshold)
    }
}

/// Produce an origin alert if `reading` is in the danger band for `settings`.
pub fn evaluate(reading: &Reading, settings: &Settings) -> Option<AlertEvent> {
    match classify(reading.value, settings.threshold) {
        AlertLevel::Danger => Some(AlertEvent::from_reading(
            reading,
            settings.threshold,
            Provenance::Origin,
        )),
        AlertLevel::Warning | AlertLevel::Normal => None,
    }
}
