/// Opaque, stable device identifier chosen by the device firmware.
pub type DeviceId = String;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Identifier shared by a reading and any alert it raised.
///
/// UUID v7, so lexicographic order follows creation time.
pub type EventId = uuid::Uuid;

/// Allocate a new time-ordered [`EventId`].
pub fn new_event_id() -> EventId {
    uuid::Uuid::now_v7()
}
