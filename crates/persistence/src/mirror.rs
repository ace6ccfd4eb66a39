//! Mirror-on-write to the external replicated store.
//!
//! [`MirrorWriter`] subscribes to the [`EventBus`](gaswatch_events::EventBus)
//! and writes every origin event to a [`ReplicaStore`]. It runs as a
//! long-lived background task and exits when the bus is dropped. Failed
//! writes are logged and never retried.

use std::sync::Arc;

use gaswatch_events::{DomainEvent, EventPayload, Subscription};

use crate::error::ReplicaError;
use crate::replica::ReplicaStore;

/// Only events first observed by the origin are written to the external store.
pub fn should_mirror(event: &DomainEvent) -> bool {
    event.provenance.is_mirrorable()
}

/// Write one event to `store` if its provenance allows it.
///
/// Returns `Ok(false)` when the event was not eligible for mirroring.
pub async fn mirror_event(
    store: &dyn ReplicaStore,
    event: &DomainEvent,
) -> Result<bool, ReplicaError> {
    if !should_mirror(event) {
        return Ok(false);
    }

    match &event.payload {
        EventPayload::DeviceRegistryChanged { devices } => {
            for device in devices {
                store.put_device(device).await?;
            }
        }
        EventPayload::NewReading { reading, .. } => store.put_reading(reading).await?,
        EventPayload::SettingsChanged { settings, .. } => store.put_settings(settings).await?,
        EventPayload::AlertRaised { alert } => store.put_alert(alert).await?,
    }
    Ok(true)
}

/// Background service that forwards origin events to the external store.
pub struct MirrorWriter;

impl MirrorWriter {
    /// Run the mirror loop until the bus closes.
    ///
    /// Writes are issued one at a time in bus order, off the ingestion path.
    pub async fn run(store: Arc<dyn ReplicaStore>, mut subscription: Subscription) {
        while let Some(event) = subscription.recv().await {
            match mirror_event(store.as_ref(), &event).await {
                Ok(true) => {
                    tracing::trace!(device_id = ?event.device_id(), "Mirrored event");
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::error!(
                        device_id = ?event.device_id(),
                        error = %e,
                        "Failed to mirror event to replica store"
                    );
                }
            }
        }
        tracing::info!("Event bus closed, mirror writer shutting down");
    }
}
