//! Follows one device: feed session, history loading and onward mirroring.

use std::sync::Arc;

use gaswatch_core::window::Since;
use gaswatch_events::{EventPayload, ServerMessage};
use gaswatch_persistence::mirror_event;
use gaswatch_persistence::replica::{ReplicaStore, HISTORY_ALERTS_LIMIT, HISTORY_READINGS_LIMIT};
use tokio::sync::{Mutex, MutexGuard};
use tokio_util::sync::CancellationToken;

use crate::feed::{reconnect_loop, FeedClient, ReconnectConfig};
use crate::origin::OriginHistory;
use crate::reconciler::{History, HistorySource, Reconciler};

pub struct Observer {
    working_set: Mutex<Reconciler>,
    origin: Arc<dyn OriginHistory>,
    store: Arc<dyn ReplicaStore>,
}

impl Observer {
    pub fn new(
        device_id: impl Into<String>,
        origin: Arc<dyn OriginHistory>,
        store: Arc<dyn ReplicaStore>,
    ) -> Self {
        Self {
            working_set: Mutex::new(Reconciler::new(device_id)),
            origin,
            store,
        }
    }

    /// Lock the working set for reading.
    pub async fn working_set(&self) -> MutexGuard<'_, Reconciler> {
        self.working_set.lock().await
    }

    /// Pull history from the external store and the origin and merge it.
    ///
    /// A source that fails is logged and treated as empty.
    pub async fn load_history(&self) -> HistorySource {
        let device_id = self.working_set.lock().await.device_id().to_string();
        let mut history = History::default();

        match self
            .store
            .recent_readings(&device_id, HISTORY_READINGS_LIMIT)
            .await
        {
            Ok(readings) => history.external_readings = readings,
            Err(e) => {
                tracing::warn!(device_id = %device_id, error = %e, "External readings unavailable")
            }
        }
        match self
            .store
            .recent_alerts(&device_id, HISTORY_ALERTS_LIMIT)
            .await
        {
            Ok(alerts) => history.external_alerts = alerts,
            Err(e) => {
                tracing::warn!(device_id = %device_id, error = %e, "External alerts unavailable")
            }
        }
        match self.store.get_settings(&device_id).await {
            Ok(settings) => history.external_settings = settings,
            Err(e) => {
                tracing::warn!(device_id = %device_id, error = %e, "External settings unavailable")
            }
        }

        match self.origin.readings(&device_id, Since::All).await {
            Ok(readings) => history.origin_readings = readings,
            Err(e) => {
                tracing::warn!(device_id = %device_id, error = %e, "Origin history unavailable")
            }
        }
        match self.origin.settings(&device_id).await {
            Ok(settings) => history.origin_settings = settings,
            Err(e) => {
                tracing::warn!(device_id = %device_id, error = %e, "Origin settings unavailable")
            }
        }

        match self.store.list_devices().await {
            Ok(devices) => history.devices = devices,
            Err(e) => tracing::warn!(error = %e, "External device list unavailable"),
        }
        if history.devices.is_empty() {
            match self.origin.devices().await {
                Ok(devices) => history.devices = devices,
                Err(e) => tracing::warn!(error = %e, "Origin device list unavailable"),
            }
        }

        let source = self.working_set.lock().await.merge_history(history);
        tracing::info!(device_id = %device_id, source = ?source, "History loaded");
        source
    }

    /// Apply one live message and mirror it onward if it is new and origin-made.
    ///
    /// Returns `true` if a mirror write happened.
    pub async fn handle(&self, message: ServerMessage) -> bool {
        let (event, level) = {
            let mut working_set = self.working_set.lock().await;
            let event = working_set.apply_live(message);
            (event, working_set.level())
        };
        let Some(event) = event else {
            return false;
        };

        match &event.payload {
            EventPayload::NewReading { device_id, reading } => {
                tracing::info!(
                    device_id = %device_id,
                    value = reading.value,
                    level = ?level,
                    "Reading"
                );
            }
            EventPayload::AlertRaised { alert } => {
                tracing::warn!(
                    device_id = %alert.device_id,
                    value = alert.value,
                    threshold = alert.threshold,
                    "Gas alert"
                );
            }
            _ => {}
        }

        match mirror_event(self.store.as_ref(), &event).await {
            Ok(written) => written,
            Err(e) => {
                tracing::error!(device_id = ?event.device_id(), error = %e, "Mirror write failed");
                false
            }
        }
    }

    /// Follow the feed until `cancel` is triggered, reconnecting as needed.
    ///
    /// History is (re)loaded after every successful subscribe.
    pub async fn run(
        self: Arc<Self>,
        feed: FeedClient,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) {
        loop {
            let Some(mut conn) = reconnect_loop(&feed, &reconnect, &cancel).await else {
                break;
            };
            self.load_history().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        conn.close().await;
                        tracing::info!("Observer stopping");
                        return;
                    }
                    message = conn.next_message() => match message {
                        Some(message) => {
                            self.handle(message).await;
                        }
                        None => {
                            tracing::warn!("Live feed ended, reconnecting");
                            break;
                        }
                    }
                }
            }
        }
        tracing::info!("Observer stopping");
    }
}
