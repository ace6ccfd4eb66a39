//! Periodic durable snapshot of devices and settings.
//!
//! Copies registry and settings under the monitor lock, then writes the file
//! outside it. A final snapshot is written when the job is cancelled.

use std::sync::Arc;
use std::time::Duration;

use gaswatch_persistence::{PersistenceError, SnapshotFile};
use tokio::time::{interval_at, Instant};
use tokio_util::sync::CancellationToken;

use crate::engine::Monitor;

/// Run the snapshot loop until `cancel` is triggered.
///
/// The first write happens one `period` after start.
pub async fn run(
    monitor: Arc<Monitor>,
    file: SnapshotFile,
    period: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        path = %file.path().display(),
        interval_secs = period.as_secs(),
        "Snapshot job started"
    );

    let mut ticker = interval_at(Instant::now() + period, period);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                if let Err(e) = save_once(&monitor, &file).await {
                    tracing::error!(error = %e, "Final snapshot failed");
                } else {
                    tracing::info!("Final snapshot written");
                }
                tracing::info!("Snapshot job stopping");
                break;
            }
            _ = ticker.tick() => {
                match save_once(&monitor, &file).await {
                    Ok(()) => tracing::debug!("Snapshot written"),
                    Err(e) => tracing::error!(error = %e, "Snapshot failed"),
                }
            }
        }
    }
}

/// Take a consistent copy of the monitor state and write it.
pub async fn save_once(monitor: &Monitor, file: &SnapshotFile) -> Result<(), PersistenceError> {
    let snapshot = monitor.snapshot().await;
    file.save(&snapshot).await
}

#[cfg(test)]
mod tests {
    use gaswatch_events::EventBus;

    use super::*;

    #[tokio::test]
    async fn writes_periodically_and_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("data.json"));
        let monitor = Arc::new(Monitor::new(Arc::new(EventBus::default()), 100));
        monitor.register("gas-1", None, None).await.unwrap();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            Arc::clone(&monitor),
            file.clone(),
            Duration::from_millis(20),
            cancel.clone(),
        ));

        tokio::time::sleep(Duration::from_millis(100)).await;
        let periodic = file.load().await.unwrap().unwrap();
        assert!(periodic.devices.contains_key("gas-1"));

        monitor.register("gas-2", None, None).await.unwrap();
        cancel.cancel();
        handle.await.unwrap();

        let last = file.load().await.unwrap().unwrap();
        assert_eq!(last.devices.len(), 2);
        assert_eq!(last.settings.len(), 2);
    }

    #[tokio::test]
    async fn cancel_before_first_tick_still_writes() {
        let dir = tempfile::tempdir().unwrap();
        let file = SnapshotFile::new(dir.path().join("data.json"));
        let monitor = Arc::new(Monitor::new(Arc::new(EventBus::default()), 100));
        monitor.register("gas-1", None, None).await.unwrap();

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run(
            monitor,
            file.clone(),
            Duration::from_secs(300),
            cancel.clone(),
        ));
        cancel.cancel();
        handle.await.unwrap();

        assert!(file.load().await.unwrap().is_some());
    }
}
