//! `gaswatch-observer` -- follows one gas sensor.
//!
//! Subscribes to the origin's live feed for `DEVICE_ID`, merges history
//! from the external store and the origin, and mirrors new origin events to
//! the external store. Logs each reading with its alert level, and
//! periodically the device's liveness.
//!
//! See [`ObserverConfig::from_env`] for the environment variables.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chrono::Utc;
use gaswatch_observer::config::ObserverConfig;
use gaswatch_observer::feed::{FeedClient, ReconnectConfig};
use gaswatch_observer::origin::OriginClient;
use gaswatch_observer::Observer;
use gaswatch_persistence::{InMemoryReplicaStore, ReplicaStore, RestReplicaStore};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Interval between working-set summaries.
const SUMMARY_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gaswatch_observer=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ObserverConfig::from_env().context("Invalid observer configuration")?;

    let store: Arc<dyn ReplicaStore> = match &config.replica {
        Some(replica) => Arc::new(
            RestReplicaStore::new(&replica.url, replica.auth.clone())
                .context("External store unusable")?,
        ),
        None => {
            tracing::info!("REPLICA_URL not set, history kept in memory only");
            Arc::new(InMemoryReplicaStore::new())
        }
    };

    tracing::info!(
        device_id = %config.device_id,
        origin = %config.origin_url,
        window = %config.window,
        "Starting gaswatch-observer",
    );

    let observer = Arc::new(Observer::new(
        config.device_id.clone(),
        Arc::new(OriginClient::new(config.origin_url.clone())),
        store,
    ));
    let feed = FeedClient::new(config.feed_url(), config.device_id.clone());

    let cancel = CancellationToken::new();
    let run_handle = tokio::spawn(Arc::clone(&observer).run(
        feed,
        ReconnectConfig::default(),
        cancel.clone(),
    ));

    let mut summary = tokio::time::interval(SUMMARY_INTERVAL);
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT (Ctrl-C), shutting down");
                break;
            }
            _ = summary.tick() => {
                let working_set = observer.working_set().await;
                let in_window = working_set.readings_in(config.window);
                let peak = in_window.iter().map(|r| r.value).reduce(f64::max);
                let status = working_set.device().map(|d| d.status_at(Utc::now()));
                tracing::info!(
                    device_id = %working_set.device_id(),
                    window = %config.window,
                    readings = in_window.len(),
                    peak = ?peak,
                    alerts = working_set.alert_count(),
                    level = ?working_set.level(),
                    status = ?status,
                    "Summary"
                );
            }
        }
    }

    cancel.cancel();
    run_handle.await.context("Observer task panicked")?;
    Ok(())
}
