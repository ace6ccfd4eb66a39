use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use gaswatch_api::config::ServerConfig;
use gaswatch_api::engine::Monitor;
use gaswatch_api::router::build_app_router;
use gaswatch_api::state::AppState;
use gaswatch_api::{background, ws};
use gaswatch_events::EventBus;
use gaswatch_persistence::{MirrorWriter, ReplicaStore, RestReplicaStore, SnapshotFile};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gaswatch_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // --- Configuration ---
    let config = ServerConfig::from_env().expect("Invalid server configuration");
    tracing::info!(host = %config.host, port = %config.port, "Loaded server configuration");

    // --- Event bus ---
    let event_bus = Arc::new(EventBus::default());

    // --- Monitor, seeded from the last snapshot ---
    let snapshot_file = SnapshotFile::new(config.snapshot_path.clone());
    let snapshot = snapshot_file.load_or_default().await;
    let monitor = Arc::new(Monitor::from_snapshot(
        snapshot,
        Arc::clone(&event_bus),
        config.history_capacity,
    ));

    // --- WebSocket manager ---
    let ws_manager = Arc::new(ws::WsManager::new());

    // --- Heartbeat ---
    let heartbeat_handle = ws::start_heartbeat(Arc::clone(&ws_manager));

    // Relay bus events to WebSocket clients.
    let feed_router = ws::FeedRouter::new(Arc::clone(&ws_manager));
    let feed_handle = tokio::spawn(feed_router.run(event_bus.subscribe()));

    // Mirror origin events to the external store, if one is configured.
    let mirror_handle = match &config.replica {
        Some(replica) => match RestReplicaStore::new(&replica.url, replica.auth.clone()) {
            Ok(store) => {
                let store: Arc<dyn ReplicaStore> = Arc::new(store);
                tracing::info!(url = %replica.url, "Mirroring to external store");
                Some(tokio::spawn(MirrorWriter::run(store, event_bus.subscribe())))
            }
            Err(e) => {
                tracing::error!(error = %e, "External store unusable, mirroring disabled");
                None
            }
        },
        None => {
            tracing::info!("REPLICA_URL not set, mirroring disabled");
            None
        }
    };

    // Periodic snapshot.
    let snapshot_cancel = tokio_util::sync::CancellationToken::new();
    let snapshot_handle = tokio::spawn(background::snapshot::run(
        Arc::clone(&monitor),
        snapshot_file,
        Duration::from_secs(config.snapshot_interval_secs),
        snapshot_cancel.clone(),
    ));

    tracing::info!("Background services started (feed router, mirror writer, snapshot)");

    // --- App state ---
    let state = AppState {
        config: Arc::new(config.clone()),
        monitor: Arc::clone(&monitor),
        ws_manager: Arc::clone(&ws_manager),
        event_bus: Arc::clone(&event_bus),
    };

    let app = build_app_router(state, &config);

    // --- Start server ---
    let addr = SocketAddr::new(
        config.host.parse().expect("Invalid HOST address"),
        config.port,
    );
    tracing::info!(%addr, "Starting server");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .expect("Failed to bind to address");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("Server error");

    // --- Post-shutdown cleanup ---
    tracing::info!("Server stopped accepting connections, cleaning up");

    // Stop the snapshot job; it writes one last snapshot on the way out.
    snapshot_cancel.cancel();
    let _ = tokio::time::timeout(Duration::from_secs(5), snapshot_handle).await;
    tracing::info!("Snapshot job stopped");

    // Drop every bus sender to close the broadcast channel.
    // This signals the feed router and mirror writer to shut down.
    drop(monitor);
    drop(event_bus);
    let _ = tokio::time::timeout(Duration::from_secs(5), feed_handle).await;
    if let Some(handle) = mirror_handle {
        let _ = tokio::time::timeout(Duration::from_secs(5), handle).await;
    }
    tracing::info!("Event services shut down");

    let ws_count = ws_manager.connection_count().await;
    tracing::info!(ws_count, "Closing remaining WebSocket connections");
    ws_manager.shutdown_all().await;

    heartbeat_handle.abort();
    tracing::info!("Heartbeat task stopped");

    tracing::info!("Graceful shutdown complete");
}

/// Wait for a termination signal to initiate graceful shutdown.
///
/// Handles both SIGINT (Ctrl-C) and SIGTERM (on Unix) so the server
/// shuts down cleanly whether stopped interactively or by a process
/// manager.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl-C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl-C), starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        }
    }
}
