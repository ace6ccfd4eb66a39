//! Restart behaviour: devices and settings survive through the snapshot
//! file, readings do not.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{body_json, get, post_json};
use gaswatch_api::background::snapshot::save_once;
use gaswatch_api::engine::Monitor;
use gaswatch_api::state::AppState;
use gaswatch_persistence::SnapshotFile;
use serde_json::json;

// ---------------------------------------------------------------------------
// Test: a restarted server restores devices and settings from the snapshot
// ---------------------------------------------------------------------------

#[tokio::test]
async fn restart_restores_devices_and_settings() {
    let dir = tempfile::tempdir().unwrap();
    let file = SnapshotFile::new(dir.path().join("data.json"));

    let first = common::test_state();
    common::register(&first, "gas-1").await;
    post_json(
        common::build_test_app(&first),
        "/api/settings/gas-1",
        json!({"threshold": 300, "buzzerEnabled": false}),
    )
    .await;
    post_json(
        common::build_test_app(&first),
        "/api/data",
        json!({"deviceId": "gas-1", "gasValue": 120}),
    )
    .await;
    save_once(&first.monitor, &file).await.unwrap();
    drop(first);

    let fresh = common::test_state();
    let restored = AppState {
        monitor: Arc::new(Monitor::from_snapshot(
            file.load_or_default().await,
            Arc::clone(&fresh.event_bus),
            fresh.config.history_capacity,
        )),
        ..fresh
    };

    let devices = body_json(get(common::build_test_app(&restored), "/api/devices").await).await;
    assert_eq!(devices.as_array().unwrap().len(), 1);
    assert_eq!(devices[0]["deviceId"], "gas-1");

    let settings =
        body_json(get(common::build_test_app(&restored), "/api/settings/gas-1").await).await;
    assert_eq!(settings["threshold"], 300.0);
    assert_eq!(settings["buzzerEnabled"], false);

    let history = get(common::build_test_app(&restored), "/api/data/gas-1").await;
    assert_eq!(history.status(), StatusCode::OK);
    assert_eq!(body_json(history).await, json!([]));
}

// ---------------------------------------------------------------------------
// Test: a missing snapshot file starts an empty server
// ---------------------------------------------------------------------------

#[tokio::test]
async fn missing_snapshot_starts_empty() {
    let dir = tempfile::tempdir().unwrap();
    let file = SnapshotFile::new(dir.path().join("absent.json"));

    let snapshot = file.load_or_default().await;
    assert!(snapshot.devices.is_empty());
    assert!(snapshot.settings.is_empty());
}
