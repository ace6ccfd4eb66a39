//! Handlers for per-device alert settings.

use axum::extract::{Path, State};
use axum::Json;
use gaswatch_core::settings::{Settings, SettingsPatch};

use crate::error::AppResult;
use crate::state::AppState;

/// GET /api/settings/{device_id}
pub async fn get_settings(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
) -> AppResult<Json<Settings>> {
    Ok(Json(state.monitor.settings(&device_id).await?))
}

/// POST /api/settings/{device_id}
///
/// Only the supplied fields change; settings are created if absent.
pub async fn update_settings(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Json(patch): Json<SettingsPatch>,
) -> AppResult<Json<Settings>> {
    Ok(Json(state.monitor.update_settings(&device_id, &patch).await?))
}
