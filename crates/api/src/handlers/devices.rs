//! Handlers for device registration and listing.

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use gaswatch_core::device::Device;
use gaswatch_core::settings::Settings;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::state::AppState;

/// Request body for `POST /api/devices/register`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterDeviceRequest {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub ip_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterDeviceResponse {
    pub message: &'static str,
    pub settings: Settings,
}

/// POST /api/devices/register
pub async fn register_device(
    State(state): State<AppState>,
    Json(input): Json<RegisterDeviceRequest>,
) -> AppResult<(StatusCode, Json<RegisterDeviceResponse>)> {
    let device_id = input.device_id.unwrap_or_default();
    let registration = state
        .monitor
        .register(&device_id, input.kind, input.ip_address)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(RegisterDeviceResponse {
            message: "Device registered successfully",
            settings: registration.settings,
        }),
    ))
}

/// GET /api/devices
pub async fn list_devices(State(state): State<AppState>) -> Json<Vec<Device>> {
    Json(state.monitor.devices().await)
}
