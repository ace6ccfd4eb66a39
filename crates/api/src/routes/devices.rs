use axum::routing::{get, post};
use axum::Router;

use crate::handlers::devices;
use crate::state::AppState;

/// ```text
/// GET  /devices            -> list_devices
/// POST /devices/register   -> register_device
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/devices", get(devices::list_devices))
        .route("/devices/register", post(devices::register_device))
}
