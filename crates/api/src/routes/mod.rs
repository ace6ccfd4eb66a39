pub mod data;
pub mod devices;
pub mod health;
pub mod settings;

use axum::Router;

use crate::state::AppState;

/// Build the `/api` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /devices                    list registered devices (GET)
/// /devices/register           register or re-register a device (POST)
///
/// /data                       ingest a reading (POST)
/// /data/{device_id}           retained readings (GET, ?since= | ?range=)
///
/// /settings/{device_id}       get (GET), partial update (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(devices::router())
        .merge(data::router())
        .merge(settings::router())
}
