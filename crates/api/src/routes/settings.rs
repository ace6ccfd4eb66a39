use axum::routing::get;
use axum::Router;

use crate::handlers::settings;
use crate::state::AppState;

/// ```text
/// GET  /settings/{device_id}   -> get_settings
/// POST /settings/{device_id}   -> update_settings
/// ```
pub fn router() -> Router<AppState> {
    Router::new().route(
        "/settings/{device_id}",
        get(settings::get_settings).post(settings::update_settings),
    )
}
