use axum::routing::{get, post};
use axum::Router;

use crate::handlers::data;
use crate::state::AppState;

/// ```text
/// POST /data               -> ingest_reading
/// GET  /data/{device_id}   -> get_readings
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/data", post(data::ingest_reading))
        .route("/data/{device_id}", get(data::get_readings))
}
