//! Handlers for reading ingestion and history.

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{TimeZone, Utc};
use gaswatch_core::error::CoreError;
use gaswatch_core::reading::Reading;
use gaswatch_core::window::{Since, TimeWindow};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Request body for `POST /api/data`, as sent by the sensor firmware.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestRequest {
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub gas_value: Option<f64>,
    /// Device clock, advisory only.
    #[serde(default)]
    pub timestamp: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub message: &'static str,
}

/// Query parameters for `GET /api/data/{device_id}`.
///
/// `since` (epoch milliseconds) takes precedence over `range`.
#[derive(Debug, Default, Deserialize)]
pub struct HistoryQuery {
    pub since: Option<i64>,
    pub range: Option<String>,
}

impl HistoryQuery {
    fn resolve(&self) -> AppResult<Since> {
        if let Some(ms) = self.since {
            let bound = Utc
                .timestamp_millis_opt(ms)
                .single()
                .ok_or_else(|| AppError::BadRequest(format!("Invalid since timestamp: {ms}")))?;
            return Ok(Since::From(bound));
        }
        match &self.range {
            Some(range) => Ok(range.parse::<TimeWindow>()?.since(Utc::now())),
            None => Ok(Since::All),
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /api/data
pub async fn ingest_reading(
    State(state): State<AppState>,
    Json(input): Json<IngestRequest>,
) -> AppResult<Json<IngestResponse>> {
    let (Some(device_id), Some(value)) = (input.device_id, input.gas_value) else {
        return Err(CoreError::Validation("Device ID and gas value are required".into()).into());
    };

    state
        .monitor
        .ingest(&device_id, value, input.timestamp)
        .await?;

    Ok(Json(IngestResponse {
        message: "Data received",
    }))
}

/// GET /api/data/{device_id}
pub async fn get_readings(
    State(state): State<AppState>,
    Path(device_id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> AppResult<Json<Vec<Reading>>> {
    let since = query.resolve()?;
    Ok(Json(state.monitor.readings(&device_id, since).await?))
}
