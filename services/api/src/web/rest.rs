//! services/api/src/web/rest.rs
//!
//! Contains the Axum handlers for the REST API endpoints and the master
//! definition for the OpenAPI specification.

use crate::error::ApiError;
use crate::scheduler::target_date_for;
use crate::web::state::AppState;
use agri_sat_core::domain::{DataType, SatelliteDataRecord};
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path as FsPath;
use std::sync::Arc;
use tracing::{error, info};
use utoipa::{IntoParams, OpenApi, ToSchema};
use uuid::Uuid;

/// Window used for record listings when the caller gives no start date.
const DEFAULT_LOOKBACK_DAYS: u64 = 30;

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        health_handler,
        list_satellite_data_handler,
        trigger_sync_handler,
    ),
    components(
        schemas(HealthResponse, SatelliteDataResponse, TriggerSyncResponse)
    ),
    tags(
        (
            name = "Farm Satellite Data API",
            description = "Vegetation index and soil moisture time series for registered farms."
        )
    )
)]
pub struct ApiDoc;

/// Renders the OpenAPI document as pretty JSON and writes it to `path`.
pub fn write_openapi(path: &FsPath) -> Result<(), ApiError> {
    let document = ApiDoc::openapi().to_pretty_json()?;
    std::fs::write(path, document)?;
    Ok(())
}

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    status: String,
    version: String,
}

/// One point of a farm's satellite time series.
#[derive(Debug, Serialize, ToSchema)]
pub struct SatelliteDataResponse {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub data_type: String,
    pub acquisition_date: NaiveDate,
    pub mean_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub created_at: DateTime<Utc>,
}

impl From<SatelliteDataRecord> for SatelliteDataResponse {
    fn from(record: SatelliteDataRecord) -> Self {
        Self {
            id: record.id,
            farm_id: record.farm_id,
            data_type: record.data_type.to_string(),
            acquisition_date: record.acquisition_date,
            mean_value: record.mean_value,
            min_value: record.min_value,
            max_value: record.max_value,
            created_at: record.created_at,
        }
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SatelliteDataQuery {
    /// `NDVI` (default) or `SOIL_MOISTURE`.
    pub data_type: Option<String>,
    /// Inclusive, `YYYY-MM-DD`. Defaults to 30 days before `end_date`.
    pub start_date: Option<NaiveDate>,
    /// Inclusive, `YYYY-MM-DD`. Defaults to today.
    pub end_date: Option<NaiveDate>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct TriggerSyncResponse {
    pub status: String,
    pub data_type: String,
    pub target_date: NaiveDate,
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// Liveness probe.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// List a farm's stored satellite records, oldest first.
#[utoipa::path(
    get,
    path = "/api/v1/farms/{farm_id}/satellite-data",
    params(
        ("farm_id" = Uuid, Path, description = "The farm to read."),
        SatelliteDataQuery
    ),
    responses(
        (status = 200, description = "Records in the date range", body = [SatelliteDataResponse]),
        (status = 400, description = "Unknown data type or inverted date range"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_satellite_data_handler(
    State(app_state): State<Arc<AppState>>,
    Path(farm_id): Path<Uuid>,
    Query(query): Query<SatelliteDataQuery>,
) -> Result<Json<Vec<SatelliteDataResponse>>, (StatusCode, String)> {
    let data_type = match query.data_type.as_deref() {
        None => DataType::Ndvi,
        Some(raw) => raw
            .parse::<DataType>()
            .map_err(|e| (StatusCode::BAD_REQUEST, e.to_string()))?,
    };

    let end = query.end_date.unwrap_or_else(|| Utc::now().date_naive());
    let start = query.start_date.unwrap_or_else(|| {
        end.checked_sub_days(Days::new(DEFAULT_LOOKBACK_DAYS))
            .unwrap_or(end)
    });
    if start > end {
        return Err((
            StatusCode::BAD_REQUEST,
            format!("start_date {} is after end_date {}", start, end),
        ));
    }

    let records = app_state
        .records
        .list_for_farm(farm_id, data_type, start, end)
        .await
        .map_err(|e| {
            error!("Failed to list satellite data for farm {}: {:?}", farm_id, e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to list satellite data".to_string(),
            )
        })?;

    Ok(Json(records.into_iter().map(Into::into).collect()))
}

/// Start a sync run for every farm now, outside the daily schedule.
#[utoipa::path(
    post,
    path = "/api/v1/sync/{data_type}",
    params(("data_type" = String, Path, description = "`NDVI` or `SOIL_MOISTURE`.")),
    responses(
        (status = 202, description = "Run started", body = TriggerSyncResponse),
        (status = 404, description = "No sync job for this data type"),
        (status = 409, description = "A run of this job is already in progress")
    )
)]
pub async fn trigger_sync_handler(
    State(app_state): State<Arc<AppState>>,
    Path(data_type): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let data_type = data_type
        .parse::<DataType>()
        .map_err(|e| (StatusCode::NOT_FOUND, e.to_string()))?;
    let job = app_state.jobs.get(&data_type).ok_or_else(|| {
        (
            StatusCode::NOT_FOUND,
            format!("{} sync is not enabled", data_type),
        )
    })?;

    let target_date = target_date_for(Utc::now());
    if job
        .try_spawn(target_date, app_state.shutdown.child_token())
        .is_none()
    {
        return Err((
            StatusCode::CONFLICT,
            format!("A {} sync run is already in progress", data_type),
        ));
    }
    info!(%data_type, %target_date, "Manual sync run started");

    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerSyncResponse {
            status: "started".to_string(),
            data_type: data_type.to_string(),
            target_date,
        }),
    ))
}
