//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, the concrete implementation of the
//! `FarmStore` and `DataRecordStore` ports from the core crate. It handles all
//! interactions with the PostgreSQL database using `sqlx`.

use agri_sat_core::domain::{Coordinate, DataType, Farm, NaturalKey, SatelliteDataRecord};
use agri_sat_core::ports::{DataRecordStore, FarmStore, PortError, PortResult};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::warn;
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the storage ports.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

/// One stored polygon vertex. Older rows spell the keys out in full.
#[derive(Debug, Deserialize)]
struct CoordinateJson {
    #[serde(alias = "latitude")]
    lat: f64,
    #[serde(alias = "longitude")]
    lng: f64,
}

#[derive(FromRow)]
struct FarmRecord {
    id: Uuid,
    user_id: Uuid,
    name: String,
    crop_type: Option<String>,
    coordinates: Json<serde_json::Value>,
}
impl FarmRecord {
    fn to_domain(self) -> Farm {
        let polygon = parse_polygon(self.id, self.coordinates.0);
        Farm {
            id: self.id,
            user_id: self.user_id,
            name: self.name,
            crop_type: self.crop_type,
            polygon,
        }
    }
}

/// Decodes a stored polygon. A malformed value yields an empty polygon, so the
/// farm is skipped by the sync job instead of failing the whole farm listing.
fn parse_polygon(farm_id: Uuid, value: serde_json::Value) -> Vec<Coordinate> {
    match serde_json::from_value::<Vec<CoordinateJson>>(value) {
        Ok(points) => points
            .into_iter()
            .map(|p| Coordinate::new(p.lat, p.lng))
            .collect(),
        Err(e) => {
            warn!(%farm_id, "Ignoring malformed farm coordinates: {}", e);
            Vec::new()
        }
    }
}

#[derive(FromRow)]
struct SatelliteDataRow {
    id: Uuid,
    farm_id: Uuid,
    data_type: String,
    acquisition_date: NaiveDate,
    mean_value: f64,
    min_value: f64,
    max_value: f64,
    created_at: DateTime<Utc>,
}
impl SatelliteDataRow {
    fn to_domain(self) -> PortResult<SatelliteDataRecord> {
        let data_type = self
            .data_type
            .parse::<DataType>()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(SatelliteDataRecord {
            id: self.id,
            farm_id: self.farm_id,
            data_type,
            acquisition_date: self.acquisition_date,
            mean_value: self.mean_value,
            min_value: self.min_value,
            max_value: self.max_value,
            created_at: self.created_at,
        })
    }
}

const RECORD_COLUMNS: &str =
    "id, farm_id, data_type, acquisition_date, mean_value, min_value, max_value, created_at";

fn db_error(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(e.to_string()),
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            PortError::Unavailable(e.to_string())
        }
        _ => PortError::Unexpected(e.to_string()),
    }
}

//=========================================================================================
// `FarmStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl FarmStore for DbAdapter {
    async fn list_farms(&self) -> PortResult<Vec<Farm>> {
        let records = sqlx::query_as::<_, FarmRecord>(
            "SELECT id, user_id, name, crop_type, coordinates FROM farms ORDER BY created_at ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(records.into_iter().map(|r| r.to_domain()).collect())
    }
}

//=========================================================================================
// `DataRecordStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl DataRecordStore for DbAdapter {
    async fn find_by_natural_key(
        &self,
        key: &NaturalKey,
    ) -> PortResult<Option<SatelliteDataRecord>> {
        let row = sqlx::query_as::<_, SatelliteDataRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM satellite_data \
             WHERE farm_id = $1 AND data_type = $2 AND acquisition_date = $3"
        ))
        .bind(key.farm_id)
        .bind(key.data_type.as_str())
        .bind(key.acquisition_date)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        row.map(SatelliteDataRow::to_domain).transpose()
    }

    async fn upsert(&self, record: SatelliteDataRecord) -> PortResult<SatelliteDataRecord> {
        // The unique constraint is the storage-level guard on the natural key.
        let row = sqlx::query_as::<_, SatelliteDataRow>(&format!(
            "INSERT INTO satellite_data ({RECORD_COLUMNS}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             ON CONFLICT (farm_id, data_type, acquisition_date) DO UPDATE SET \
                 mean_value = EXCLUDED.mean_value, \
                 min_value = EXCLUDED.min_value, \
                 max_value = EXCLUDED.max_value, \
                 updated_at = NOW() \
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(record.id)
        .bind(record.farm_id)
        .bind(record.data_type.as_str())
        .bind(record.acquisition_date)
        .bind(record.mean_value)
        .bind(record.min_value)
        .bind(record.max_value)
        .bind(record.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        row.to_domain()
    }

    async fn list_for_farm(
        &self,
        farm_id: Uuid,
        data_type: DataType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortResult<Vec<SatelliteDataRecord>> {
        let rows = sqlx::query_as::<_, SatelliteDataRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM satellite_data \
             WHERE farm_id = $1 AND data_type = $2 \
               AND acquisition_date >= $3 AND acquisition_date <= $4 \
             ORDER BY acquisition_date ASC"
        ))
        .bind(farm_id)
        .bind(data_type.as_str())
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.into_iter().map(SatelliteDataRow::to_domain).collect()
    }
}
