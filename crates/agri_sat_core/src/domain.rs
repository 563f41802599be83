//! crates/agri_sat_core/src/domain.rs
//!
//! Defines the pure, core data structures for the satellite sync pipeline.
//! These structs are independent of any database or serialization format.

use chrono::{DateTime, NaiveDate, Utc};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// A single polygon vertex as stored on a farm.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }
}

/// A registered farm area. Only the fields the pipeline needs are carried here.
#[derive(Debug, Clone)]
pub struct Farm {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub crop_type: Option<String>,
    /// Ordered polygon vertices. May be empty for farms without usable geometry.
    pub polygon: Vec<Coordinate>,
}

/// Axis-aligned rectangle enclosing a region of interest, in degrees (EPSG:4326).
///
/// Always derived from a farm's polygon, never persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

/// The kinds of time-series data the pipeline persists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Ndvi,
    SoilMoisture,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Ndvi => "NDVI",
            DataType::SoilMoisture => "SOIL_MOISTURE",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a string does not name a known `DataType`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown data type: {0}")]
pub struct UnknownDataType(pub String);

impl FromStr for DataType {
    type Err = UnknownDataType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "NDVI" => Ok(DataType::Ndvi),
            "SOIL_MOISTURE" => Ok(DataType::SoilMoisture),
            _ => Err(UnknownDataType(s.to_string())),
        }
    }
}

/// A read-only view of one catalog entry, valid for the duration of a sync attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ImagingProduct {
    pub id: String,
    pub title: String,
    /// The calendar date the imagery was captured.
    pub acquisition_date: NaiveDate,
    /// When the catalog published the product.
    pub ingestion_date: DateTime<Utc>,
    /// Product footprint as WKT, as reported by the catalog.
    pub footprint: Option<String>,
}

/// Summary statistics of a computed index over a bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexStats {
    pub mean: f64,
    pub min: f64,
    pub max: f64,
}

/// The natural key of a `SatelliteDataRecord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NaturalKey {
    pub farm_id: Uuid,
    pub data_type: DataType,
    pub acquisition_date: NaiveDate,
}

/// One persisted time-series point for a farm.
#[derive(Debug, Clone, PartialEq)]
pub struct SatelliteDataRecord {
    pub id: Uuid,
    pub farm_id: Uuid,
    pub data_type: DataType,
    pub acquisition_date: NaiveDate,
    pub mean_value: f64,
    pub min_value: f64,
    pub max_value: f64,
    pub created_at: DateTime<Utc>,
}

impl SatelliteDataRecord {
    /// Builds a fresh record for a natural key from computed statistics.
    pub fn new(key: NaturalKey, stats: IndexStats) -> Self {
        Self {
            id: Uuid::new_v4(),
            farm_id: key.farm_id,
            data_type: key.data_type,
            acquisition_date: key.acquisition_date,
            mean_value: stats.mean,
            min_value: stats.min,
            max_value: stats.max,
            created_at: Utc::now(),
        }
    }

    pub fn natural_key(&self) -> NaturalKey {
        NaturalKey {
            farm_id: self.farm_id,
            data_type: self.data_type,
            acquisition_date: self.acquisition_date,
        }
    }
}

/// The outcome of one farm's sync within a scheduled run. Discarded after the run.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncAttemptOutcome {
    pub farm_id: Uuid,
    pub succeeded: bool,
    pub attempts: u32,
    pub last_error: Option<String>,
}

/// Aggregated counts for one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Farms skipped for lack of usable geometry. Not counted as failures.
    pub skipped: usize,
    /// Farms never started because the run was cancelled.
    pub cancelled: usize,
}
