//! crates/agri_sat_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the pipeline's collaborators.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific implementations like Postgres or a catalog API.

use crate::domain::{
    BoundingBox, DataType, Farm, ImagingProduct, IndexStats, NaturalKey, SatelliteDataRecord,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::path::PathBuf;
use std::time::Duration;
use uuid::Uuid;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    /// The remote side could not be reached or answered with a transient failure.
    #[error("Service unavailable: {0}")]
    Unavailable(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Value Types Crossing the Ports
//=========================================================================================

/// A catalog search request. Both dates are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogQuery {
    pub bbox: BoundingBox,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Satellite family, e.g. `SENTINEL-2`.
    pub platform: String,
    /// Product type within the family, e.g. `S2MSI2A`.
    pub product_level: Option<String>,
}

/// A handle to a downloaded product, owned by the raster processor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactHandle {
    pub id: String,
    pub path: PathBuf,
}

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait FarmStore: Send + Sync {
    /// Lists every registered farm.
    async fn list_farms(&self) -> PortResult<Vec<Farm>>;
}

#[async_trait]
pub trait ImageryCatalog: Send + Sync {
    /// Returns every product whose footprint intersects the bbox within the date range.
    async fn search(&self, query: &CatalogQuery) -> PortResult<Vec<ImagingProduct>>;
}

#[async_trait]
pub trait RasterProcessor: Send + Sync {
    /// Downloads a product and returns a handle to the local artifact.
    async fn download(&self, product: &ImagingProduct) -> PortResult<ArtifactHandle>;

    /// Computes the index for `data_type` over the bbox clipped from the artifact.
    async fn compute_index(
        &self,
        artifact: &ArtifactHandle,
        bbox: &BoundingBox,
        data_type: DataType,
    ) -> PortResult<IndexStats>;
}

#[async_trait]
pub trait DataRecordStore: Send + Sync {
    async fn find_by_natural_key(&self, key: &NaturalKey)
        -> PortResult<Option<SatelliteDataRecord>>;

    /// Inserts the record, or overwrites the statistics of the record sharing its natural key.
    async fn upsert(&self, record: SatelliteDataRecord) -> PortResult<SatelliteDataRecord>;

    /// Records for one farm and type with `start <= acquisition_date <= end`, oldest first.
    async fn list_for_farm(
        &self,
        farm_id: Uuid,
        data_type: DataType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortResult<Vec<SatelliteDataRecord>>;
}

/// A suspending wait. Swapped for a recording fake in tests.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// The production `Sleeper`, backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}
