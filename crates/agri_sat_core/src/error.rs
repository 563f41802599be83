//! crates/agri_sat_core/src/error.rs
//!
//! Error taxonomy for a single farm's sync attempt.

use crate::domain::DataType;
use crate::ports::PortError;
use chrono::NaiveDate;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SyncError {
    /// The farm has no polygon to derive a bounding box from. The farm is skipped.
    #[error("Farm {0} has no usable polygon")]
    InvalidGeometry(Uuid),

    #[error("Imagery catalog unavailable: {0}")]
    CatalogUnavailable(String),

    #[error("No {platform} product found between {start} and {end}")]
    NoProductFound {
        platform: String,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("Download failed for product {product_id}: {reason}")]
    Download { product_id: String, reason: String },

    #[error("Computing {data_type} failed: {reason}")]
    Compute { data_type: DataType, reason: String },

    #[error("Persisting record failed: {0}")]
    Persistence(PortError),

    /// The unit of work panicked. Caught at the orchestrator boundary.
    #[error("Sync task panicked: {0}")]
    Panicked(String),
}

impl SyncError {
    /// Catalog failures other than "nothing found" are all treated as unavailability.
    pub fn from_catalog(err: PortError) -> Self {
        match err {
            PortError::Unavailable(msg) | PortError::Unexpected(msg) | PortError::NotFound(msg) => {
                SyncError::CatalogUnavailable(msg)
            }
        }
    }

    pub fn is_no_product(&self) -> bool {
        matches!(self, SyncError::NoProductFound { .. })
    }
}

/// Errors that abort a whole batch run. Per-farm failures never surface here.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum BatchError {
    #[error("Could not load farms: {0}")]
    FarmStore(PortError),
}
