//! crates/agri_sat_core/src/sync.rs
//!
//! The one-farm sync use case: select a product, download it, compute the
//! index, and persist the result through the gate.

use crate::domain::{BoundingBox, DataType, IndexStats, NaturalKey, SatelliteDataRecord};
use crate::error::SyncError;
use crate::gate::PersistenceGate;
use crate::ports::RasterProcessor;
use crate::selector::{ProductSelector, SearchWindow};
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// What to fetch and how wide to search for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncProfile {
    pub data_type: DataType,
    pub platform: String,
    pub product_level: Option<String>,
    pub half_window_days: u32,
}

impl SyncProfile {
    /// Sentinel-2 L2A optical imagery, same-day only.
    pub fn ndvi() -> Self {
        Self {
            data_type: DataType::Ndvi,
            platform: "SENTINEL-2".to_string(),
            product_level: Some("S2MSI2A".to_string()),
            half_window_days: 0,
        }
    }

    /// Sentinel-1 IW GRD high-resolution radar imagery, matched by the catalog's exact
    /// `productType`. The 6–12 day revisit needs a ±7 day window.
    pub fn soil_moisture() -> Self {
        Self {
            data_type: DataType::SoilMoisture,
            platform: "SENTINEL-1".to_string(),
            product_level: Some("IW_GRDH_1S".to_string()),
            half_window_days: 7,
        }
    }

    pub fn for_data_type(data_type: DataType) -> Self {
        match data_type {
            DataType::Ndvi => Self::ndvi(),
            DataType::SoilMoisture => Self::soil_moisture(),
        }
    }
}

pub struct FarmSync {
    selector: ProductSelector,
    raster: Arc<dyn RasterProcessor>,
    gate: Arc<PersistenceGate>,
    profile: SyncProfile,
}

impl FarmSync {
    pub fn new(
        selector: ProductSelector,
        raster: Arc<dyn RasterProcessor>,
        gate: Arc<PersistenceGate>,
        profile: SyncProfile,
    ) -> Self {
        Self {
            selector,
            raster,
            gate,
            profile,
        }
    }

    pub fn profile(&self) -> &SyncProfile {
        &self.profile
    }

    /// Runs one sync attempt for a farm. Safe to repeat for the same target date.
    pub async fn sync(
        &self,
        farm_id: Uuid,
        bbox: &BoundingBox,
        target: NaiveDate,
    ) -> Result<SatelliteDataRecord, SyncError> {
        let profile = &self.profile;
        let window = SearchWindow::new(target, profile.half_window_days);

        let product = self
            .selector
            .select(
                bbox,
                &window,
                &profile.platform,
                profile.product_level.as_deref(),
            )
            .await?;

        let artifact =
            self.raster
                .download(&product)
                .await
                .map_err(|e| SyncError::Download {
                    product_id: product.id.clone(),
                    reason: e.to_string(),
                })?;

        let stats = self
            .raster
            .compute_index(&artifact, bbox, profile.data_type)
            .await
            .map_err(|e| SyncError::Compute {
                data_type: profile.data_type,
                reason: e.to_string(),
            })?;
        validate_stats(&stats, profile.data_type)?;

        let key = NaturalKey {
            farm_id,
            data_type: profile.data_type,
            acquisition_date: product.acquisition_date,
        };
        let record = self.gate.persist(key, stats).await?;

        info!(
            %farm_id,
            data_type = %profile.data_type,
            acquisition_date = %record.acquisition_date,
            mean = record.mean_value,
            "Synced farm"
        );
        Ok(record)
    }
}

fn validate_stats(stats: &IndexStats, data_type: DataType) -> Result<(), SyncError> {
    let finite = [stats.mean, stats.min, stats.max]
        .iter()
        .all(|v| v.is_finite());
    if !finite {
        return Err(SyncError::Compute {
            data_type,
            reason: "statistics are not finite (empty clip?)".to_string(),
        });
    }
    if stats.min > stats.max {
        return Err(SyncError::Compute {
            data_type,
            reason: format!("min {} exceeds max {}", stats.min, stats.max),
        });
    }
    Ok(())
}
