//! services/api/src/test_support.rs
//!
//! Fakes shared by the scheduler and web tests.

use crate::scheduler::SyncJob;
use agri_sat_core::domain::{
    BoundingBox, DataType, Farm, ImagingProduct, IndexStats, NaturalKey, SatelliteDataRecord,
};
use agri_sat_core::ports::{
    ArtifactHandle, CatalogQuery, DataRecordStore, FarmStore, ImageryCatalog, PortResult,
    RasterProcessor, TokioSleeper,
};
use agri_sat_core::{
    BatchDriver, FarmSync, PersistenceGate, ProductSelector, RetryPolicy, SyncProfile,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Notify;
use uuid::Uuid;

/// Blocks `list_farms` until released, then reports no farms.
pub struct GatedFarms(pub Arc<Notify>);

#[async_trait]
impl FarmStore for GatedFarms {
    async fn list_farms(&self) -> PortResult<Vec<Farm>> {
        self.0.notified().await;
        Ok(Vec::new())
    }
}

/// Stands in for every collaborator a farm-less run never reaches.
pub struct Unused;

#[async_trait]
impl ImageryCatalog for Unused {
    async fn search(&self, _query: &CatalogQuery) -> PortResult<Vec<ImagingProduct>> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl RasterProcessor for Unused {
    async fn download(&self, _product: &ImagingProduct) -> PortResult<ArtifactHandle> {
        unreachable!("no farms are synced")
    }

    async fn compute_index(
        &self,
        _artifact: &ArtifactHandle,
        _bbox: &BoundingBox,
        _data_type: DataType,
    ) -> PortResult<IndexStats> {
        unreachable!("no farms are synced")
    }
}

#[async_trait]
impl DataRecordStore for Unused {
    async fn find_by_natural_key(
        &self,
        _key: &NaturalKey,
    ) -> PortResult<Option<SatelliteDataRecord>> {
        Ok(None)
    }

    async fn upsert(&self, record: SatelliteDataRecord) -> PortResult<SatelliteDataRecord> {
        Ok(record)
    }

    async fn list_for_farm(
        &self,
        _farm_id: Uuid,
        _data_type: DataType,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> PortResult<Vec<SatelliteDataRecord>> {
        Ok(Vec::new())
    }
}

/// An NDVI job whose runs stay in progress until `release` is notified.
pub fn gated_job(release: Arc<Notify>) -> Arc<SyncJob> {
    let sync = FarmSync::new(
        ProductSelector::new(Arc::new(Unused)),
        Arc::new(Unused),
        Arc::new(PersistenceGate::new(Arc::new(Unused))),
        SyncProfile::ndvi(),
    );
    let driver = BatchDriver::new(
        Arc::new(GatedFarms(release)),
        Arc::new(sync),
        RetryPolicy::default(),
        Arc::new(TokioSleeper),
    );
    Arc::new(SyncJob::new(driver))
}

/// Polls until the job's current run has finished.
pub async fn wait_until_idle(job: &SyncJob) {
    for _ in 0..200 {
        if !job.is_running() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("sync run did not finish");
}
