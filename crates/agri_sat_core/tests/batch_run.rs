//! End-to-end batch runs over in-memory ports.

use agri_sat_core::{
    ArtifactHandle, BatchDriver, BatchError, BoundingBox, CatalogQuery, Coordinate, DataRecordStore,
    DataType, Farm, FarmStore, FarmSync, ImageryCatalog, ImagingProduct, IndexStats, NaturalKey,
    PersistenceGate, PortError, PortResult, ProductSelector, RasterProcessor, RetryPolicy,
    SatelliteDataRecord, Sleeper, SyncProfile,
};
use async_trait::async_trait;
use chrono::{NaiveDate, TimeZone, Utc};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

//=========================================================================================
// In-memory Ports
//=========================================================================================

struct MemoryFarms(PortResult<Vec<Farm>>);

#[async_trait]
impl FarmStore for MemoryFarms {
    async fn list_farms(&self) -> PortResult<Vec<Farm>> {
        self.0.clone()
    }
}

/// Returns one product acquired on the target date for every search, after
/// failing a configured number of times for bboxes with a given min longitude.
#[derive(Default)]
struct FlakyCatalog {
    failures_left: Mutex<HashMap<u64, usize>>,
    searches: AtomicUsize,
}

impl FlakyCatalog {
    fn failing(min_lon: f64, times: usize) -> Self {
        let catalog = Self::default();
        catalog
            .failures_left
            .lock()
            .unwrap()
            .insert(min_lon.to_bits(), times);
        catalog
    }
}

#[async_trait]
impl ImageryCatalog for FlakyCatalog {
    async fn search(&self, query: &CatalogQuery) -> PortResult<Vec<ImagingProduct>> {
        self.searches.fetch_add(1, Ordering::SeqCst);
        if let Some(left) = self
            .failures_left
            .lock()
            .unwrap()
            .get_mut(&query.bbox.min_lon.to_bits())
        {
            if *left > 0 {
                *left -= 1;
                return Err(PortError::Unavailable("503 Service Unavailable".to_string()));
            }
        }
        Ok(vec![ImagingProduct {
            id: format!("product-{}", query.bbox.min_lon),
            title: format!("S2B_MSIL2A_{}", query.start),
            acquisition_date: query.start,
            ingestion_date: Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap(),
            footprint: Some(query.bbox.to_wkt()),
        }])
    }
}

/// Computes a mean equal to the bbox's min latitude; panics on a poisoned bbox.
#[derive(Default)]
struct FakeRaster {
    poison_min_lon: Option<f64>,
}

#[async_trait]
impl RasterProcessor for FakeRaster {
    async fn download(&self, product: &ImagingProduct) -> PortResult<ArtifactHandle> {
        Ok(ArtifactHandle {
            id: product.id.clone(),
            path: PathBuf::from(format!("/tmp/{}.SAFE", product.id)),
        })
    }

    async fn compute_index(
        &self,
        _artifact: &ArtifactHandle,
        bbox: &BoundingBox,
        _data_type: DataType,
    ) -> PortResult<IndexStats> {
        if self.poison_min_lon == Some(bbox.min_lon) {
            panic!("corrupt raster for bbox {:?}", bbox);
        }
        Ok(IndexStats {
            mean: bbox.min_lat / 100.0,
            min: 0.0,
            max: 1.0,
        })
    }
}

#[derive(Default)]
struct MemoryRecords {
    rows: Mutex<HashMap<NaturalKey, SatelliteDataRecord>>,
}

impl MemoryRecords {
    fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }
}

#[async_trait]
impl DataRecordStore for MemoryRecords {
    async fn find_by_natural_key(
        &self,
        key: &NaturalKey,
    ) -> PortResult<Option<SatelliteDataRecord>> {
        Ok(self.rows.lock().unwrap().get(key).cloned())
    }

    async fn upsert(&self, record: SatelliteDataRecord) -> PortResult<SatelliteDataRecord> {
        self.rows
            .lock()
            .unwrap()
            .insert(record.natural_key(), record.clone());
        Ok(record)
    }

    async fn list_for_farm(
        &self,
        farm_id: Uuid,
        data_type: DataType,
        start: NaiveDate,
        end: NaiveDate,
    ) -> PortResult<Vec<SatelliteDataRecord>> {
        let mut rows: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .values()
            .filter(|r| {
                r.farm_id == farm_id
                    && r.data_type == data_type
                    && (start..=end).contains(&r.acquisition_date)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.acquisition_date);
        Ok(rows)
    }
}

#[derive(Default)]
struct CountingSleeper(AtomicUsize);

#[async_trait]
impl Sleeper for CountingSleeper {
    async fn sleep(&self, _duration: Duration) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

//=========================================================================================
// Helpers
//=========================================================================================

fn target() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
}

/// A small square farm whose south-west corner is at (`n`, `n`).
fn farm(n: u32) -> Farm {
    let base = f64::from(n);
    Farm {
        id: Uuid::new_v4(),
        user_id: Uuid::new_v4(),
        name: format!("farm {n}"),
        crop_type: Some("rice".to_string()),
        polygon: vec![
            Coordinate::new(base, base),
            Coordinate::new(base + 0.01, base),
            Coordinate::new(base + 0.01, base + 0.01),
            Coordinate::new(base, base + 0.01),
        ],
    }
}

fn farm_without_polygon() -> Farm {
    Farm {
        polygon: Vec::new(),
        ..farm(99)
    }
}

struct Harness {
    driver: BatchDriver,
    records: Arc<MemoryRecords>,
    sleeper: Arc<CountingSleeper>,
}

fn harness(farms: PortResult<Vec<Farm>>, catalog: FlakyCatalog, raster: FakeRaster) -> Harness {
    let records = Arc::new(MemoryRecords::default());
    let sleeper = Arc::new(CountingSleeper::default());
    let sync = FarmSync::new(
        ProductSelector::new(Arc::new(catalog)),
        Arc::new(raster),
        Arc::new(PersistenceGate::new(records.clone())),
        SyncProfile::ndvi(),
    );
    let policy = RetryPolicy {
        max_attempts: 3,
        delay: Duration::from_secs(60),
        retry_on_no_product: true,
    };
    let driver = BatchDriver::new(
        Arc::new(MemoryFarms(farms)),
        Arc::new(sync),
        policy,
        sleeper.clone(),
    );
    Harness {
        driver,
        records,
        sleeper,
    }
}

//=========================================================================================
// Tests
//=========================================================================================

#[tokio::test]
async fn every_farm_gets_one_record() {
    let farms: Vec<_> = (1..=5).map(farm).collect();
    let h = harness(Ok(farms), FlakyCatalog::default(), FakeRaster::default());

    let report = h
        .driver
        .run(target(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.summary.total, 5);
    assert_eq!(report.summary.succeeded, 5);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(h.records.len(), 5);
    assert_eq!(h.sleeper.0.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn farm_without_polygon_is_skipped_without_affecting_others() {
    let skipped = farm_without_polygon();
    let farms = vec![farm(1), skipped.clone(), farm(2)];
    let h = harness(Ok(farms), FlakyCatalog::default(), FakeRaster::default());

    let report = h
        .driver
        .run(target(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.summary.total, 3);
    assert_eq!(report.summary.skipped, 1);
    assert_eq!(report.summary.succeeded, 2);
    assert_eq!(report.summary.failed, 0);
    assert_eq!(report.skipped_farms, vec![skipped.id]);
    assert!(report.outcomes.iter().all(|o| o.farm_id != skipped.id));
}

#[tokio::test]
async fn panicking_farm_fails_and_later_farms_still_run() {
    let farms: Vec<_> = (1..=4).map(farm).collect();
    let poisoned = farms[1].id;
    let raster = FakeRaster {
        poison_min_lon: Some(2.0),
    };
    let h = harness(Ok(farms.clone()), FlakyCatalog::default(), raster);

    let report = h
        .driver
        .run(target(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.summary.succeeded, 3);
    assert_eq!(report.summary.failed, 1);
    let failed = report.outcomes.iter().find(|o| !o.succeeded).unwrap();
    assert_eq!(failed.farm_id, poisoned);
    assert_eq!(failed.attempts, 3);
    assert!(failed.last_error.as_deref().unwrap().contains("corrupt raster"));
    for later in &farms[2..] {
        assert!(report
            .outcomes
            .iter()
            .any(|o| o.farm_id == later.id && o.succeeded));
    }
}

#[tokio::test]
async fn transient_catalog_failures_are_retried() {
    let farms = vec![farm(1), farm(2)];
    let h = harness(Ok(farms), FlakyCatalog::failing(2.0, 2), FakeRaster::default());

    let report = h
        .driver
        .run(target(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.summary.succeeded, 2);
    let retried = report.outcomes.iter().find(|o| o.attempts == 3).unwrap();
    assert!(retried.succeeded);
    assert_eq!(h.sleeper.0.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn rerunning_the_same_date_does_not_duplicate_records() {
    let farms: Vec<_> = (1..=3).map(farm).collect();
    let h = harness(Ok(farms), FlakyCatalog::default(), FakeRaster::default());
    let cancel = CancellationToken::new();

    h.driver.run(target(), &cancel).await.unwrap();
    h.driver.run(target(), &cancel).await.unwrap();

    assert_eq!(h.records.len(), 3);
}

#[tokio::test]
async fn unreachable_farm_store_aborts_the_run() {
    let h = harness(
        Err(PortError::Unavailable("connection refused".to_string())),
        FlakyCatalog::default(),
        FakeRaster::default(),
    );

    let err = h
        .driver
        .run(target(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(
        err,
        BatchError::FarmStore(PortError::Unavailable("connection refused".to_string()))
    );
}

#[tokio::test]
async fn cancelled_run_starts_no_farms() {
    let farms: Vec<_> = (1..=3).map(farm).collect();
    let h = harness(Ok(farms), FlakyCatalog::default(), FakeRaster::default());
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = h.driver.run(target(), &cancel).await.unwrap();

    assert_eq!(report.summary.cancelled, 3);
    assert!(report.outcomes.is_empty());
    assert_eq!(h.records.len(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_run_processes_every_farm() {
    let farms: Vec<_> = (1..=20).map(farm).collect();
    let h = harness(Ok(farms), FlakyCatalog::failing(7.0, 1), FakeRaster::default());
    let driver = h.driver.clone().with_concurrency(4);

    let report = driver
        .run(target(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.summary.total, 20);
    assert_eq!(report.summary.succeeded, 20);
    assert_eq!(report.outcomes.len(), 20);
    assert_eq!(h.records.len(), 20);
}
