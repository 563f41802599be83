//! crates/agri_sat_core/src/batch.rs
//!
//! Drives one scheduled run over every registered farm.

use crate::domain::{BoundingBox, DataType, RunSummary, SyncAttemptOutcome};
use crate::error::BatchError;
use crate::geometry::derive_bbox;
use crate::ports::{FarmStore, Sleeper};
use crate::retry::RetryPolicy;
use crate::sync::FarmSync;
use chrono::NaiveDate;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use uuid::Uuid;

/// The result of one batch run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub summary: RunSummary,
    /// Per-farm outcomes, in completion order. Skipped and cancelled farms have none.
    pub outcomes: Vec<SyncAttemptOutcome>,
    pub skipped_farms: Vec<Uuid>,
}

#[derive(Clone)]
pub struct BatchDriver {
    farms: Arc<dyn FarmStore>,
    sync: Arc<FarmSync>,
    policy: RetryPolicy,
    sleeper: Arc<dyn Sleeper>,
    concurrency: usize,
}

impl BatchDriver {
    pub fn new(
        farms: Arc<dyn FarmStore>,
        sync: Arc<FarmSync>,
        policy: RetryPolicy,
        sleeper: Arc<dyn Sleeper>,
    ) -> Self {
        Self {
            farms,
            sync,
            policy,
            sleeper,
            concurrency: 1,
        }
    }

    /// Number of farms processed at once. `1` (the default) processes farms in order.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn data_type(&self) -> DataType {
        self.sync.profile().data_type
    }

    /// Syncs every farm for `target`.
    ///
    /// Only a failure to enumerate farms aborts the run. Cancellation is observed
    /// between farms; a farm already in flight finishes its current attempt chain.
    pub async fn run(
        &self,
        target: NaiveDate,
        cancel: &CancellationToken,
    ) -> Result<BatchReport, BatchError> {
        let data_type = self.data_type();
        info!(%data_type, %target, "Starting scheduled {} update job", data_type);

        let farms = self.farms.list_farms().await.map_err(|e| {
            error!(%data_type, "Error in scheduled job, could not load farms: {}", e);
            BatchError::FarmStore(e)
        })?;

        let mut report = BatchReport {
            summary: RunSummary {
                total: farms.len(),
                ..RunSummary::default()
            },
            ..BatchReport::default()
        };

        let mut work: Vec<(Uuid, BoundingBox)> = Vec::with_capacity(farms.len());
        for farm in &farms {
            match derive_bbox(farm) {
                Ok(bbox) => work.push((farm.id, bbox)),
                Err(e) => {
                    info!(farm_id = %farm.id, "Skipping farm: {}", e);
                    report.skipped_farms.push(farm.id);
                }
            }
        }
        report.summary.skipped = report.skipped_farms.len();

        let results: Vec<Option<SyncAttemptOutcome>> = stream::iter(work)
            .map(|(farm_id, bbox)| {
                let driver = self.clone();
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    Some(driver.sync_farm(farm_id, bbox, target).await)
                }
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await;

        for result in results {
            match result {
                Some(outcome) if outcome.succeeded => {
                    report.summary.succeeded += 1;
                    report.outcomes.push(outcome);
                }
                Some(outcome) => {
                    report.summary.failed += 1;
                    report.outcomes.push(outcome);
                }
                None => report.summary.cancelled += 1,
            }
        }

        let s = &report.summary;
        info!(
            %data_type,
            total = s.total,
            succeeded = s.succeeded,
            failed = s.failed,
            skipped = s.skipped,
            cancelled = s.cancelled,
            "Scheduled {} update job finished. Success: {}, Failed: {}",
            data_type,
            s.succeeded,
            s.failed
        );
        Ok(report)
    }

    async fn sync_farm(
        &self,
        farm_id: Uuid,
        bbox: BoundingBox,
        target: NaiveDate,
    ) -> SyncAttemptOutcome {
        let sync = &self.sync;
        self.policy
            .run(self.sleeper.as_ref(), farm_id, |_attempt| async move {
                sync.sync(farm_id, &bbox, target).await.map(|_| ())
            })
            .await
    }
}
