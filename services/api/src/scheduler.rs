//! services/api/src/scheduler.rs
//!
//! The background task that triggers the satellite sync jobs on their daily
//! schedule, and the job handle shared with the manual trigger endpoint.

use agri_sat_core::{BatchDriver, DailySchedule, DataType, FireDecision, RunGuard};
use chrono::{DateTime, Days, NaiveDate, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// One sync job: a batch driver plus the guard that keeps its runs from overlapping.
pub struct SyncJob {
    driver: BatchDriver,
    guard: RunGuard,
}

impl SyncJob {
    pub fn new(driver: BatchDriver) -> Self {
        Self {
            driver,
            guard: RunGuard::new(),
        }
    }

    pub fn data_type(&self) -> DataType {
        self.driver.data_type()
    }

    pub fn is_running(&self) -> bool {
        self.guard.is_running()
    }

    /// Starts a run for `target` in the background.
    ///
    /// Returns `None` without starting anything if a run of this job is in progress.
    pub fn try_spawn(
        self: &Arc<Self>,
        target: NaiveDate,
        cancel: CancellationToken,
    ) -> Option<JoinHandle<()>> {
        let permit = self.guard.try_start()?;
        let job = Arc::clone(self);
        Some(tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = job.driver.run(target, &cancel).await {
                error!(data_type = %job.data_type(), "Scheduled run aborted: {}", e);
            }
        }))
    }
}

/// The acquisition date a run fired at `fire_time` targets: the day that just ended.
pub fn target_date_for(fire_time: DateTime<Utc>) -> NaiveDate {
    let today = fire_time.date_naive();
    today.checked_sub_days(Days::new(1)).unwrap_or(today)
}

/// Fires `job` on `schedule` until `cancel` is triggered.
pub async fn run_scheduler(job: Arc<SyncJob>, schedule: DailySchedule, cancel: CancellationToken) {
    let data_type = job.data_type();
    let mut scheduled = schedule.next_fire_after(Utc::now());
    info!(%data_type, next_run = %scheduled, "Scheduler started");

    loop {
        let wait = (scheduled - Utc::now()).to_std().unwrap_or_default();
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(%data_type, "Scheduler stopped");
                return;
            }
            _ = tokio::time::sleep(wait) => {}
        }

        let now = Utc::now();
        match schedule.decide(scheduled, now) {
            FireDecision::Wait => continue,
            FireDecision::Run { fire_time } => {
                let target = target_date_for(fire_time);
                if job.try_spawn(target, cancel.child_token()).is_none() {
                    warn!(
                        %data_type,
                        %fire_time,
                        "Previous run still in progress, skipping this trigger"
                    );
                }
            }
            FireDecision::Misfired { fire_time } => {
                warn!(
                    %data_type,
                    %fire_time,
                    grace_secs = schedule.misfire_grace().as_secs(),
                    "Run missed its misfire grace time, skipping"
                );
            }
        }
        scheduled = schedule.next_fire_after(now);
        info!(%data_type, next_run = %scheduled, "Next run scheduled");
    }
}
