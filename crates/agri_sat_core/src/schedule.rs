//! crates/agri_sat_core/src/schedule.rs
//!
//! Daily trigger arithmetic and single-instance enforcement for scheduled runs.
//!
//! All times are UTC. When the process wakes late (suspended host, long GC,
//! clock jump), every fire time that passed while asleep collapses into the
//! most recent one, which runs only if it is still within the misfire grace.

use chrono::{DateTime, Days, NaiveTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Fires once a day at `hour:minute` UTC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailySchedule {
    time: NaiveTime,
    misfire_grace: Duration,
}

/// What the scheduler should do after waking up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FireDecision {
    /// The scheduled time has not arrived yet.
    Wait,
    /// Run once for `fire_time`. Any earlier missed fires are coalesced into it.
    Run { fire_time: DateTime<Utc> },
    /// The latest fire time is older than the grace window; skip it.
    Misfired { fire_time: DateTime<Utc> },
}

impl DailySchedule {
    /// Returns `None` for an hour above 23 or a minute above 59.
    pub fn new(hour: u32, minute: u32, misfire_grace: Duration) -> Option<Self> {
        Some(Self {
            time: NaiveTime::from_hms_opt(hour, minute, 0)?,
            misfire_grace,
        })
    }

    pub fn misfire_grace(&self) -> Duration {
        self.misfire_grace
    }

    /// The first fire time strictly after `after`.
    pub fn next_fire_after(&self, after: DateTime<Utc>) -> DateTime<Utc> {
        let today = after.date_naive().and_time(self.time).and_utc();
        if today > after {
            today
        } else {
            today + Days::new(1)
        }
    }

    /// The most recent fire time at or before `now`.
    pub fn latest_fire_at_or_before(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let today = now.date_naive().and_time(self.time).and_utc();
        if today <= now {
            today
        } else {
            today - Days::new(1)
        }
    }

    /// Decides whether a wake-up at `now` for a run planned at `scheduled` should fire.
    pub fn decide(&self, scheduled: DateTime<Utc>, now: DateTime<Utc>) -> FireDecision {
        if now < scheduled {
            return FireDecision::Wait;
        }
        let fire_time = self.latest_fire_at_or_before(now);
        let late = (now - fire_time).to_std().unwrap_or_default();
        if late <= self.misfire_grace {
            FireDecision::Run { fire_time }
        } else {
            FireDecision::Misfired { fire_time }
        }
    }
}

/// Ensures at most one run of a job is in progress at a time.
///
/// A trigger that arrives while a run holds the guard is dropped, never queued.
#[derive(Debug, Clone, Default)]
pub struct RunGuard {
    running: Arc<AtomicBool>,
}

/// Held for the duration of a run; releases the guard on drop.
#[derive(Debug)]
pub struct RunPermit {
    running: Arc<AtomicBool>,
}

impl RunGuard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn try_start(&self) -> Option<RunPermit> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| RunPermit {
                running: self.running.clone(),
            })
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }
}

impl Drop for RunPermit {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Release);
    }
}
