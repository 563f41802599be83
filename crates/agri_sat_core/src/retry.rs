//! crates/agri_sat_core/src/retry.rs
//!
//! Bounded retry with a fixed delay around one farm's sync attempt.
//!
//! The orchestrator never returns an error: every failure, including a panic
//! inside the unit of work, is folded into a `SyncAttemptOutcome`.

use crate::domain::SyncAttemptOutcome;
use crate::error::SyncError;
use crate::ports::Sleeper;
use futures::FutureExt;
use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Values below 1 are treated as 1.
    pub max_attempts: u32,
    /// Wait between consecutive attempts.
    pub delay: Duration,
    /// Whether an empty catalog result consumes an attempt and retries, or fails fast.
    pub retry_on_no_product: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_RETRY_DELAY,
            retry_on_no_product: true,
        }
    }
}

impl RetryPolicy {
    pub fn is_retryable(&self, err: &SyncError) -> bool {
        match err {
            SyncError::InvalidGeometry(_) => false,
            SyncError::NoProductFound { .. } => self.retry_on_no_product,
            _ => true,
        }
    }

    /// Runs `work` until it succeeds, a non-retryable error occurs, or the
    /// attempt budget is spent. `work` receives the 1-based attempt number.
    pub async fn run<F, Fut>(
        &self,
        sleeper: &dyn Sleeper,
        farm_id: Uuid,
        mut work: F,
    ) -> SyncAttemptOutcome
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<(), SyncError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut last_error = None;

        for attempt in 1..=max_attempts {
            let result = AssertUnwindSafe(work(attempt))
                .catch_unwind()
                .await
                .unwrap_or_else(|payload| Err(SyncError::Panicked(panic_message(payload))));

            match result {
                Ok(()) => {
                    if attempt > 1 {
                        info!(%farm_id, attempt, "Farm sync succeeded after retry");
                    }
                    return SyncAttemptOutcome {
                        farm_id,
                        succeeded: true,
                        attempts: attempt,
                        last_error: None,
                    };
                }
                Err(err) => {
                    warn!(
                        %farm_id,
                        attempt,
                        max_attempts,
                        "Attempt {}/{} failed for farm {}: {}",
                        attempt,
                        max_attempts,
                        farm_id,
                        err
                    );
                    let retryable = self.is_retryable(&err);
                    last_error = Some(err.to_string());

                    if !retryable {
                        return self.give_up(farm_id, attempt, last_error);
                    }
                    if attempt < max_attempts {
                        sleeper.sleep(self.delay).await;
                    }
                }
            }
        }

        self.give_up(farm_id, max_attempts, last_error)
    }

    fn give_up(
        &self,
        farm_id: Uuid,
        attempts: u32,
        last_error: Option<String>,
    ) -> SyncAttemptOutcome {
        warn!(
            %farm_id,
            attempts,
            last_error = last_error.as_deref().unwrap_or("unknown"),
            "Sync failed for farm {} after {} attempt(s)",
            farm_id,
            attempts
        );
        SyncAttemptOutcome {
            farm_id,
            succeeded: false,
            attempts,
            last_error,
        }
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
