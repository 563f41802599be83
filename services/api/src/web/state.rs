//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::scheduler::SyncJob;
use agri_sat_core::domain::DataType;
use agri_sat_core::ports::DataRecordStore;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub records: Arc<dyn DataRecordStore>,
    /// The enabled sync jobs, keyed by the data type they produce.
    pub jobs: HashMap<DataType, Arc<SyncJob>>,
    /// Cancelled on shutdown; manually triggered runs stop between farms.
    pub shutdown: CancellationToken,
}
