//! crates/agri_sat_core/src/gate.rs
//!
//! The single write path into the data-record store for the sync pipeline.
//!
//! A record is looked up by its natural key and then either updated in place or
//! inserted. The lookup and the write run under a lock held per natural key, so
//! concurrent or repeated persists of the same key never produce two records.

use crate::domain::{IndexStats, NaturalKey, SatelliteDataRecord};
use crate::error::SyncError;
use crate::ports::DataRecordStore;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

pub struct PersistenceGate {
    store: Arc<dyn DataRecordStore>,
    locks: Mutex<HashMap<NaturalKey, Arc<tokio::sync::Mutex<()>>>>,
}

impl PersistenceGate {
    pub fn new(store: Arc<dyn DataRecordStore>) -> Self {
        Self {
            store,
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Stores `stats` under `key`. Newly computed statistics always win over stored ones.
    pub async fn persist(
        &self,
        key: NaturalKey,
        stats: IndexStats,
    ) -> Result<SatelliteDataRecord, SyncError> {
        let key_lock = self.key_lock(key);
        let _guard = key_lock.lock().await;

        let existing = self
            .store
            .find_by_natural_key(&key)
            .await
            .map_err(SyncError::Persistence)?;

        let record = match existing {
            Some(mut record) => {
                debug!(
                    farm_id = %key.farm_id,
                    data_type = %key.data_type,
                    acquisition_date = %key.acquisition_date,
                    "Updating existing record"
                );
                record.mean_value = stats.mean;
                record.min_value = stats.min;
                record.max_value = stats.max;
                record
            }
            None => SatelliteDataRecord::new(key, stats),
        };

        self.store
            .upsert(record)
            .await
            .map_err(SyncError::Persistence)
    }

    fn key_lock(&self, key: NaturalKey) -> Arc<tokio::sync::Mutex<()>> {
        // A poisoned map only means another thread panicked while holding it;
        // the map itself is still consistent.
        let mut locks = self
            .locks
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Entries only the map references are idle.
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(key).or_default().clone()
    }
}
