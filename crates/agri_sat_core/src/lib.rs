pub mod batch;
pub mod domain;
pub mod error;
pub mod gate;
pub mod geometry;
pub mod ports;
pub mod retry;
pub mod schedule;
pub mod selector;
pub mod sync;

pub use batch::{BatchDriver, BatchReport};
pub use domain::{
    BoundingBox, Coordinate, DataType, Farm, ImagingProduct, IndexStats, NaturalKey, RunSummary,
    SatelliteDataRecord, SyncAttemptOutcome,
};
pub use error::{BatchError, SyncError};
pub use gate::PersistenceGate;
pub use ports::{
    ArtifactHandle, CatalogQuery, DataRecordStore, FarmStore, ImageryCatalog, PortError,
    PortResult, RasterProcessor, Sleeper, TokioSleeper,
};
pub use retry::RetryPolicy;
pub use schedule::{DailySchedule, FireDecision, RunGuard, RunPermit};
pub use selector::{ProductSelector, SearchWindow};
pub use sync::{FarmSync, SyncProfile};
