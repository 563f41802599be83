pub mod rest;
pub mod state;

// Re-export the handlers to make them easily accessible
// to the binary that builds the web server router.
pub use rest::{health_handler, list_satellite_data_handler, trigger_sync_handler};
pub use state::AppState;
