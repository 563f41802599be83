pub mod catalog;
pub mod db;
pub mod raster;

pub use catalog::ODataCatalogAdapter;
pub use db::DbAdapter;
pub use raster::HttpRasterAdapter;
