//! crates/agri_sat_core/src/geometry.rs
//!
//! Bounding box derivation from farm polygons.

use crate::domain::{BoundingBox, Coordinate, Farm};
use crate::error::SyncError;

/// Derives the farm's bounding box from its stored polygon.
///
/// Fails with `InvalidGeometry` when the polygon is empty or holds a non-finite
/// coordinate; callers skip such farms instead of failing the batch.
pub fn derive_bbox(farm: &Farm) -> Result<BoundingBox, SyncError> {
    BoundingBox::enclosing(&farm.polygon).ok_or(SyncError::InvalidGeometry(farm.id))
}

impl BoundingBox {
    /// The extremal coordinates over `points`, or `None` if there is nothing to enclose.
    pub fn enclosing(points: &[Coordinate]) -> Option<Self> {
        let (first, rest) = points.split_first()?;
        if !is_finite(first) {
            return None;
        }

        let mut bbox = BoundingBox {
            min_lon: first.longitude,
            min_lat: first.latitude,
            max_lon: first.longitude,
            max_lat: first.latitude,
        };
        for point in rest {
            if !is_finite(point) {
                return None;
            }
            bbox.min_lon = bbox.min_lon.min(point.longitude);
            bbox.min_lat = bbox.min_lat.min(point.latitude);
            bbox.max_lon = bbox.max_lon.max(point.longitude);
            bbox.max_lat = bbox.max_lat.max(point.latitude);
        }
        Some(bbox)
    }

    pub fn contains(&self, point: &Coordinate) -> bool {
        (self.min_lon..=self.max_lon).contains(&point.longitude)
            && (self.min_lat..=self.max_lat).contains(&point.latitude)
    }

    /// `[minx, miny, maxx, maxy]`, the order most raster tooling expects.
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_lon, self.min_lat, self.max_lon, self.max_lat]
    }

    /// Closed WKT polygon ring, counter-clockwise from the south-west corner.
    pub fn to_wkt(&self) -> String {
        let (x0, y0, x1, y1) = (self.min_lon, self.min_lat, self.max_lon, self.max_lat);
        format!("POLYGON(({x0} {y0},{x1} {y0},{x1} {y1},{x0} {y1},{x0} {y0}))")
    }
}

fn is_finite(point: &Coordinate) -> bool {
    point.latitude.is_finite() && point.longitude.is_finite()
}
