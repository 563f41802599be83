//! crates/agri_sat_core/src/selector.rs
//!
//! Picks the single most temporally relevant catalog product for a target date.

use crate::domain::{BoundingBox, ImagingProduct};
use crate::error::SyncError;
use crate::ports::{CatalogQuery, ImageryCatalog};
use chrono::{Days, NaiveDate};
use std::cmp::Reverse;
use std::sync::Arc;
use tracing::{debug, info};

/// An inclusive date range of `target ± half_window_days`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchWindow {
    pub target: NaiveDate,
    pub half_window_days: u32,
}

impl SearchWindow {
    pub fn new(target: NaiveDate, half_window_days: u32) -> Self {
        Self {
            target,
            half_window_days,
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.target
            .checked_sub_days(Days::new(self.half_window_days.into()))
            .unwrap_or(NaiveDate::MIN)
    }

    pub fn end(&self) -> NaiveDate {
        self.target
            .checked_add_days(Days::new(self.half_window_days.into()))
            .unwrap_or(NaiveDate::MAX)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        (self.start()..=self.end()).contains(&date)
    }
}

/// Chooses the candidate closest to `window.target` among those inside the window.
///
/// Ties on day distance go to the most recently ingested product, then to the
/// smallest product id so the choice never depends on catalog ordering.
pub fn pick_closest<'a>(
    candidates: &'a [ImagingProduct],
    window: &SearchWindow,
) -> Option<&'a ImagingProduct> {
    let rank = |p: &ImagingProduct| {
        let distance = (p.acquisition_date - window.target).num_days().abs();
        (distance, Reverse(p.ingestion_date))
    };
    candidates
        .iter()
        .filter(|p| window.contains(p.acquisition_date))
        .min_by(|a, b| rank(a).cmp(&rank(b)).then_with(|| a.id.cmp(&b.id)))
}

/// Queries the imagery catalog and selects the best product for one farm.
#[derive(Clone)]
pub struct ProductSelector {
    catalog: Arc<dyn ImageryCatalog>,
}

impl ProductSelector {
    pub fn new(catalog: Arc<dyn ImageryCatalog>) -> Self {
        Self { catalog }
    }

    pub async fn select(
        &self,
        bbox: &BoundingBox,
        window: &SearchWindow,
        platform: &str,
        product_level: Option<&str>,
    ) -> Result<ImagingProduct, SyncError> {
        let query = CatalogQuery {
            bbox: *bbox,
            start: window.start(),
            end: window.end(),
            platform: platform.to_string(),
            product_level: product_level.map(str::to_string),
        };

        let candidates = self
            .catalog
            .search(&query)
            .await
            .map_err(SyncError::from_catalog)?;
        debug!(
            platform,
            candidates = candidates.len(),
            "Catalog search returned candidates"
        );

        let best = pick_closest(&candidates, window).ok_or_else(|| SyncError::NoProductFound {
            platform: platform.to_string(),
            start: query.start,
            end: query.end,
        })?;

        info!(
            product = %best.title,
            acquisition_date = %best.acquisition_date,
            target = %window.target,
            "Selected {} product",
            platform
        );
        Ok(best.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::{PortError, PortResult};
    use async_trait::async_trait;
    use chrono::{DateTime, TimeZone, Utc};

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn ingested(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, day, hour, 0, 0).unwrap()
    }

    fn product(id: &str, acquired: NaiveDate, ingestion: DateTime<Utc>) -> ImagingProduct {
        ImagingProduct {
            id: id.to_string(),
            title: format!("S1A_{id}"),
            acquisition_date: acquired,
            ingestion_date: ingestion,
            footprint: None,
        }
    }

    fn bbox() -> BoundingBox {
        BoundingBox {
            min_lon: 105.8,
            min_lat: 21.5,
            max_lon: 105.9,
            max_lat: 21.6,
        }
    }

    struct FixedCatalog(PortResult<Vec<ImagingProduct>>);

    #[async_trait]
    impl ImageryCatalog for FixedCatalog {
        async fn search(&self, _query: &CatalogQuery) -> PortResult<Vec<ImagingProduct>> {
            self.0.clone()
        }
    }

    #[test]
    fn window_bounds_are_inclusive() {
        let window = SearchWindow::new(date(2024, 6, 15), 7);
        assert_eq!(window.start(), date(2024, 6, 8));
        assert_eq!(window.end(), date(2024, 6, 22));
        assert!(window.contains(date(2024, 6, 8)));
        assert!(window.contains(date(2024, 6, 22)));
        assert!(!window.contains(date(2024, 6, 23)));

        let single_day = SearchWindow::new(date(2024, 6, 15), 0);
        assert_eq!(single_day.start(), single_day.end());
    }

    #[test]
    fn picks_minimum_day_distance() {
        let window = SearchWindow::new(date(2024, 6, 15), 7);
        let candidates = vec![
            product("a", date(2024, 6, 10), ingested(10, 12)),
            product("b", date(2024, 6, 14), ingested(14, 12)),
            product("c", date(2024, 6, 20), ingested(20, 12)),
        ];
        let best = pick_closest(&candidates, &window).unwrap();
        assert_eq!(best.acquisition_date, date(2024, 6, 14));
    }

    #[test]
    fn tie_goes_to_latest_ingestion() {
        let window = SearchWindow::new(date(2024, 6, 15), 7);
        let candidates = vec![
            product("later", date(2024, 6, 17), ingested(18, 9)),
            product("earlier", date(2024, 6, 13), ingested(13, 9)),
        ];
        assert_eq!(pick_closest(&candidates, &window).unwrap().id, "later");

        // Same answer regardless of the order the catalog returned them in.
        let reversed: Vec<_> = candidates.into_iter().rev().collect();
        assert_eq!(pick_closest(&reversed, &window).unwrap().id, "later");
    }

    #[test]
    fn candidates_outside_the_window_are_ignored() {
        let window = SearchWindow::new(date(2024, 6, 15), 0);
        let candidates = vec![product("x", date(2024, 6, 16), ingested(16, 1))];
        assert!(pick_closest(&candidates, &window).is_none());
    }

    #[tokio::test]
    async fn empty_catalog_result_is_no_product_found() {
        let selector = ProductSelector::new(Arc::new(FixedCatalog(Ok(vec![]))));
        let window = SearchWindow::new(date(2024, 6, 15), 7);
        let err = selector
            .select(&bbox(), &window, "SENTINEL-1", None)
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::NoProductFound {
                platform: "SENTINEL-1".to_string(),
                start: date(2024, 6, 8),
                end: date(2024, 6, 22),
            }
        );
    }

    #[tokio::test]
    async fn unreachable_catalog_is_catalog_unavailable() {
        let selector = ProductSelector::new(Arc::new(FixedCatalog(Err(PortError::Unavailable(
            "connection refused".to_string(),
        )))));
        let window = SearchWindow::new(date(2024, 6, 15), 0);
        let err = selector
            .select(&bbox(), &window, "SENTINEL-2", Some("S2MSI2A"))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            SyncError::CatalogUnavailable("connection refused".to_string())
        );
    }
}
