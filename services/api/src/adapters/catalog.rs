//! services/api/src/adapters/catalog.rs
//!
//! This module contains the adapter for an OData product catalog (the Copernicus
//! Data Space Ecosystem catalogue exposes this shape). It implements the
//! `ImageryCatalog` port from the core crate.

use agri_sat_core::domain::ImagingProduct;
use agri_sat_core::ports::{CatalogQuery, ImageryCatalog, PortError, PortResult};
use async_trait::async_trait;
use chrono::{DateTime, Days, NaiveDate, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, warn};

/// Upper bound on followed `@odata.nextLink` pages for one search.
const MAX_PAGES: usize = 50;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `ImageryCatalog` port over the OData `Products` endpoint.
#[derive(Clone)]
pub struct ODataCatalogAdapter {
    client: Client,
    base_url: String,
    token: Option<String>,
    page_size: u32,
}

impl ODataCatalogAdapter {
    /// Creates a new `ODataCatalogAdapter`. `base_url` is the OData root, without `/Products`.
    pub fn new(client: Client, base_url: String, token: Option<String>, page_size: u32) -> Self {
        Self {
            client,
            base_url,
            token,
            page_size,
        }
    }

    /// Fetches one page. `request` already carries its URL and query string.
    async fn fetch_page(&self, mut request: reqwest::RequestBuilder) -> PortResult<ProductPage> {
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(%status, "Catalog search failed");
            return Err(status_error(status, &body));
        }

        response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed catalog response: {}", e)))
    }
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Debug, Deserialize)]
struct ProductPage {
    #[serde(default)]
    value: Vec<ODataProduct>,
    #[serde(rename = "@odata.nextLink", default)]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ODataProduct {
    id: String,
    name: String,
    publication_date: DateTime<Utc>,
    content_date: ContentDate,
    #[serde(default)]
    footprint: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContentDate {
    start: DateTime<Utc>,
}

impl ODataProduct {
    fn into_domain(self) -> ImagingProduct {
        ImagingProduct {
            id: self.id,
            title: self.name,
            acquisition_date: self.content_date.start.date_naive(),
            ingestion_date: self.publication_date,
            footprint: self.footprint,
        }
    }
}

//=========================================================================================
// Query Construction
//=========================================================================================

fn odata_instant(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}

/// Builds the `$filter` expression. The end date is inclusive, so the upper bound
/// is midnight of the following day.
fn build_filter(query: &CatalogQuery) -> String {
    let end_exclusive = query
        .end
        .checked_add_days(Days::new(1))
        .unwrap_or(query.end);
    let mut filter = format!(
        "Collection/Name eq '{}' \
         and OData.CSC.Intersects(area=geography'SRID=4326;{}') \
         and ContentDate/Start ge {} \
         and ContentDate/Start lt {}",
        query.platform,
        query.bbox.to_wkt(),
        odata_instant(query.start),
        odata_instant(end_exclusive),
    );
    if let Some(level) = &query.product_level {
        filter.push_str(&format!(
            " and Attributes/OData.CSC.StringAttribute/any(att:att/Name eq 'productType' \
             and att/OData.CSC.StringAttribute/Value eq '{}')",
            level
        ));
    }
    filter
}

fn status_error(status: StatusCode, body: &str) -> PortError {
    let message = format!("catalog returned {}: {}", status, body.trim());
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        PortError::Unavailable(message)
    } else {
        PortError::Unexpected(message)
    }
}

//=========================================================================================
// `ImageryCatalog` Trait Implementation
//=========================================================================================

#[async_trait]
impl ImageryCatalog for ODataCatalogAdapter {
    async fn search(&self, query: &CatalogQuery) -> PortResult<Vec<ImagingProduct>> {
        let filter = build_filter(query);
        let top = self.page_size.to_string();
        debug!(%filter, "Querying imagery catalog");

        let first = self
            .client
            .get(format!("{}/Products", self.base_url))
            .query(&[
                ("$filter", filter.as_str()),
                ("$orderby", "ContentDate/Start asc"),
                ("$top", top.as_str()),
            ]);
        let mut page = self.fetch_page(first).await?;

        let mut products = Vec::new();
        let mut pages = 1;
        loop {
            products.extend(page.value.into_iter().map(ODataProduct::into_domain));
            let Some(next) = page.next_link else {
                break;
            };
            if pages >= MAX_PAGES {
                warn!(
                    pages,
                    collected = products.len(),
                    "Catalog kept paging, stopping early; candidates may be incomplete"
                );
                break;
            }
            page = self.fetch_page(self.client.get(next)).await?;
            pages += 1;
        }

        debug!(pages, count = products.len(), "Catalog search complete");
        Ok(products)
    }
}
