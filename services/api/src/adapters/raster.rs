//! services/api/src/adapters/raster.rs
//!
//! This module contains the adapter for the raster processing service, which
//! downloads catalog products and computes vegetation and moisture indices.
//! It implements the `RasterProcessor` port from the core crate.

use agri_sat_core::domain::{BoundingBox, DataType, ImagingProduct, IndexStats};
use agri_sat_core::ports::{ArtifactHandle, PortError, PortResult, RasterProcessor};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tracing::info;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements the `RasterProcessor` port over HTTP.
#[derive(Clone)]
pub struct HttpRasterAdapter {
    client: Client,
    base_url: String,
}

impl HttpRasterAdapter {
    /// Creates a new `HttpRasterAdapter`.
    pub fn new(client: Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> PortResult<R>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(format!("{}/{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| PortError::Unavailable(e.to_string()))?;

        let response = check_status(response).await?;
        response
            .json::<R>()
            .await
            .map_err(|e| PortError::Unexpected(format!("Malformed processor response: {}", e)))
    }
}

async fn check_status(response: Response) -> PortResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    let message = format!("processor returned {}: {}", status, body.trim());
    Err(if status.is_server_error() {
        PortError::Unavailable(message)
    } else if status == reqwest::StatusCode::NOT_FOUND {
        PortError::NotFound(message)
    } else {
        PortError::Unexpected(message)
    })
}

//=========================================================================================
// Wire Types
//=========================================================================================

#[derive(Debug, Serialize)]
struct DownloadRequest<'a> {
    product_id: &'a str,
    title: &'a str,
}

#[derive(Debug, Deserialize)]
struct DownloadResponse {
    artifact_id: String,
    path: PathBuf,
}

#[derive(Debug, Serialize)]
struct IndexRequest<'a> {
    artifact_id: &'a str,
    index: &'static str,
    bbox: [f64; 4],
}

#[derive(Debug, Deserialize)]
struct IndexResponse {
    mean: f64,
    min: f64,
    max: f64,
}

/// The processor's name for the index backing each data type.
fn index_name(data_type: DataType) -> &'static str {
    match data_type {
        DataType::Ndvi => "ndvi",
        DataType::SoilMoisture => "soil_moisture_vv",
    }
}

//=========================================================================================
// `RasterProcessor` Trait Implementation
//=========================================================================================

#[async_trait]
impl RasterProcessor for HttpRasterAdapter {
    async fn download(&self, product: &ImagingProduct) -> PortResult<ArtifactHandle> {
        info!(product = %product.title, "Downloading product");
        let request = DownloadRequest {
            product_id: &product.id,
            title: &product.title,
        };
        let response: DownloadResponse = self.post_json("downloads", &request).await?;
        Ok(ArtifactHandle {
            id: response.artifact_id,
            path: response.path,
        })
    }

    async fn compute_index(
        &self,
        artifact: &ArtifactHandle,
        bbox: &BoundingBox,
        data_type: DataType,
    ) -> PortResult<IndexStats> {
        let request = IndexRequest {
            artifact_id: &artifact.id,
            index: index_name(data_type),
            bbox: bbox.to_array(),
        };
        let response: IndexResponse = self.post_json("indices", &request).await?;
        Ok(IndexStats {
            mean: response.mean,
            min: response.min,
            max: response.max,
        })
    }
}
