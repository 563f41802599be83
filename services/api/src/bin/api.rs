//! services/api/src/bin/api.rs

use agri_sat_core::{
    BatchDriver, FarmSync, PersistenceGate, ProductSelector, SyncProfile, TokioSleeper,
};
use api_lib::{
    adapters::{DbAdapter, HttpRasterAdapter, ODataCatalogAdapter},
    config::Config,
    error::ApiError,
    scheduler::{run_scheduler, SyncJob},
    web::{
        health_handler, list_satellite_data_handler, rest::ApiDoc, trigger_sync_handler,
        AppState,
    },
};
use axum::http::{
    header::{ACCEPT, CONTENT_TYPE},
    Method,
};
use axum::{
    routing::{get, post},
    Router,
};
use sqlx::postgres::PgPoolOptions;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(config.db_pool_max)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let http_client = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()?;
    let catalog_adapter = Arc::new(ODataCatalogAdapter::new(
        http_client.clone(),
        config.catalog_url.clone(),
        config.catalog_token.clone(),
        config.catalog_page_size,
    ));
    let raster_adapter = Arc::new(HttpRasterAdapter::new(
        http_client,
        config.processor_url.clone(),
    ));
    let gate = Arc::new(PersistenceGate::new(db_adapter.clone()));

    // --- 4. Build the Sync Jobs & Start Their Schedulers ---
    let shutdown = CancellationToken::new();
    let mut profiles = vec![SyncProfile::ndvi()];
    if config.sync.soil_moisture_enabled {
        profiles.push(SyncProfile::soil_moisture());
    }

    let mut jobs = HashMap::new();
    for profile in profiles {
        let farm_sync = FarmSync::new(
            ProductSelector::new(catalog_adapter.clone()),
            raster_adapter.clone(),
            gate.clone(),
            profile,
        );
        let driver = BatchDriver::new(
            db_adapter.clone(),
            Arc::new(farm_sync),
            config.sync.retry.clone(),
            Arc::new(TokioSleeper),
        )
        .with_concurrency(config.sync.concurrency);

        let job = Arc::new(SyncJob::new(driver));
        tokio::spawn(run_scheduler(
            job.clone(),
            config.sync.schedule,
            shutdown.child_token(),
        ));
        jobs.insert(job.data_type(), job);
    }

    // --- 5. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        records: db_adapter,
        jobs,
        shutdown: shutdown.clone(),
    });

    // --- 6. Create the Web Router ---
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, ACCEPT]);

    let api_router = Router::new()
        .route("/health", get(health_handler))
        .route(
            "/api/v1/farms/{farm_id}/satellite-data",
            get(list_satellite_data_handler),
        )
        .route("/api/v1/sync/{data_type}", post(trigger_sync_handler))
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 7. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown))
        .await?;

    info!("Server stopped.");
    Ok(())
}

/// Resolves on Ctrl-C and cancels the schedulers and any in-progress runs.
async fn shutdown_signal(shutdown: CancellationToken) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for the shutdown signal: {}", e);
    }
    info!("Shutdown signal received, stopping schedulers...");
    shutdown.cancel();
}
