// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Conquest Tracker API Server
//!
//! Syncs Strava rides into mountain pass conquests and tracks race PRs.

use conquest_tracker::{
    config::Config,
    db::{FirestoreDb, MemoryDb, Store},
    services::PassCatalog,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging()?;

    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Conquest Tracker API");

    let db: Arc<dyn Store> = if config.use_memory_store {
        tracing::warn!("Using in-memory store, data is lost on restart");
        Arc::new(MemoryDb::new())
    } else {
        Arc::new(FirestoreDb::new(&config.gcp_project_id).await?)
    };

    tracing::info!(path = %config.pass_catalog_path, "Loading pass catalog");
    let pass_catalog = PassCatalog::load_from_file(&config.pass_catalog_path)?;
    tracing::info!(count = pass_catalog.passes().len(), "Pass catalog loaded");

    let state = Arc::new(AppState::build(config.clone(), db, pass_catalog)?);

    let app = conquest_tracker::routes::create_router(state);

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() -> Result<(), Box<dyn std::error::Error>> {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("conquest_tracker=debug".parse()?)
                .add_directive("info".parse()?),
        )
        .with(format)
        .init();
    Ok(())
}
