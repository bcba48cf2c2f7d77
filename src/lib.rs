// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Conquest Tracker: record the mountain passes a cyclist has ridden.
//!
//! This crate provides the backend API that syncs Strava rides into
//! conquest records and keeps race finish personal records up to date.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Store;
use error::AppError;
use services::{
    ActivityFetcher, ConquestReconciler, PassCatalog, RaceFinishService, StravaClient, TokenGuard,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: Arc<dyn Store>,
    pub pass_catalog: PassCatalog,
    pub token_guard: Arc<TokenGuard>,
    pub reconciler: ConquestReconciler,
    pub race_finishes: RaceFinishService,
}

impl AppState {
    /// Wire every service onto one store and one Strava client.
    pub fn build(
        config: Config,
        db: Arc<dyn Store>,
        pass_catalog: PassCatalog,
    ) -> Result<Self, AppError> {
        let client = StravaClient::from_config(&config)?;
        let token_guard = Arc::new(TokenGuard::new(client.clone(), db.clone()));
        let reconciler = ConquestReconciler::new(
            token_guard.clone(),
            ActivityFetcher::new(client),
            db.clone(),
            config.sync_lookback_days,
            config.sync_per_page,
        );

        Ok(Self {
            race_finishes: RaceFinishService::new(db.clone()),
            config,
            db,
            pass_catalog,
            token_guard,
            reconciler,
        })
    }
}
