// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod activity_fetcher;
pub mod conquest_sync;
pub mod geo_matcher;
pub mod pass_catalog;
pub mod personal_record;
pub mod strava;
pub mod token_guard;

pub use activity_fetcher::ActivityFetcher;
pub use conquest_sync::{ConquestReconciler, SyncResult};
pub use pass_catalog::{CatalogError, PassCatalog};
pub use personal_record::{FinishUpdate, NewFinish, PrTracker, RaceFinishService};
pub use strava::StravaClient;
pub use token_guard::TokenGuard;
