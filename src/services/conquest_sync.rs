// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Conquest sync: turn recent Strava rides into conquest records.
//!
//! Workflow:
//! 1. Load existing conquests (dedup set and already-conquered passes)
//! 2. Get a valid access token from the token guard
//! 3. Fetch one page of activities from the lookback window
//! 4. Match each new eligible ride against the catalog (first match wins)
//! 5. Upsert the new records in one batch
//!
//! Nothing is written unless every network call succeeded, so a failed sync
//! can simply be retried.

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::{ConquestRecord, ExternalActivity};
use crate::services::{ActivityFetcher, PassCatalog, TokenGuard};
use chrono::{Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Outcome of one sync run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncResult {
    pub synced_count: usize,
    pub new_conquests: Vec<ConquestRecord>,
    pub activities_scanned: usize,
    pub skipped_already_synced: usize,
    pub skipped_ineligible: usize,
    /// Activities whose first matching pass was already conquered
    pub skipped_already_conquered: usize,
}

/// Reconciles a cyclist's Strava history with their conquest records.
pub struct ConquestReconciler {
    token_guard: Arc<TokenGuard>,
    fetcher: ActivityFetcher,
    db: Arc<dyn Store>,
    lookback_days: i64,
    per_page: u32,
}

impl ConquestReconciler {
    pub fn new(
        token_guard: Arc<TokenGuard>,
        fetcher: ActivityFetcher,
        db: Arc<dyn Store>,
        lookback_days: i64,
        per_page: u32,
    ) -> Self {
        Self {
            token_guard,
            fetcher,
            db,
            lookback_days,
            per_page,
        }
    }

    /// Run one sync for `cyclist_id` against `catalog`.
    pub async fn sync(&self, cyclist_id: &str, catalog: &PassCatalog) -> Result<SyncResult> {
        tracing::info!(cyclist_id, "Starting conquest sync");

        let existing = self.db.get_conquests(cyclist_id).await.map_err(|e| {
            tracing::error!(cyclist_id, error = %e, "Failed to load existing conquests");
            AppError::PersistenceFailed(e.to_string())
        })?;

        let Some(access_token) = self.token_guard.get_valid_access_token(cyclist_id).await else {
            tracing::info!(cyclist_id, "No usable Strava token, sync unavailable");
            return Err(AppError::TokenUnavailable(
                "Strava is not connected or the connection expired".to_string(),
            ));
        };

        let since = (Utc::now() - Duration::days(self.lookback_days)).timestamp();
        let activities = self
            .fetcher
            .fetch_activities(&access_token, since, 1, self.per_page)
            .await
            .inspect_err(|e| {
                tracing::warn!(cyclist_id, error = %e, "Activity fetch failed");
                // A revoked token must not be served from cache on retry
                self.token_guard.invalidate(cyclist_id);
            })?;

        let result = plan_conquests(cyclist_id, &existing, &activities, catalog);

        if !result.new_conquests.is_empty() {
            self.db
                .upsert_conquests(&result.new_conquests)
                .await
                .map_err(|e| {
                    tracing::error!(cyclist_id, error = %e, "Failed to persist conquests");
                    AppError::PersistenceFailed(e.to_string())
                })?;
        }

        tracing::info!(
            cyclist_id,
            synced = result.synced_count,
            scanned = result.activities_scanned,
            already_synced = result.skipped_already_synced,
            ineligible = result.skipped_ineligible,
            already_conquered = result.skipped_already_conquered,
            "Conquest sync complete"
        );
        Ok(result)
    }
}

/// Decide which conquests a batch of activities produces. No I/O.
pub fn plan_conquests(
    cyclist_id: &str,
    existing: &[ConquestRecord],
    activities: &[ExternalActivity],
    catalog: &PassCatalog,
) -> SyncResult {
    let synced_ids: HashSet<u64> = existing
        .iter()
        .filter_map(|c| c.external_activity_id)
        .collect();
    let mut conquered: HashSet<&str> = existing.iter().map(|c| c.pass_id.as_str()).collect();

    let now = Utc::now().to_rfc3339();
    let mut result = SyncResult {
        activities_scanned: activities.len(),
        ..Default::default()
    };

    for activity in activities {
        if synced_ids.contains(&activity.id) {
            result.skipped_already_synced += 1;
            continue;
        }
        if !activity.activity_type.is_eligible() {
            result.skipped_ineligible += 1;
            continue;
        }

        let Some(pass) = catalog.find_first_match(activity) else {
            continue;
        };

        if !conquered.insert(pass.id.as_str()) {
            tracing::debug!(
                activity_id = activity.id,
                pass_id = %pass.id,
                "Pass already conquered, skipping"
            );
            result.skipped_already_conquered += 1;
            continue;
        }

        tracing::debug!(activity_id = activity.id, pass_id = %pass.id, "New conquest");
        result.new_conquests.push(ConquestRecord {
            cyclist_id: cyclist_id.to_string(),
            pass_id: pass.id.clone(),
            date_completed: activity.start_date.date_naive(),
            time_completed: None,
            external_activity_id: Some(activity.id),
            synced_from_external: true,
            personal_notes: Some(sync_note(activity)),
            photos: Vec::new(),
            created_at: now.clone(),
        });
    }

    result.synced_count = result.new_conquests.len();
    result
}

fn sync_note(activity: &ExternalActivity) -> String {
    format!(
        "Synced from Strava activity \"{}\" (#{})",
        activity.name, activity.id
    )
}
