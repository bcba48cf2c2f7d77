// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Fetches a cyclist's recent activities from Strava.

use crate::error::AppError;
use crate::models::{ActivityType, ExternalActivity, LatLng};
use crate::services::strava::{StravaActivitySummary, StravaClient};
use chrono::{DateTime, Utc};

/// Thin wrapper over the activities endpoint that speaks in
/// [`ExternalActivity`] and reports every failure as `ActivityFetchFailed`.
#[derive(Clone)]
pub struct ActivityFetcher {
    client: StravaClient,
}

impl ActivityFetcher {
    pub fn new(client: StravaClient) -> Self {
        Self { client }
    }

    /// Fetch one page of activities started after `since` (Unix seconds).
    ///
    /// An empty vector means "no activities", never "request failed".
    pub async fn fetch_activities(
        &self,
        access_token: &str,
        since: i64,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<ExternalActivity>, AppError> {
        let summaries = self
            .client
            .list_activities(access_token, Some(since), page, per_page)
            .await
            .map_err(|e| {
                if e.is_strava_token_error() {
                    tracing::warn!(error = %e, "Strava rejected the access token");
                }
                AppError::ActivityFetchFailed(e.to_string())
            })?;

        let activities = summaries
            .into_iter()
            .map(to_external_activity)
            .collect::<Result<Vec<_>, _>>()?;

        tracing::debug!(count = activities.len(), page, since, "Fetched activities");
        Ok(activities)
    }
}

fn to_external_activity(summary: StravaActivitySummary) -> Result<ExternalActivity, AppError> {
    let start_date = DateTime::parse_from_rfc3339(&summary.start_date)
        .map_err(|e| {
            AppError::ActivityFetchFailed(format!(
                "Invalid start_date for activity {}: {}",
                summary.id, e
            ))
        })?
        .with_timezone(&Utc);

    Ok(ExternalActivity {
        id: summary.id,
        activity_type: ActivityType::from(summary.activity_type.as_str()),
        name: summary.name,
        start_date,
        start_latlng: summary.start_latlng.as_deref().and_then(LatLng::from_pair),
        end_latlng: summary.end_latlng.as_deref().and_then(LatLng::from_pair),
    })
}
