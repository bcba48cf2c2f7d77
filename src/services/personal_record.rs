// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Personal record tracking for race finishes.
//!
//! Within each (cyclist, race) group exactly one finish carries `is_pr`: the
//! fastest, with ties going to the earliest `date_completed` and then the
//! smallest ID.

use crate::db::Store;
use crate::error::{AppError, Result};
use crate::models::RaceFinish;
use crate::time_utils::{format_seconds_to_time, format_utc_rfc3339, parse_time_to_seconds};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use std::sync::Arc;
use validator::Validate;

/// Whether a new time beats every existing finish in its group.
pub fn is_new_finish_pr(existing: &[RaceFinish], new_time_seconds: u32) -> bool {
    existing
        .iter()
        .all(|f| new_time_seconds < f.finish_time_seconds)
}

/// The finish that should carry the PR flag, if the group is non-empty.
pub fn select_pr(group: &[RaceFinish]) -> Option<&RaceFinish> {
    group
        .iter()
        .min_by(|a, b| {
            a.finish_time_seconds
                .cmp(&b.finish_time_seconds)
                .then(a.date_completed.cmp(&b.date_completed))
                .then_with(|| a.id.cmp(&b.id))
        })
}

/// Flag writes needed to make `group` satisfy the PR invariant.
pub fn pr_flag_changes(group: &[RaceFinish]) -> Vec<(String, bool)> {
    let pr_id = select_pr(group).map(|f| f.id.as_str());
    group
        .iter()
        .filter_map(|f| {
            let should_be_pr = Some(f.id.as_str()) == pr_id;
            (f.is_pr != should_be_pr).then(|| (f.id.clone(), should_be_pr))
        })
        .collect()
}

/// Keeps PR flags consistent after finishes change.
pub struct PrTracker {
    db: Arc<dyn Store>,
}

impl PrTracker {
    pub fn new(db: Arc<dyn Store>) -> Self {
        Self { db }
    }

    /// Re-derive PR flags for one group, writing only the flags that change.
    ///
    /// A failed flag write is logged and skipped; the returned group shows
    /// the flags as stored.
    pub async fn recompute_group(&self, cyclist_id: &str, race_id: &str) -> Result<Vec<RaceFinish>> {
        let mut group = self.db.get_finishes_for_race(cyclist_id, race_id).await?;

        for (finish_id, is_pr) in pr_flag_changes(&group) {
            match self.db.set_pr_flag(&finish_id, is_pr).await {
                Ok(()) => {
                    if let Some(f) = group.iter_mut().find(|f| f.id == finish_id) {
                        f.is_pr = is_pr;
                    }
                }
                Err(e) => {
                    tracing::warn!(
                        cyclist_id,
                        race_id,
                        finish_id = %finish_id,
                        error = %e,
                        "Failed to update PR flag"
                    );
                }
            }
        }

        Ok(group)
    }
}

/// Body of a new finish.
#[derive(Debug, Deserialize, Validate)]
pub struct NewFinish {
    #[validate(range(min = 1900, max = 2100))]
    pub year: i32,
    /// `HH:MM:SS` or `MM:SS`
    #[validate(length(min = 1, max = 16))]
    pub finish_time: String,
    pub date_completed: NaiveDate,
}

/// Partial update of a finish.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct FinishUpdate {
    #[validate(range(min = 1900, max = 2100))]
    pub year: Option<i32>,
    #[validate(length(min = 1, max = 16))]
    pub finish_time: Option<String>,
    pub date_completed: Option<NaiveDate>,
}

/// CRUD on race finishes with PR maintenance.
pub struct RaceFinishService {
    db: Arc<dyn Store>,
    tracker: PrTracker,
}

impl RaceFinishService {
    pub fn new(db: Arc<dyn Store>) -> Self {
        Self {
            tracker: PrTracker::new(db.clone()),
            db,
        }
    }

    /// Finishes of one race, fastest first.
    pub async fn list_finishes(&self, cyclist_id: &str, race_id: &str) -> Result<Vec<RaceFinish>> {
        self.db.get_finishes_for_race(cyclist_id, race_id).await
    }

    pub async fn create_finish(
        &self,
        cyclist_id: &str,
        race_id: &str,
        request: NewFinish,
    ) -> Result<RaceFinish> {
        validate(&request)?;
        let seconds = parse_time_to_seconds(&request.finish_time)?;

        let existing = self.db.get_finishes_for_race(cyclist_id, race_id).await?;

        let finish = RaceFinish {
            id: uuid::Uuid::new_v4().to_string(),
            cyclist_id: cyclist_id.to_string(),
            race_id: race_id.to_string(),
            year: request.year,
            finish_time_seconds: seconds,
            finish_time_display: format_seconds_to_time(seconds),
            is_pr: is_new_finish_pr(&existing, seconds),
            date_completed: request.date_completed,
            created_at: format_utc_rfc3339(Utc::now()),
        };

        self.db.save_finish(&finish).await?;
        tracing::info!(
            cyclist_id,
            race_id,
            finish_id = %finish.id,
            seconds,
            provisional_pr = finish.is_pr,
            "Race finish created"
        );

        Ok(self.recompute_returning(finish).await)
    }

    pub async fn update_finish(
        &self,
        cyclist_id: &str,
        finish_id: &str,
        update: FinishUpdate,
    ) -> Result<RaceFinish> {
        validate(&update)?;
        let mut finish = self.owned_finish(cyclist_id, finish_id).await?;

        let mut time_changed = false;
        if let Some(time) = update.finish_time.as_deref() {
            let seconds = parse_time_to_seconds(time)?;
            time_changed = seconds != finish.finish_time_seconds;
            finish.finish_time_seconds = seconds;
            finish.finish_time_display = format_seconds_to_time(seconds);
        }
        if let Some(year) = update.year {
            finish.year = year;
        }
        // The date is a tie-breaker, so it can move the PR too
        let date_changed = update
            .date_completed
            .is_some_and(|d| d != finish.date_completed);
        if let Some(date) = update.date_completed {
            finish.date_completed = date;
        }

        self.db.save_finish(&finish).await?;
        tracing::info!(cyclist_id, finish_id, time_changed, "Race finish updated");

        if time_changed || date_changed {
            Ok(self.recompute_returning(finish).await)
        } else {
            Ok(finish)
        }
    }

    pub async fn delete_finish(&self, cyclist_id: &str, finish_id: &str) -> Result<()> {
        let finish = self.owned_finish(cyclist_id, finish_id).await?;
        self.db.delete_finish(finish_id).await?;
        tracing::info!(cyclist_id, finish_id, race_id = %finish.race_id, "Race finish deleted");

        if let Err(e) = self
            .tracker
            .recompute_group(cyclist_id, &finish.race_id)
            .await
        {
            tracing::warn!(cyclist_id, race_id = %finish.race_id, error = %e, "PR recompute failed");
        }
        Ok(())
    }

    /// Load a finish, hiding other cyclists' finishes as not found.
    async fn owned_finish(&self, cyclist_id: &str, finish_id: &str) -> Result<RaceFinish> {
        match self.db.get_finish(finish_id).await? {
            Some(f) if f.cyclist_id == cyclist_id => Ok(f),
            _ => Err(AppError::NotFound(format!("Finish {}", finish_id))),
        }
    }

    /// Recompute the finish's group and return its stored version.
    async fn recompute_returning(&self, finish: RaceFinish) -> RaceFinish {
        match self
            .tracker
            .recompute_group(&finish.cyclist_id, &finish.race_id)
            .await
        {
            Ok(group) => group
                .into_iter()
                .find(|f| f.id == finish.id)
                .unwrap_or(finish),
            Err(e) => {
                tracing::warn!(
                    cyclist_id = %finish.cyclist_id,
                    race_id = %finish.race_id,
                    error = %e,
                    "PR recompute failed"
                );
                finish
            }
        }
    }
}

fn validate<T: Validate>(request: &T) -> Result<()> {
    request
        .validate()
        .map_err(|e| AppError::BadRequest(format!("Invalid request: {}", e)))
}
