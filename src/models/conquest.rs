// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Conquest records: one per (cyclist, pass).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// A cyclist's claim to have completed a mountain pass.
///
/// Stored at `conquests/{cyclist_id}_{pass_id}`, which makes every write an
/// upsert on (cyclist, pass).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ConquestRecord {
    pub cyclist_id: String,
    pub pass_id: String,
    pub date_completed: NaiveDate,
    /// Free-form time entered by the cyclist (e.g. "02:41:10")
    pub time_completed: Option<String>,
    /// Strava activity the conquest came from; present iff synced
    #[cfg_attr(feature = "binding-generation", ts(type = "number | null"))]
    pub external_activity_id: Option<u64>,
    pub synced_from_external: bool,
    pub personal_notes: Option<String>,
    /// Photo URLs in display order
    #[serde(default)]
    pub photos: Vec<String>,
    pub created_at: String,
}

impl ConquestRecord {
    /// Whether the cyclist entered this record by hand.
    pub fn is_manual(&self) -> bool {
        !self.synced_from_external
    }
}
