// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Race finish times.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// One finish of a race by a cyclist.
///
/// `is_pr` is derived: the PR tracker rewrites it for the whole
/// (cyclist, race) group after every insert, update or delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct RaceFinish {
    pub id: String,
    pub cyclist_id: String,
    pub race_id: String,
    pub year: i32,
    pub finish_time_seconds: u32,
    /// Normalized display form ("HH:MM:SS" or "MM:SS")
    pub finish_time_display: String,
    #[serde(default)]
    pub is_pr: bool,
    pub date_completed: NaiveDate,
    pub created_at: String,
}
