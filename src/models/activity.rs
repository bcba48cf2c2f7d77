// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Strava activity as seen by one sync pass (never stored).

use crate::models::LatLng;
use chrono::{DateTime, Utc};

/// Strava activity type, reduced to what matters for conquest matching.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActivityType {
    Ride,
    VirtualRide,
    Other(String),
}

impl ActivityType {
    /// Only rides can conquer a pass.
    pub fn is_eligible(&self) -> bool {
        matches!(self, ActivityType::Ride | ActivityType::VirtualRide)
    }
}

impl From<&str> for ActivityType {
    fn from(value: &str) -> Self {
        match value {
            "Ride" => ActivityType::Ride,
            "VirtualRide" => ActivityType::VirtualRide,
            other => ActivityType::Other(other.to_string()),
        }
    }
}

/// Activity fetched from Strava for the duration of one sync.
#[derive(Debug, Clone)]
pub struct ExternalActivity {
    /// Strava activity ID (the dedup key)
    pub id: u64,
    pub name: String,
    pub activity_type: ActivityType,
    pub start_date: DateTime<Utc>,
    pub start_latlng: Option<LatLng>,
    pub end_latlng: Option<LatLng>,
}
