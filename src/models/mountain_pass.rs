// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Mountain pass catalog entries.

use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

/// WGS84 coordinate in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct LatLng {
    pub lat: f64,
    pub lng: f64,
}

impl LatLng {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Build from Strava's `[lat, lng]` pair. Strava sends `[]` for
    /// activities without GPS.
    pub fn from_pair(pair: &[f64]) -> Option<Self> {
        match pair {
            [lat, lng] => Some(Self::new(*lat, *lng)),
            _ => None,
        }
    }
}

impl From<geo::Point<f64>> for LatLng {
    fn from(point: geo::Point<f64>) -> Self {
        // geo points are (x = longitude, y = latitude)
        Self::new(point.y(), point.x())
    }
}

/// A named mountain pass from the reference catalog.
#[derive(Debug, Clone, Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct MountainPass {
    /// Stable catalog ID (e.g., "stelvio")
    pub id: String,
    /// Display name (e.g., "Passo dello Stelvio")
    pub name: String,
    pub coordinates: LatLng,
    pub country: Option<String>,
    pub region: Option<String>,
    /// Summit altitude in meters
    pub altitude_m: Option<f64>,
}
