// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Decides whether an activity visited a mountain pass.
//!
//! Pure functions only. An activity "visits" a pass when its start or end
//! point lies within [`MATCH_RADIUS_KM`] of the pass (great-circle distance,
//! boundary inclusive).

use crate::models::{ExternalActivity, LatLng, MountainPass};

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Maximum distance at which an endpoint counts as visiting a pass.
pub const MATCH_RADIUS_KM: f64 = 5.0;

/// Great-circle distance between two coordinates in kilometers.
pub fn haversine_km(a: LatLng, b: LatLng) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

pub fn within_matching_radius(distance_km: f64) -> bool {
    distance_km <= MATCH_RADIUS_KM
}

/// Whether `activity` started or ended within range of `pass`.
pub fn matches(activity: &ExternalActivity, pass: &MountainPass) -> bool {
    [activity.start_latlng, activity.end_latlng]
        .into_iter()
        .flatten()
        .any(|point| within_matching_radius(haversine_km(point, pass.coordinates)))
}
