// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Mountain pass catalog loading and lookup.

use crate::models::{ExternalActivity, LatLng, MountainPass};
use crate::services::geo_matcher;
use geojson::GeoJson;
use std::fs;
use std::path::Path;

/// Read-only catalog of mountain passes, in file order.
///
/// Order matters: an activity conquers the first pass it matches.
#[derive(Debug, Default, Clone)]
pub struct PassCatalog {
    passes: Vec<MountainPass>,
}

impl PassCatalog {
    /// Build a catalog from passes already in memory.
    pub fn from_passes(passes: Vec<MountainPass>) -> Self {
        Self { passes }
    }

    /// Load passes from a GeoJSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let json_data =
            fs::read_to_string(path.as_ref()).map_err(|e| CatalogError::IoError(e.to_string()))?;
        Self::load_from_json(&json_data)
    }

    /// Load passes from a GeoJSON `FeatureCollection` of `Point` features.
    pub fn load_from_json(json_data: &str) -> Result<Self, CatalogError> {
        let geojson: GeoJson = json_data
            .parse()
            .map_err(|e: geojson::Error| CatalogError::ParseError(e.to_string()))?;

        let GeoJson::FeatureCollection(collection) = geojson else {
            return Err(CatalogError::ParseError(
                "expected a FeatureCollection".to_string(),
            ));
        };

        let mut passes = Vec::new();

        for feature in collection.features {
            // Numeric IDs are accepted and stringified
            let id = feature.property("id").and_then(|v| {
                v.as_str()
                    .map(str::to_string)
                    .or_else(|| v.as_i64().map(|n| n.to_string()))
            });

            let Some(id) = id.filter(|id| !id.is_empty()) else {
                tracing::warn!("Skipping catalog feature without id");
                continue;
            };

            let text = |key: &str| {
                feature
                    .property(key)
                    .and_then(|v| v.as_str())
                    .map(str::to_string)
            };
            let name = text("name").unwrap_or_else(|| id.clone());
            let country = text("country");
            let region = text("region");
            let altitude_m = feature.property("altitude_m").and_then(|v| v.as_f64());

            let Some(geom) = feature.geometry else {
                tracing::warn!(pass_id = %id, "Skipping catalog feature without geometry");
                continue;
            };

            let point: geo::Point<f64> = geom
                .value
                .try_into()
                .map_err(|_| CatalogError::UnsupportedGeometry(id.clone()))?;

            passes.push(MountainPass {
                id,
                name,
                coordinates: LatLng::from(point),
                country,
                region,
                altitude_m,
            });
        }

        tracing::info!(count = passes.len(), "Loaded mountain passes");
        Ok(Self { passes })
    }

    /// Get the list of passes in catalog order.
    pub fn passes(&self) -> &[MountainPass] {
        &self.passes
    }

    pub fn get(&self, pass_id: &str) -> Option<&MountainPass> {
        self.passes.iter().find(|p| p.id == pass_id)
    }

    /// First pass (catalog order) the activity visited.
    pub fn find_first_match(&self, activity: &ExternalActivity) -> Option<&MountainPass> {
        self.passes
            .iter()
            .find(|pass| geo_matcher::matches(activity, pass))
    }
}

/// Errors from catalog loading.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Failed to read file: {0}")]
    IoError(String),

    #[error("Failed to parse GeoJSON: {0}")]
    ParseError(String),

    #[error("Unsupported geometry for pass {0} (expected Point)")]
    UnsupportedGeometry(String),
}
