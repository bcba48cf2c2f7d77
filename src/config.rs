// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Cloud Run injects secrets as environment variables via secret bindings,
//! so everything is read once at startup.

use std::env;

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Strava OAuth client ID (public)
    pub strava_client_id: String,
    /// Frontend URL for OAuth redirects
    pub frontend_url: String,
    /// Public base URL of this API (used to build the OAuth callback URL)
    pub api_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Keep all data in memory instead of Firestore (local development)
    pub use_memory_store: bool,
    /// GeoJSON file with the mountain pass catalog
    pub pass_catalog_path: String,
    /// Strava REST API base URL
    pub strava_api_url: String,
    /// Strava OAuth base URL (authorize/token/deauthorize live under it)
    pub strava_oauth_url: String,
    /// Timeout applied to every outbound Strava request
    pub http_timeout_secs: u64,
    /// How far back a sync looks for activities
    pub sync_lookback_days: i64,
    /// Activities requested per sync (single page)
    pub sync_per_page: u32,

    // --- Secrets ---
    /// Strava OAuth client secret
    pub strava_client_secret: String,
    /// JWT signing key shared with the auth backend (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for the OAuth `state` parameter
    pub oauth_state_key: Vec<u8>,
}

pub const DEFAULT_STRAVA_API_URL: &str = "https://www.strava.com/api/v3";
pub const DEFAULT_STRAVA_OAUTH_URL: &str = "https://www.strava.com/oauth";

impl Config {
    /// Config for tests only.
    pub fn test_default() -> Self {
        Self {
            strava_client_id: "test_client_id".to_string(),
            frontend_url: "http://localhost:5173".to_string(),
            api_url: "http://localhost:8080".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            use_memory_store: true,
            pass_catalog_path: "data/passes.geojson".to_string(),
            strava_api_url: DEFAULT_STRAVA_API_URL.to_string(),
            strava_oauth_url: DEFAULT_STRAVA_OAUTH_URL.to_string(),
            http_timeout_secs: 20,
            sync_lookback_days: 365,
            sync_per_page: 100,
            strava_client_secret: "test_secret".to_string(),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            oauth_state_key: b"test_oauth_state_key".to_vec(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let jwt_signing_key = env::var("JWT_SIGNING_KEY")
            .map_err(|_| ConfigError::Missing("JWT_SIGNING_KEY"))?
            .into_bytes();

        Ok(Self {
            strava_client_id: env::var("STRAVA_CLIENT_ID")
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_ID"))?,
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            api_url: env::var("API_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: parse_or("PORT", 8080)?,
            use_memory_store: env::var("CONQUEST_STORE")
                .map(|v| v.eq_ignore_ascii_case("memory"))
                .unwrap_or(false),
            pass_catalog_path: env::var("PASS_CATALOG_PATH")
                .unwrap_or_else(|_| "data/passes.geojson".to_string()),
            strava_api_url: env::var("STRAVA_API_URL")
                .unwrap_or_else(|_| DEFAULT_STRAVA_API_URL.to_string()),
            strava_oauth_url: env::var("STRAVA_OAUTH_URL")
                .unwrap_or_else(|_| DEFAULT_STRAVA_OAUTH_URL.to_string()),
            http_timeout_secs: parse_or("HTTP_TIMEOUT_SECS", 20)?,
            sync_lookback_days: parse_or("SYNC_LOOKBACK_DAYS", 365)?,
            sync_per_page: parse_or("SYNC_PER_PAGE", 100)?,

            strava_client_secret: env::var("STRAVA_CLIENT_SECRET")
                .map(|v| v.trim().to_string())
                .map_err(|_| ConfigError::Missing("STRAVA_CLIENT_SECRET"))?,
            // Defaults to the JWT key when unset.
            oauth_state_key: env::var("OAUTH_STATE_KEY")
                .map(String::into_bytes)
                .unwrap_or_else(|_| jwt_signing_key.clone()),
            jwt_signing_key,
        })
    }
}

/// Parse an optional numeric environment variable.
fn parse_or<T: std::str::FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(name)),
        Err(_) => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}
