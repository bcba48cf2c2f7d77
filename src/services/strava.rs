// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava API client.
//!
//! Handles:
//! - Authorization URL construction
//! - Authorization code exchange and token refresh
//! - Activity listing (paginated, time-bounded)
//! - Deauthorization on disconnect
//! - Rate limit / bad token detection

use crate::config::{Config, DEFAULT_STRAVA_API_URL, DEFAULT_STRAVA_OAUTH_URL};
use crate::error::AppError;
use serde::Deserialize;
use std::time::Duration;

/// Scopes requested when connecting. Profile read is optional for matching
/// but lets the UI show the athlete.
pub const STRAVA_SCOPES: &str = "activity:read_all,profile:read_all";

/// Strava API client.
#[derive(Clone)]
pub struct StravaClient {
    http: reqwest::Client,
    api_url: String,
    oauth_url: String,
    client_id: String,
    client_secret: String,
}

impl StravaClient {
    /// Create a new Strava client with OAuth credentials.
    pub fn new(
        client_id: String,
        client_secret: String,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(anyhow::anyhow!("HTTP client init failed: {}", e)))?;

        Ok(Self {
            http,
            api_url: DEFAULT_STRAVA_API_URL.to_string(),
            oauth_url: DEFAULT_STRAVA_OAUTH_URL.to_string(),
            client_id,
            client_secret,
        })
    }

    /// Build a client from application config.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        Ok(Self::new(
            config.strava_client_id.clone(),
            config.strava_client_secret.clone(),
            Duration::from_secs(config.http_timeout_secs),
        )?
        .with_base_urls(&config.strava_api_url, &config.strava_oauth_url))
    }

    /// Point the client at different endpoints (fake provider in tests).
    pub fn with_base_urls(mut self, api_url: &str, oauth_url: &str) -> Self {
        self.api_url = api_url.trim_end_matches('/').to_string();
        self.oauth_url = oauth_url.trim_end_matches('/').to_string();
        self
    }

    /// URL the browser is sent to in order to grant access.
    pub fn authorize_url(&self, redirect_uri: &str, state: &str) -> String {
        format!(
            "{}/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}&approval_prompt=force&state={}",
            self.oauth_url,
            urlencoding::encode(&self.client_id),
            urlencoding::encode(redirect_uri),
            STRAVA_SCOPES,
            urlencoding::encode(state)
        )
    }

    /// Exchange an authorization code for the first token pair.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenExchangeResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("grant_type", "authorization_code"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token exchange failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// Refresh an expired access token.
    pub async fn refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<TokenRefreshResponse, AppError> {
        let response = self
            .http
            .post(format!("{}/token", self.oauth_url))
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("refresh_token", refresh_token),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Token refresh request failed: {}", e)))?;

        self.check_response_json(response).await
    }

    /// List the athlete's activities (one page).
    pub async fn list_activities(
        &self,
        access_token: &str,
        after: Option<i64>, // Unix timestamp
        page: u32,
        per_page: u32,
    ) -> Result<Vec<StravaActivitySummary>, AppError> {
        let url = format!("{}/athlete/activities", self.api_url);

        let mut query = vec![
            ("page", page.to_string()),
            ("per_page", per_page.to_string()),
        ];
        if let Some(after) = after {
            query.push(("after", after.to_string()));
        }

        let response = self
            .http
            .get(&url)
            .bearer_auth(access_token)
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(e.to_string()))?;

        self.check_response_json(response).await
    }

    /// Deauthorize the application for a user.
    ///
    /// This invalidates all access and refresh tokens for the user
    /// and removes the app from their Strava settings.
    pub async fn deauthorize(&self, access_token: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(format!("{}/deauthorize", self.oauth_url))
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| AppError::StravaApi(format!("Deauthorization request failed: {}", e)))?;

        self.check_response(response).await?;
        tracing::info!("Strava deauthorization successful");
        Ok(())
    }

    /// Check response status and return error if not successful.
    async fn check_response(&self, response: reqwest::Response) -> Result<(), AppError> {
        if response.status().is_success() {
            return Ok(());
        }
        Err(Self::error_from_response(response).await)
    }

    /// Check response and parse JSON body.
    async fn check_response_json<T: for<'de> Deserialize<'de>>(
        &self,
        response: reqwest::Response,
    ) -> Result<T, AppError> {
        if !response.status().is_success() {
            return Err(Self::error_from_response(response).await);
        }

        response
            .json()
            .await
            .map_err(|e| AppError::StravaApi(format!("JSON parse error: {}", e)))
    }

    async fn error_from_response(response: reqwest::Response) -> AppError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!("Strava rate limit hit (429)");
            return AppError::StravaApi(AppError::STRAVA_RATE_LIMIT.to_string());
        }

        if status.as_u16() == 401 {
            return AppError::StravaApi(AppError::STRAVA_TOKEN_ERROR.to_string());
        }

        // Revoked or already-rotated refresh tokens come back as 400 invalid_grant
        if body.contains("invalid_grant") {
            return AppError::StravaApi(format!("invalid_grant: HTTP {}", status));
        }

        AppError::StravaApi(format!("HTTP {}: {}", status, body))
    }
}

/// Token refresh response from Strava.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRefreshResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
}

/// Token exchange response from Strava OAuth (includes athlete info).
#[derive(Debug, Clone, Deserialize)]
pub struct TokenExchangeResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: i64,
    pub athlete: StravaAthlete,
}

/// Athlete info from OAuth token exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaAthlete {
    pub id: u64,
    #[serde(default)]
    pub firstname: Option<String>,
    #[serde(default)]
    pub lastname: Option<String>,
}

/// Summary activity for list endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct StravaActivitySummary {
    pub id: u64,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "type")]
    pub activity_type: String,
    pub start_date: String,
    /// `[lat, lng]`, or empty/null without GPS
    #[serde(default)]
    pub start_latlng: Option<Vec<f64>>,
    #[serde(default)]
    pub end_latlng: Option<Vec<f64>>,
}
