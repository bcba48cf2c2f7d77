// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application error types with consistent API responses.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Application error type that converts to HTTP responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Authentication required")]
    Unauthorized,

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// No usable Strava credential: never connected, disconnected, or the
    /// refresh grant was rejected. The user has to reconnect.
    #[error("Strava connection unavailable: {0}")]
    TokenUnavailable(String),

    /// Transient failure talking to the Strava activities endpoint.
    #[error("Failed to fetch activities: {0}")]
    ActivityFetchFailed(String),

    #[error("Invalid time format: {0}")]
    InvalidTimeFormat(String),

    #[error("Persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("Strava API error: {0}")]
    StravaApi(String),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Message used when Strava rejects a token (HTTP 401).
    pub const STRAVA_TOKEN_ERROR: &'static str = "Strava token invalid or expired";

    /// Message used when Strava rate limits us (HTTP 429).
    pub const STRAVA_RATE_LIMIT: &'static str = "Strava rate limit exceeded";

    /// Whether a Strava error means the token itself is bad.
    pub fn is_strava_token_error(&self) -> bool {
        match self {
            AppError::StravaApi(msg) => {
                let msg = msg.to_lowercase();
                msg.contains("token") || msg.contains("invalid")
            }
            _ => false,
        }
    }

    /// Whether the user can simply try the same action again later.
    pub fn is_retryable(&self) -> bool {
        match self {
            AppError::ActivityFetchFailed(_) => true,
            AppError::StravaApi(msg) => msg == Self::STRAVA_RATE_LIMIT,
            _ => false,
        }
    }
}

/// JSON error response body
#[derive(Serialize)]
struct ErrorResponse {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
    retryable: bool,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let retryable = self.is_retryable();
        let (status, error, details) = match &self {
            AppError::Unauthorized => (StatusCode::UNAUTHORIZED, "unauthorized", None),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", Some(msg.clone())),
            AppError::BadRequest(msg) => {
                (StatusCode::BAD_REQUEST, "bad_request", Some(msg.clone()))
            }
            AppError::TokenUnavailable(msg) => {
                (StatusCode::CONFLICT, "token_unavailable", Some(msg.clone()))
            }
            AppError::ActivityFetchFailed(msg) => {
                tracing::warn!(error = %msg, "Activity fetch failed");
                (
                    StatusCode::BAD_GATEWAY,
                    "activity_fetch_failed",
                    Some(msg.clone()),
                )
            }
            AppError::InvalidTimeFormat(msg) => (
                StatusCode::BAD_REQUEST,
                "invalid_time_format",
                Some(msg.clone()),
            ),
            AppError::PersistenceFailed(msg) => {
                tracing::error!(error = %msg, "Persistence error");
                (StatusCode::INTERNAL_SERVER_ERROR, "persistence_failed", None)
            }
            AppError::StravaApi(msg) => {
                (StatusCode::BAD_GATEWAY, "strava_error", Some(msg.clone()))
            }
            AppError::Internal(err) => {
                tracing::error!(error = %err, "Internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, "internal_error", None)
            }
        };

        let body = ErrorResponse {
            error: error.to_string(),
            details,
            retryable,
        };

        (status, Json(body)).into_response()
    }
}

/// Result type alias for handlers
pub type Result<T> = std::result::Result<T, AppError>;
