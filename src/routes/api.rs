// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated cyclists.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{ConquestRecord, CredentialState, RaceFinish};
use crate::routes::auth::{callback_url, sign_state};
use crate::services::{FinishUpdate, NewFinish, SyncResult};
use crate::time_utils::format_utc_rfc3339;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::{Validate, ValidateUrl, ValidationError};

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/strava/connect", get(strava_connect))
        .route("/api/strava/connection", axum::routing::delete(strava_disconnect))
        .route("/api/strava/status", get(strava_status))
        .route("/api/sync", post(sync_conquests))
        .route("/api/conquests", get(list_conquests))
        .route("/api/conquests/{pass_id}", put(put_conquest))
        .route(
            "/api/races/{race_id}/finishes",
            get(list_finishes).post(create_finish),
        )
        .route(
            "/api/finishes/{id}",
            put(update_finish).delete(delete_finish),
        )
}

// ─── Strava Connection ───────────────────────────────────────

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct ConnectResponse {
    pub authorize_url: String,
}

/// Start connecting Strava: hand the browser the consent URL.
async fn strava_connect(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<ConnectResponse>> {
    let oauth_state = sign_state(
        &user.cyclist_id,
        chrono::Utc::now().timestamp(),
        &state.config.oauth_state_key,
    )?;

    let authorize_url = state
        .token_guard
        .connect_url(&callback_url(&state.config.api_url), &oauth_state);

    tracing::info!(cyclist_id = %user.cyclist_id, "Starting Strava connect flow");
    Ok(Json(ConnectResponse { authorize_url }))
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct StravaStatusResponse {
    pub connected: bool,
    pub athlete_id: Option<String>,
    #[cfg_attr(feature = "binding-generation", ts(type = "string"))]
    pub state: CredentialState,
}

async fn strava_status(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<StravaStatusResponse>> {
    let credential = state
        .db
        .get_cyclist(&user.cyclist_id)
        .await?
        .map(|c| c.strava)
        .unwrap_or_default();

    Ok(Json(StravaStatusResponse {
        state: state
            .token_guard
            .credential_state(&user.cyclist_id, &credential),
        connected: credential.connected,
        athlete_id: credential.provider_athlete_id,
    }))
}

/// Disconnect Strava. Safe to call when not connected.
async fn strava_disconnect(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<StravaStatusResponse>> {
    state.token_guard.disconnect(&user.cyclist_id).await?;

    Ok(Json(StravaStatusResponse {
        connected: false,
        athlete_id: None,
        state: CredentialState::Disconnected,
    }))
}

// ─── Conquests ───────────────────────────────────────────────

async fn sync_conquests(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SyncResult>> {
    let result = state
        .reconciler
        .sync(&user.cyclist_id, &state.pass_catalog)
        .await?;
    Ok(Json(result))
}

async fn list_conquests(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<ConquestRecord>>> {
    Ok(Json(state.db.get_conquests(&user.cyclist_id).await?))
}

/// Body of a manually entered conquest.
#[derive(Debug, Deserialize, Validate)]
pub struct ManualConquestRequest {
    pub date_completed: NaiveDate,
    #[validate(length(max = 16))]
    pub time_completed: Option<String>,
    #[validate(length(max = 2000))]
    pub personal_notes: Option<String>,
    #[serde(default)]
    #[validate(length(max = 20), custom(function = "validate_photo_urls"))]
    pub photos: Vec<String>,
}

/// Photos must be absolute http(s) URLs.
fn validate_photo_urls(photos: &[String]) -> std::result::Result<(), ValidationError> {
    let valid = |url: &String| {
        url.len() <= 2048
            && url.validate_url()
            && (url.starts_with("https://") || url.starts_with("http://"))
    };
    if photos.iter().all(valid) {
        Ok(())
    } else {
        Err(ValidationError::new("photo_url"))
    }
}

/// Record (or overwrite) a conquest by hand.
///
/// Overwriting a synced record turns it into a manual one, which sync will
/// never touch again.
async fn put_conquest(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(pass_id): Path<String>,
    Json(body): Json<ManualConquestRequest>,
) -> Result<Json<ConquestRecord>> {
    body.validate()
        .map_err(|e| AppError::BadRequest(format!("Invalid conquest: {}", e)))?;

    if state.pass_catalog.get(&pass_id).is_none() {
        return Err(AppError::NotFound(format!("Pass {}", pass_id)));
    }

    let created_at = state
        .db
        .get_conquests(&user.cyclist_id)
        .await?
        .into_iter()
        .find(|c| c.pass_id == pass_id)
        .map(|c| c.created_at)
        .unwrap_or_else(|| format_utc_rfc3339(chrono::Utc::now()));

    let record = ConquestRecord {
        cyclist_id: user.cyclist_id.clone(),
        pass_id,
        date_completed: body.date_completed,
        time_completed: body.time_completed,
        external_activity_id: None,
        synced_from_external: false,
        personal_notes: body.personal_notes,
        photos: body.photos,
        created_at,
    };

    state
        .db
        .upsert_conquests(std::slice::from_ref(&record))
        .await?;
    tracing::info!(cyclist_id = %user.cyclist_id, pass_id = %record.pass_id, "Manual conquest saved");

    Ok(Json(record))
}

// ─── Race Finishes ───────────────────────────────────────────

async fn list_finishes(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(race_id): Path<String>,
) -> Result<Json<Vec<RaceFinish>>> {
    Ok(Json(
        state
            .race_finishes
            .list_finishes(&user.cyclist_id, &race_id)
            .await?,
    ))
}

async fn create_finish(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(race_id): Path<String>,
    Json(body): Json<NewFinish>,
) -> Result<(StatusCode, Json<RaceFinish>)> {
    let finish = state
        .race_finishes
        .create_finish(&user.cyclist_id, &race_id, body)
        .await?;
    Ok((StatusCode::CREATED, Json(finish)))
}

async fn update_finish(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<FinishUpdate>,
) -> Result<Json<RaceFinish>> {
    Ok(Json(
        state
            .race_finishes
            .update_finish(&user.cyclist_id, &id, body)
            .await?,
    ))
}

async fn delete_finish(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state
        .race_finishes
        .delete_finish(&user.cyclist_id, &id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
