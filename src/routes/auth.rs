// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava connection OAuth routes.
//!
//! The connect flow is started by an authenticated cyclist (see
//! `routes::api`), so the OAuth `state` carries the cyclist ID, signed with
//! HMAC-SHA256, and the public callback trusts nothing else.

use axum::{
    extract::{Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;
use std::sync::Arc;

use crate::error::{AppError, Result};
use crate::AppState;

type HmacSha256 = Hmac<Sha256>;

/// How long a signed state stays valid.
pub const STATE_MAX_AGE_SECS: i64 = 10 * 60;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/strava/callback", get(auth_callback))
}

/// Callback URL registered with Strava.
pub fn callback_url(api_url: &str) -> String {
    format!("{}/auth/strava/callback", api_url.trim_end_matches('/'))
}

/// Sign `cyclist_id|timestamp_hex` and encode it for the URL.
pub fn sign_state(cyclist_id: &str, timestamp: i64, secret: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", cyclist_id, timestamp);

    let mut mac = HmacSha256::new_from_slice(secret)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = hex::encode(mac.finalize().into_bytes());

    Ok(URL_SAFE_NO_PAD.encode(format!("{}|{}", payload, signature)))
}

/// Verify a state parameter and return the cyclist ID it was issued for.
pub fn verify_state(state: &str, secret: &[u8], now: i64) -> Option<String> {
    let bytes = URL_SAFE_NO_PAD.decode(state).ok()?;
    let state_str = String::from_utf8(bytes).ok()?;

    // Split from the right: the cyclist ID is opaque
    let mut parts = state_str.rsplitn(3, '|');
    let signature_hex = parts.next()?;
    let timestamp_hex = parts.next()?;
    let cyclist_id = parts.next()?;

    let signature = hex::decode(signature_hex).ok()?;
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(format!("{}|{}", cyclist_id, timestamp_hex).as_bytes());
    if mac.verify_slice(&signature).is_err() {
        tracing::error!("OAuth state signature mismatch! Potential tampering.");
        return None;
    }

    let issued_at = i64::from_str_radix(timestamp_hex, 16).ok()?;
    if now - issued_at > STATE_MAX_AGE_SECS || issued_at > now + 60 {
        tracing::warn!(cyclist_id, "OAuth state expired");
        return None;
    }

    (!cyclist_id.is_empty()).then(|| cyclist_id.to_string())
}

#[derive(Deserialize)]
pub struct CallbackParams {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// OAuth callback: exchange the code and store the credential.
///
/// Always redirects to the frontend settings page with the outcome.
async fn auth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Redirect {
    let settings_url = format!(
        "{}/settings",
        state.config.frontend_url.trim_end_matches('/')
    );
    let outcome = |status: &str| Redirect::temporary(&format!("{}?strava={}", settings_url, status));

    if let Some(error) = params.error {
        tracing::warn!(error = %error, "OAuth error from Strava");
        return outcome("error");
    }

    let now = chrono::Utc::now().timestamp();
    let Some(cyclist_id) = params
        .state
        .as_deref()
        .and_then(|s| verify_state(s, &state.config.oauth_state_key, now))
    else {
        tracing::warn!("Invalid or missing OAuth state");
        return outcome("error");
    };

    let Some(code) = params.code.filter(|c| !c.is_empty()) else {
        tracing::warn!(cyclist_id = %cyclist_id, "OAuth callback without code");
        return outcome("error");
    };

    match state.token_guard.connect(&cyclist_id, &code).await {
        Ok(_) => outcome("connected"),
        Err(e) => {
            tracing::warn!(cyclist_id = %cyclist_id, error = %e, "Strava connect failed");
            outcome("error")
        }
    }
}
