// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Strava credential lifecycle: connect, refresh, disconnect.
//!
//! [`TokenGuard::get_valid_access_token`] never fails loudly. Missing,
//! revoked or unrefreshable credentials all come back as `None`, which the
//! sync engine reports as "reconnect Strava".

use crate::db::Store;
use crate::error::AppError;
use crate::models::{CredentialState, CredentialUpdate, CyclistCredential};
use crate::services::strava::StravaClient;
use chrono::{DateTime, Utc};
use dashmap::{DashMap, DashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Margin before token expiration when we proactively refresh (5 minutes).
pub const TOKEN_REFRESH_MARGIN_SECS: i64 = 5 * 60;

/// Cached access token with expiry information.
#[derive(Clone)]
pub struct CachedToken {
    access_token: String,
    expires_at: i64,
}

/// Shared token cache keyed by cyclist ID.
pub type TokenCache = Arc<DashMap<String, CachedToken>>;

/// Per-cyclist refresh locks.
pub type RefreshLocks = Arc<DashMap<String, Arc<Mutex<()>>>>;

/// Whether a credential expiring at `expires_at` must be refreshed at `now`.
///
/// A credential without a recorded expiry is treated as expired.
pub fn needs_refresh(expires_at: Option<i64>, now: i64) -> bool {
    match expires_at {
        Some(expiry) => now >= expiry - TOKEN_REFRESH_MARGIN_SECS,
        None => true,
    }
}

/// Owns the Strava credential of every cyclist.
///
/// - In-memory cache of access tokens (avoids a store read per call)
/// - Per-cyclist mutex so only one refresh per cyclist is in flight
/// - Double-check after acquiring the lock (another task may have refreshed)
pub struct TokenGuard {
    client: StravaClient,
    db: Arc<dyn Store>,
    token_cache: TokenCache,
    refresh_locks: RefreshLocks,
    refreshing: DashSet<String>,
}

/// Marks a cyclist as refreshing until dropped, including when the
/// caller's future is cancelled mid-refresh.
struct RefreshingGuard<'a> {
    set: &'a DashSet<String>,
    cyclist_id: String,
}

impl<'a> RefreshingGuard<'a> {
    fn new(set: &'a DashSet<String>, cyclist_id: &str) -> Self {
        set.insert(cyclist_id.to_string());
        Self {
            set,
            cyclist_id: cyclist_id.to_string(),
        }
    }
}

impl Drop for RefreshingGuard<'_> {
    fn drop(&mut self) {
        self.set.remove(&self.cyclist_id);
    }
}

impl TokenGuard {
    pub fn new(client: StravaClient, db: Arc<dyn Store>) -> Self {
        Self {
            client,
            db,
            token_cache: Arc::new(DashMap::new()),
            refresh_locks: Arc::new(DashMap::new()),
            refreshing: DashSet::new(),
        }
    }

    // ─── Token Access ────────────────────────────────────────────────────────

    /// Get an access token that is valid for at least the refresh margin.
    ///
    /// Returns `None` when the cyclist is not connected or the token cannot
    /// be refreshed. The caller must not call Strava in that case.
    pub async fn get_valid_access_token(&self, cyclist_id: &str) -> Option<String> {
        if let Some(token) = self.cached_token(cyclist_id) {
            return Some(token);
        }

        let lock = self
            .refresh_locks
            .entry(cyclist_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        // Another task may have refreshed while we were waiting.
        if let Some(token) = self.cached_token(cyclist_id) {
            return Some(token);
        }

        let credential = match self.db.get_cyclist(cyclist_id).await {
            Ok(Some(cyclist)) => cyclist.strava,
            Ok(None) => {
                tracing::debug!(cyclist_id, "No cyclist profile, Strava not connected");
                return None;
            }
            Err(e) => {
                tracing::warn!(cyclist_id, error = %e, "Failed to load Strava credential");
                return None;
            }
        };

        if credential.state() != CredentialState::Connected {
            self.token_cache.remove(cyclist_id);
            return None;
        }
        let access_token = credential.access_token.clone()?;

        if !needs_refresh(credential.token_expiry_epoch_seconds, Utc::now().timestamp()) {
            if let Some(expires_at) = credential.token_expiry_epoch_seconds {
                self.cache(cyclist_id, &access_token, expires_at);
            }
            return Some(access_token);
        }

        let _refreshing = RefreshingGuard::new(&self.refreshing, cyclist_id);
        self.refresh(cyclist_id, &credential).await
    }

    /// Current state of a cyclist's connection, including in-flight refreshes.
    pub fn credential_state(
        &self,
        cyclist_id: &str,
        credential: &CyclistCredential,
    ) -> CredentialState {
        if self.refreshing.contains(cyclist_id) {
            CredentialState::Refreshing
        } else {
            credential.state()
        }
    }

    /// Forget the cached token so the next call re-reads the store.
    pub fn invalidate(&self, cyclist_id: &str) {
        if self.token_cache.remove(cyclist_id).is_some() {
            tracing::debug!(cyclist_id, "Cached token invalidated");
        }
    }

    fn cached_token(&self, cyclist_id: &str) -> Option<String> {
        let cached = self.token_cache.get(cyclist_id)?;
        if needs_refresh(Some(cached.expires_at), Utc::now().timestamp()) {
            return None;
        }
        Some(cached.access_token.clone())
    }

    fn cache(&self, cyclist_id: &str, access_token: &str, expires_at: i64) {
        self.token_cache.insert(
            cyclist_id.to_string(),
            CachedToken {
                access_token: access_token.to_string(),
                expires_at,
            },
        );
    }

    /// Refresh with Strava and persist the rotated pair. Caller holds the lock.
    async fn refresh(&self, cyclist_id: &str, credential: &CyclistCredential) -> Option<String> {
        let Some(refresh_token) = credential.refresh_token.as_deref() else {
            tracing::warn!(cyclist_id, "Token expired and no refresh token stored");
            return None;
        };

        tracing::info!(cyclist_id, "Access token expiring, refreshing");

        let new_tokens = match self.client.refresh_token(refresh_token).await {
            Ok(t) => t,
            Err(AppError::StravaApi(ref msg)) if msg.contains("invalid_grant") => {
                // Another instance may have rotated the pair first; use theirs
                // if it is still fresh.
                return self.adopt_stored_token(cyclist_id, refresh_token).await;
            }
            Err(e) => {
                tracing::warn!(cyclist_id, error = %e, "Strava token refresh failed");
                return None;
            }
        };

        let updated = credential.apply(CredentialUpdate::Refresh {
            access_token: new_tokens.access_token.clone(),
            refresh_token: new_tokens.refresh_token,
            expires_at: new_tokens.expires_at,
        });

        if let Err(e) = self.db.set_credential(cyclist_id, &updated).await {
            // The new access token is valid either way; keep it for this instance.
            tracing::error!(cyclist_id, error = %e, "Failed to persist refreshed credential");
        }

        self.cache(cyclist_id, &new_tokens.access_token, new_tokens.expires_at);
        tracing::info!(
            cyclist_id,
            expires_at = %DateTime::from_timestamp(new_tokens.expires_at, 0).unwrap_or_default(),
            "Token refreshed and cached"
        );
        Some(new_tokens.access_token)
    }

    /// Handle a rejected refresh grant by re-reading the stored credential.
    async fn adopt_stored_token(&self, cyclist_id: &str, stale_refresh: &str) -> Option<String> {
        let stored = match self.db.get_cyclist(cyclist_id).await {
            Ok(Some(cyclist)) => cyclist.strava,
            _ => return None,
        };

        let rotated = stored.refresh_token.as_deref() != Some(stale_refresh);
        let fresh = !needs_refresh(stored.token_expiry_epoch_seconds, Utc::now().timestamp());

        match (rotated && fresh, stored.access_token, stored.token_expiry_epoch_seconds) {
            (true, Some(token), Some(expires_at)) => {
                tracing::info!(cyclist_id, "Refresh race detected, using stored token");
                self.cache(cyclist_id, &token, expires_at);
                Some(token)
            }
            _ => {
                tracing::warn!(cyclist_id, "Strava rejected refresh grant (revoked?)");
                None
            }
        }
    }

    // ─── Connect / Disconnect ────────────────────────────────────────────────

    /// URL that starts the Strava consent flow. Does not touch tokens.
    pub fn connect_url(&self, redirect_uri: &str, state: &str) -> String {
        self.client.authorize_url(redirect_uri, state)
    }

    /// Exchange an authorization code for a credential (no persistence).
    pub async fn exchange_code(&self, code: &str) -> Result<CyclistCredential, AppError> {
        let response = self.client.exchange_code(code).await.map_err(|e| {
            tracing::warn!(error = %e, "Strava code exchange failed");
            AppError::TokenUnavailable(format!("Authorization code exchange failed: {}", e))
        })?;

        Ok(CyclistCredential::default().apply(CredentialUpdate::Connect {
            provider_athlete_id: response.athlete.id.to_string(),
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at: response.expires_at,
        }))
    }

    /// Exchange a code and store the resulting credential on the cyclist.
    pub async fn connect(
        &self,
        cyclist_id: &str,
        code: &str,
    ) -> Result<CyclistCredential, AppError> {
        let credential = self.exchange_code(code).await?;
        self.db.set_credential(cyclist_id, &credential).await?;

        if let (Some(token), Some(expires_at)) = (
            credential.access_token.as_deref(),
            credential.token_expiry_epoch_seconds,
        ) {
            self.cache(cyclist_id, token, expires_at);
        }

        tracing::info!(
            cyclist_id,
            athlete_id = credential.provider_athlete_id.as_deref().unwrap_or(""),
            "Strava connected"
        );
        Ok(credential)
    }

    /// Clear the cyclist's credential. Idempotent.
    ///
    /// Strava deauthorization is best effort; the local credential is always
    /// cleared.
    pub async fn disconnect(&self, cyclist_id: &str) -> Result<(), AppError> {
        let lock = self
            .refresh_locks
            .entry(cyclist_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        self.token_cache.remove(cyclist_id);

        let Some(cyclist) = self.db.get_cyclist(cyclist_id).await? else {
            return Ok(());
        };

        if let Some(token) = cyclist.strava.access_token.as_deref() {
            if let Err(e) = self.client.deauthorize(token).await {
                tracing::warn!(cyclist_id, error = %e, "Strava deauthorization failed, clearing locally");
            }
        }

        let cleared = cyclist.strava.apply(CredentialUpdate::Disconnect);
        self.db.set_credential(cyclist_id, &cleared).await?;

        tracing::info!(cyclist_id, "Strava disconnected");
        Ok(())
    }
}
