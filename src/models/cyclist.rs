// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Cyclist profile and the embedded Strava credential.

use serde::{Deserialize, Serialize};

/// Cyclist profile stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cyclist {
    /// Cyclist ID issued by the auth backend (also used as document ID)
    pub id: String,
    /// Display name, if the auth backend shared one
    pub display_name: Option<String>,
    /// Strava connection
    #[serde(default)]
    pub strava: CyclistCredential,
    /// When the profile was created
    pub created_at: String,
    /// Last time the profile was written
    pub updated_at: String,
}

impl Cyclist {
    /// Fresh profile with no Strava connection.
    pub fn new(id: impl Into<String>) -> Self {
        let now = chrono::Utc::now().to_rfc3339();
        Self {
            id: id.into(),
            display_name: None,
            strava: CyclistCredential::default(),
            created_at: now.clone(),
            updated_at: now,
        }
    }
}

/// Strava OAuth credential embedded in the cyclist profile.
///
/// Only [`CyclistCredential::apply`] changes it, so every write replaces the
/// whole credential at once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CyclistCredential {
    pub connected: bool,
    pub provider_athlete_id: Option<String>,
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
    /// Access token expiry (Unix seconds)
    pub token_expiry_epoch_seconds: Option<i64>,
}

/// Lifecycle of a Strava connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialState {
    Disconnected,
    Connected,
    /// A token refresh for this cyclist is in flight.
    Refreshing,
}

/// A whole-credential transition.
#[derive(Debug, Clone)]
pub enum CredentialUpdate {
    /// Authorization code exchanged for the first token pair.
    Connect {
        provider_athlete_id: String,
        access_token: String,
        refresh_token: String,
        expires_at: i64,
    },
    /// Token pair rotated by a refresh.
    Refresh {
        access_token: String,
        refresh_token: String,
        expires_at: i64,
    },
    Disconnect,
}

impl CyclistCredential {
    /// Resting state of the credential (never `Refreshing`; that is tracked by
    /// the token guard while a refresh runs).
    pub fn state(&self) -> CredentialState {
        if self.connected && self.access_token.is_some() {
            CredentialState::Connected
        } else {
            CredentialState::Disconnected
        }
    }

    /// Apply a transition, producing the replacement credential.
    pub fn apply(&self, update: CredentialUpdate) -> CyclistCredential {
        match update {
            CredentialUpdate::Connect {
                provider_athlete_id,
                access_token,
                refresh_token,
                expires_at,
            } => CyclistCredential {
                connected: true,
                provider_athlete_id: Some(provider_athlete_id),
                access_token: Some(access_token),
                refresh_token: Some(refresh_token),
                token_expiry_epoch_seconds: Some(expires_at),
            },
            CredentialUpdate::Refresh {
                access_token,
                refresh_token,
                expires_at,
            } => CyclistCredential {
                connected: true,
                provider_athlete_id: self.provider_athlete_id.clone(),
                access_token: Some(access_token),
                refresh_token: Some(refresh_token),
                token_expiry_epoch_seconds: Some(expires_at),
            },
            CredentialUpdate::Disconnect => CyclistCredential::default(),
        }
    }
}
