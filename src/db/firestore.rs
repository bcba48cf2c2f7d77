// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Cyclists (profile + embedded Strava credential)
//! - Conquests (keyed by cyclist and pass)
//! - Race finishes

use crate::db::{collections, conquest_doc_id, ConquestStore, CyclistStore, RaceFinishStore};
use crate::error::AppError;
use crate::models::{ConquestRecord, Cyclist, CyclistCredential, RaceFinish};
use async_trait::async_trait;
use firestore::paths;
use serde::{Deserialize, Serialize};

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Partial race finish document carrying only the PR flag.
#[derive(Serialize, Deserialize)]
struct PrFlag {
    is_pr: bool,
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id).await.map_err(|e| {
            AppError::PersistenceFailed(format!("Failed to connect to Firestore: {}", e))
        })?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::PersistenceFailed(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client.as_ref().ok_or_else(|| {
            AppError::PersistenceFailed("Database not connected (offline mode)".to_string())
        })
    }
}

fn db_err(e: impl std::fmt::Display) -> AppError {
    AppError::PersistenceFailed(e.to_string())
}

// ─── Cyclist Operations ──────────────────────────────────────

#[async_trait]
impl CyclistStore for FirestoreDb {
    async fn get_cyclist(&self, cyclist_id: &str) -> Result<Option<Cyclist>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::CYCLISTS)
            .obj()
            .one(cyclist_id)
            .await
            .map_err(db_err)
    }

    async fn upsert_cyclist(&self, cyclist: &Cyclist) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::CYCLISTS)
            .document_id(&cyclist.id)
            .object(cyclist)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn set_credential(
        &self,
        cyclist_id: &str,
        credential: &CyclistCredential,
    ) -> Result<(), AppError> {
        // Fetch-modify-write keeps the other profile fields intact
        let mut cyclist = self
            .get_cyclist(cyclist_id)
            .await?
            .unwrap_or_else(|| Cyclist::new(cyclist_id));
        cyclist.strava = credential.clone();
        cyclist.updated_at = chrono::Utc::now().to_rfc3339();
        self.upsert_cyclist(&cyclist).await
    }
}

// ─── Conquest Operations ─────────────────────────────────────

#[async_trait]
impl ConquestStore for FirestoreDb {
    /// Needs the `conquests (cyclist_id, pass_id)` composite index from
    /// `firestore.indexes.json`.
    async fn get_conquests(&self, cyclist_id: &str) -> Result<Vec<ConquestRecord>, AppError> {
        let cyclist_id = cyclist_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::CONQUESTS)
            .filter(move |q| q.for_all([q.field("cyclist_id").eq(cyclist_id.clone())]))
            .order_by([("pass_id", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    /// Upserts run in one transaction per 400 records. Sync batches are at
    /// most one page of activities, so in practice this is a single commit.
    async fn upsert_conquests(&self, records: &[ConquestRecord]) -> Result<(), AppError> {
        let client = self.get_client()?;

        for chunk in records.chunks(BATCH_SIZE) {
            let mut transaction = client.begin_transaction().await.map_err(|e| {
                AppError::PersistenceFailed(format!("Failed to begin transaction: {}", e))
            })?;

            for record in chunk {
                client
                    .fluent()
                    .update()
                    .in_col(collections::CONQUESTS)
                    .document_id(conquest_doc_id(&record.cyclist_id, &record.pass_id))
                    .object(record)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::PersistenceFailed(format!(
                            "Failed to add conquest to transaction: {}",
                            e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::PersistenceFailed(format!("Transaction commit failed: {}", e))
            })?;
        }

        tracing::debug!(count = records.len(), "Conquests upserted");
        Ok(())
    }
}

// ─── Race Finish Operations ──────────────────────────────────

#[async_trait]
impl RaceFinishStore for FirestoreDb {
    async fn get_finish(&self, finish_id: &str) -> Result<Option<RaceFinish>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::RACE_FINISHES)
            .obj()
            .one(finish_id)
            .await
            .map_err(db_err)
    }

    /// Needs the `race_finishes (cyclist_id, race_id, finish_time_seconds)`
    /// composite index from `firestore.indexes.json`.
    async fn get_finishes_for_race(
        &self,
        cyclist_id: &str,
        race_id: &str,
    ) -> Result<Vec<RaceFinish>, AppError> {
        let cyclist_id = cyclist_id.to_string();
        let race_id = race_id.to_string();
        self.get_client()?
            .fluent()
            .select()
            .from(collections::RACE_FINISHES)
            .filter(move |q| {
                q.for_all([
                    q.field("cyclist_id").eq(cyclist_id.clone()),
                    q.field("race_id").eq(race_id.clone()),
                ])
            })
            .order_by([(
                "finish_time_seconds",
                firestore::FirestoreQueryDirection::Ascending,
            )])
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    async fn save_finish(&self, finish: &RaceFinish) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::RACE_FINISHES)
            .document_id(&finish.id)
            .object(finish)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn delete_finish(&self, finish_id: &str) -> Result<(), AppError> {
        self.get_client()?
            .fluent()
            .delete()
            .from(collections::RACE_FINISHES)
            .document_id(finish_id)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    async fn set_pr_flag(&self, finish_id: &str, is_pr: bool) -> Result<(), AppError> {
        // Only `is_pr` is written; the rest of the document belongs to finish edits.
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .fields(paths!(PrFlag::{is_pr}))
            .in_col(collections::RACE_FINISHES)
            .precondition(firestore::FirestoreWritePrecondition::Exists(true))
            .document_id(finish_id)
            .object(&PrFlag { is_pr })
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }
}
