// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! Services talk to storage through the [`Store`] traits; [`FirestoreDb`] is
//! the production backend and [`MemoryDb`] backs tests and local runs.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::AppError;
use crate::models::{ConquestRecord, Cyclist, CyclistCredential, RaceFinish};
use async_trait::async_trait;

/// Collection names as constants.
pub mod collections {
    pub const CYCLISTS: &str = "cyclists";
    /// Keyed by `{cyclist_id}_{pass_id}`
    pub const CONQUESTS: &str = "conquests";
    pub const RACE_FINISHES: &str = "race_finishes";
}

/// Document ID of a conquest: the (cyclist, pass) upsert key.
pub fn conquest_doc_id(cyclist_id: &str, pass_id: &str) -> String {
    format!(
        "{}_{}",
        urlencoding::encode(cyclist_id),
        urlencoding::encode(pass_id)
    )
}

#[async_trait]
pub trait CyclistStore: Send + Sync {
    async fn get_cyclist(&self, cyclist_id: &str) -> Result<Option<Cyclist>, AppError>;

    async fn upsert_cyclist(&self, cyclist: &Cyclist) -> Result<(), AppError>;

    /// Replace the cyclist's whole Strava credential, creating the profile if
    /// it does not exist yet.
    async fn set_credential(
        &self,
        cyclist_id: &str,
        credential: &CyclistCredential,
    ) -> Result<(), AppError>;
}

#[async_trait]
pub trait ConquestStore: Send + Sync {
    /// All conquests of a cyclist, ordered by pass ID.
    async fn get_conquests(&self, cyclist_id: &str) -> Result<Vec<ConquestRecord>, AppError>;

    /// Upsert records keyed on (cyclist_id, pass_id). All or nothing.
    async fn upsert_conquests(&self, records: &[ConquestRecord]) -> Result<(), AppError>;
}

#[async_trait]
pub trait RaceFinishStore: Send + Sync {
    async fn get_finish(&self, finish_id: &str) -> Result<Option<RaceFinish>, AppError>;

    /// Every finish of a (cyclist, race) group, fastest first.
    async fn get_finishes_for_race(
        &self,
        cyclist_id: &str,
        race_id: &str,
    ) -> Result<Vec<RaceFinish>, AppError>;

    /// Insert or overwrite a finish by ID.
    async fn save_finish(&self, finish: &RaceFinish) -> Result<(), AppError>;

    async fn delete_finish(&self, finish_id: &str) -> Result<(), AppError>;

    async fn set_pr_flag(&self, finish_id: &str, is_pr: bool) -> Result<(), AppError>;
}

/// Everything the application needs from storage.
pub trait Store: CyclistStore + ConquestStore + RaceFinishStore {}

impl<T> Store for T where T: CyclistStore + ConquestStore + RaceFinishStore {}
