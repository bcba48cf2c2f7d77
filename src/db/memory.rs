// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-memory store for tests and local development (`CONQUEST_STORE=memory`).

use crate::db::{ConquestStore, CyclistStore, RaceFinishStore};
use crate::error::AppError;
use crate::models::{ConquestRecord, Cyclist, CyclistCredential, RaceFinish};
use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// DashMap-backed implementation of every store trait.
#[derive(Default)]
pub struct MemoryDb {
    cyclists: DashMap<String, Cyclist>,
    /// Keyed by (cyclist_id, pass_id)
    conquests: DashMap<(String, String), ConquestRecord>,
    finishes: DashMap<String, RaceFinish>,
    pr_flag_writes: AtomicUsize,
    fail_pr_flag_writes: AtomicBool,
    fail_conquest_writes: AtomicBool,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `set_pr_flag` calls that reached storage.
    pub fn pr_flag_writes(&self) -> usize {
        self.pr_flag_writes.load(Ordering::SeqCst)
    }

    /// Make every `set_pr_flag` call fail (simulates a flaky backend).
    pub fn set_fail_pr_flag_writes(&self, fail: bool) {
        self.fail_pr_flag_writes.store(fail, Ordering::SeqCst);
    }

    /// Make every `upsert_conquests` call fail without writing anything.
    pub fn set_fail_conquest_writes(&self, fail: bool) {
        self.fail_conquest_writes.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl CyclistStore for MemoryDb {
    async fn get_cyclist(&self, cyclist_id: &str) -> Result<Option<Cyclist>, AppError> {
        Ok(self.cyclists.get(cyclist_id).map(|c| c.clone()))
    }

    async fn upsert_cyclist(&self, cyclist: &Cyclist) -> Result<(), AppError> {
        self.cyclists.insert(cyclist.id.clone(), cyclist.clone());
        Ok(())
    }

    async fn set_credential(
        &self,
        cyclist_id: &str,
        credential: &CyclistCredential,
    ) -> Result<(), AppError> {
        let mut entry = self
            .cyclists
            .entry(cyclist_id.to_string())
            .or_insert_with(|| Cyclist::new(cyclist_id));
        entry.strava = credential.clone();
        entry.updated_at = chrono::Utc::now().to_rfc3339();
        Ok(())
    }
}

#[async_trait]
impl ConquestStore for MemoryDb {
    async fn get_conquests(&self, cyclist_id: &str) -> Result<Vec<ConquestRecord>, AppError> {
        let mut records: Vec<ConquestRecord> = self
            .conquests
            .iter()
            .filter(|entry| entry.key().0 == cyclist_id)
            .map(|entry| entry.value().clone())
            .collect();
        records.sort_by(|a, b| a.pass_id.cmp(&b.pass_id));
        Ok(records)
    }

    async fn upsert_conquests(&self, records: &[ConquestRecord]) -> Result<(), AppError> {
        if self.fail_conquest_writes.load(Ordering::SeqCst) {
            return Err(AppError::PersistenceFailed(
                "Simulated conquest write failure".to_string(),
            ));
        }
        for record in records {
            self.conquests.insert(
                (record.cyclist_id.clone(), record.pass_id.clone()),
                record.clone(),
            );
        }
        Ok(())
    }
}

#[async_trait]
impl RaceFinishStore for MemoryDb {
    async fn get_finish(&self, finish_id: &str) -> Result<Option<RaceFinish>, AppError> {
        Ok(self.finishes.get(finish_id).map(|f| f.clone()))
    }

    async fn get_finishes_for_race(
        &self,
        cyclist_id: &str,
        race_id: &str,
    ) -> Result<Vec<RaceFinish>, AppError> {
        let mut finishes: Vec<RaceFinish> = self
            .finishes
            .iter()
            .filter(|f| f.cyclist_id == cyclist_id && f.race_id == race_id)
            .map(|f| f.value().clone())
            .collect();
        finishes.sort_by_key(|f| f.finish_time_seconds);
        Ok(finishes)
    }

    async fn save_finish(&self, finish: &RaceFinish) -> Result<(), AppError> {
        self.finishes.insert(finish.id.clone(), finish.clone());
        Ok(())
    }

    async fn delete_finish(&self, finish_id: &str) -> Result<(), AppError> {
        self.finishes.remove(finish_id);
        Ok(())
    }

    async fn set_pr_flag(&self, finish_id: &str, is_pr: bool) -> Result<(), AppError> {
        if self.fail_pr_flag_writes.load(Ordering::SeqCst) {
            return Err(AppError::PersistenceFailed(format!(
                "Simulated write failure for {}",
                finish_id
            )));
        }
        self.pr_flag_writes.fetch_add(1, Ordering::SeqCst);
        let mut finish = self
            .finishes
            .get_mut(finish_id)
            .ok_or_else(|| AppError::NotFound(format!("Race finish {}", finish_id)))?;
        finish.is_pr = is_pr;
        Ok(())
    }
}
