// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Breed analysis collaborator seam and the analysis cache.
//!
//! Generating trait text is external. The core only fires
//! [`BreedAnalysisTrigger::regenerate`] and keeps a cache keyed by breed
//! combination.

use crate::db::{keys, LocalStore};
use crate::models::profile::breed_signature;
use crate::models::{BreedComponent, DogProfile};
use dashmap::DashMap;
use futures_util::future::BoxFuture;
use std::collections::HashMap;

/// External breed analysis generator.
pub trait BreedAnalysisTrigger: Send + Sync {
    /// Ask for a fresh analysis of the profile's breed mix.
    fn regenerate(&self, profile: DogProfile) -> BoxFuture<'_, ()>;
}

/// Trigger that does nothing, for hosts without an analysis service.
pub struct NoopBreedAnalysis;

impl BreedAnalysisTrigger for NoopBreedAnalysis {
    fn regenerate(&self, profile: DogProfile) -> BoxFuture<'_, ()> {
        tracing::debug!(dog_id = %profile.id, "Breed analysis requested, no generator configured");
        Box::pin(async {})
    }
}

/// Breed combination → analysis text.
///
/// Created empty, loaded from the Local Store at start, persisted on every
/// change.
pub struct BreedAnalysisCache {
    entries: DashMap<String, String>,
    local: LocalStore,
}

impl BreedAnalysisCache {
    pub fn new(local: LocalStore) -> Self {
        Self {
            entries: DashMap::new(),
            local,
        }
    }

    /// Replace the in-memory cache with the persisted one.
    pub async fn load(&self) {
        let stored: HashMap<String, String> = self
            .local
            .read_record(keys::BREED_ANALYSIS_CACHE)
            .await
            .unwrap_or_default();
        self.entries.clear();
        for (signature, analysis) in stored {
            self.entries.insert(signature, analysis);
        }
        tracing::debug!(entries = self.entries.len(), "Breed analysis cache loaded");
    }

    pub fn get(&self, breeds: &[BreedComponent]) -> Option<String> {
        self.entries
            .get(&breed_signature(breeds))
            .map(|entry| entry.value().clone())
    }

    pub async fn populate(&self, breeds: &[BreedComponent], analysis: impl Into<String>) {
        self.entries
            .insert(breed_signature(breeds), analysis.into());
        self.persist().await;
    }

    /// Drop the analysis for a combination that no longer applies.
    pub async fn invalidate(&self, breeds: &[BreedComponent]) {
        if self.entries.remove(&breed_signature(breeds)).is_some() {
            self.persist().await;
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    async fn persist(&self) {
        let snapshot: HashMap<String, String> = self
            .entries
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        let _ = self
            .local
            .write_record(keys::BREED_ANALYSIS_CACHE, &snapshot)
            .await;
    }
}
