// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Activities and health notes sync manager.

use crate::error::Result;
use crate::models::{
    provisional_id, Activity, ActivityPatch, HealthNote, HealthNotePatch, NewActivity,
    NewHealthNote,
};
use crate::services::collection::{BackupReport, Collection, HydrationState};
use crate::services::env::SyncEnv;
use chrono::Utc;
use std::sync::Arc;

/// Sync manager for activities and health notes.
pub struct ActivitiesManager {
    activities: Collection<Activity>,
    notes: Collection<HealthNote>,
}

impl ActivitiesManager {
    pub fn new(env: Arc<SyncEnv>) -> Self {
        Self {
            activities: Collection::new(env.clone()),
            notes: Collection::new(env),
        }
    }

    pub async fn hydrate(&self) {
        tokio::join!(self.activities.hydrate(), self.notes.hydrate());
    }

    /// Combined state: remote only when both collections came from remote.
    pub async fn phase(&self) -> HydrationState {
        let (activities, notes) = tokio::join!(self.activities.phase(), self.notes.phase());
        match (activities, notes) {
            (a, _) if a.is_loading() => a,
            (_, n) if n.is_loading() => n,
            (HydrationState::HydratedRemote, HydrationState::HydratedRemote) => {
                HydrationState::HydratedRemote
            }
            _ => HydrationState::HydratedLocal,
        }
    }

    pub async fn is_loading(&self) -> bool {
        self.phase().await.is_loading()
    }

    pub async fn has_unsynced(&self) -> bool {
        self.activities.has_unsynced().await || self.notes.has_unsynced().await
    }

    // ─── Activities ──────────────────────────────────────────────────

    /// Activities of the active dog, most recent first.
    pub async fn activities(&self) -> Vec<Activity> {
        let mut activities = self.activities.view().await;
        activities.sort_by(|a, b| b.activity_date.cmp(&a.activity_date));
        activities
    }

    pub async fn activity(&self, id: &str) -> Option<Activity> {
        self.activities.get(id).await
    }

    pub async fn add_activity(&self, input: NewActivity) -> Result<Activity> {
        let activity = input.into_activity(provisional_id(), None, Utc::now())?;
        tracing::info!(
            id = %activity.id,
            points = activity.training_points,
            "Logging activity"
        );
        self.activities.insert(activity).await
    }

    pub async fn update_activity(&self, id: &str, patch: ActivityPatch) -> Result<Activity> {
        let now = Utc::now();
        patch.check(now)?;
        self.activities
            .update(id, |activity| {
                patch.apply(activity, now);
                Ok(())
            })
            .await
    }

    pub async fn delete_activity(&self, id: &str) -> Result<()> {
        self.activities.remove(id).await
    }

    // ─── Health notes ────────────────────────────────────────────────

    /// Health notes of the active dog, newest first.
    pub async fn health_notes(&self) -> Vec<HealthNote> {
        let mut notes = self.notes.view().await;
        notes.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        notes
    }

    pub async fn add_health_note(&self, input: NewHealthNote) -> Result<HealthNote> {
        let note = input.into_note(provisional_id(), None, Utc::now())?;
        self.notes.insert(note).await
    }

    pub async fn update_health_note(&self, id: &str, patch: HealthNotePatch) -> Result<HealthNote> {
        validator::Validate::validate(&patch)?;
        let now = Utc::now();
        self.notes
            .update(id, |note| {
                patch.apply(note, now);
                Ok(())
            })
            .await
    }

    pub async fn delete_health_note(&self, id: &str) -> Result<()> {
        self.notes.remove(id).await
    }

    // ─── Backup ──────────────────────────────────────────────────────

    pub async fn backup(&self) -> BackupReport {
        let mut report = self.activities.backup().await;
        report.merge(&self.notes.backup().await);
        report
    }
}
