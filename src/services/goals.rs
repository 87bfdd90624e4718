// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Goals sync manager.
//!
//! At most one goal per dog is active. Activating a goal deactivates every
//! other goal locally and remotely. Conditioning goals restart their weekly
//! progress whenever goals are loaded after the week has run out.

use crate::error::{AppError, Result};
use crate::models::{provisional_id, Goal, GoalPatch, GoalType, NewGoal};
use crate::services::collection::{BackupReport, Collection, HydrationState};
use crate::services::env::SyncEnv;
use chrono::{DateTime, Utc};
use serde_json::json;
use std::sync::Arc;
use validator::Validate;

/// Sync manager for goals.
pub struct GoalsManager {
    goals: Collection<Goal>,
}

impl GoalsManager {
    pub fn new(env: Arc<SyncEnv>) -> Self {
        Self {
            goals: Collection::new(env),
        }
    }

    /// Load goals, then normalize the active goal and apply weekly resets.
    pub async fn hydrate(&self) {
        self.goals.hydrate().await;
        let now = Utc::now();
        self.enforce_single_active(now).await;
        let reset = self.apply_weekly_resets(now).await;
        if reset > 0 {
            tracing::info!(count = reset, "Weekly conditioning progress reset");
        }
    }

    pub async fn phase(&self) -> HydrationState {
        self.goals.phase().await
    }

    pub async fn is_loading(&self) -> bool {
        self.goals.is_loading().await
    }

    pub async fn has_unsynced(&self) -> bool {
        self.goals.has_unsynced().await
    }

    /// Goals of the active dog, newest first.
    pub async fn goals(&self) -> Vec<Goal> {
        let mut goals = self.goals.view().await;
        goals.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        goals
    }

    pub async fn active_goal(&self) -> Option<Goal> {
        self.goals.view().await.into_iter().find(|g| g.is_active)
    }

    // ─── Mutations ───────────────────────────────────────────────────

    /// Add a goal. The new goal becomes the active one.
    pub async fn add_goal(&self, input: NewGoal) -> Result<Goal> {
        let now = Utc::now();
        let goal = input.into_goal(provisional_id(), None, now)?;
        self.deactivate_others(&goal.id, now).await;
        self.goals.insert(goal).await
    }

    /// Make an existing goal the active one.
    pub async fn set_active_goal(&self, id: &str) -> Result<Goal> {
        let goal = self
            .goals
            .get(id)
            .await
            .ok_or_else(|| AppError::NotFound(format!("goal {}", id)))?;
        let now = Utc::now();
        self.deactivate_others(&goal.id, now).await;
        self.goals
            .update(&goal.id, |goal| {
                goal.is_active = true;
                goal.updated_at = now;
                Ok(())
            })
            .await
    }

    pub async fn update_goal(&self, id: &str, patch: GoalPatch) -> Result<Goal> {
        patch.validate()?;
        if patch.weekly_target.is_some_and(|target| target <= 0.0) {
            return Err(AppError::Validation(
                "Weekly target must be positive".to_string(),
            ));
        }
        let now = Utc::now();
        self.goals
            .update(id, |goal| {
                patch.apply(goal, now);
                Ok(())
            })
            .await
    }

    /// Delete a goal. Deleting the active goal leaves no goal active.
    pub async fn delete_goal(&self, id: &str) -> Result<()> {
        self.goals.remove(id).await
    }

    /// Add training points to the active conditioning goal.
    pub async fn apply_training_points(&self, points: u32) -> Result<Option<Goal>> {
        let Some(goal) = self
            .active_goal()
            .await
            .filter(|g| g.goal_type == GoalType::Conditioning)
        else {
            return Ok(None);
        };
        let now = Utc::now();
        self.goals
            .update(&goal.id, |goal| {
                if goal.needs_weekly_reset(now) {
                    restart_week(goal, now);
                }
                goal.current_value += f64::from(points);
                goal.updated_at = now;
                Ok(())
            })
            .await
            .map(Some)
    }

    /// Record a weight observation (kg) on the active weight goal.
    pub async fn apply_weight_observation(&self, weight: f64) -> Result<Option<Goal>> {
        let Some(goal) = self
            .active_goal()
            .await
            .filter(|g| g.goal_type == GoalType::Weight)
        else {
            return Ok(None);
        };
        let now = Utc::now();
        self.goals
            .update(&goal.id, |goal| {
                goal.current_value = weight;
                goal.updated_at = now;
                Ok(())
            })
            .await
            .map(Some)
    }

    /// Restart conditioning goals whose week has run out. Returns how many.
    pub async fn apply_weekly_resets(&self, now: DateTime<Utc>) -> usize {
        let due: Vec<String> = self
            .goals
            .view()
            .await
            .into_iter()
            .filter(|g| g.needs_weekly_reset(now))
            .map(|g| g.id)
            .collect();

        let mut reset = 0;
        for id in due {
            let result = self
                .goals
                .update(&id, |goal| {
                    restart_week(goal, now);
                    goal.updated_at = now;
                    Ok(())
                })
                .await;
            match result {
                Ok(_) => reset += 1,
                Err(e) => tracing::error!(id = %id, error = %e, "Weekly reset failed"),
            }
        }
        reset
    }

    /// Keep only the most recently updated active goal active. Ties go to the
    /// newest goal.
    async fn enforce_single_active(&self, now: DateTime<Utc>) {
        let mut active: Vec<Goal> = self
            .goals
            .view()
            .await
            .into_iter()
            .filter(|g| g.is_active)
            .collect();
        if active.len() <= 1 {
            return;
        }
        active.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then(b.created_at.cmp(&a.created_at))
        });
        tracing::warn!(count = active.len(), keep = %active[0].id, "Multiple active goals, keeping newest");
        self.deactivate_others(&active[0].id, now).await;
    }

    async fn deactivate_others(&self, keep_id: &str, now: DateTime<Utc>) {
        let patch = json!({ "is_active": false, "updated_at": now });
        self.goals
            .deactivate_others(keep_id, patch, |goal| {
                if !goal.is_active {
                    return false;
                }
                goal.is_active = false;
                goal.updated_at = now;
                true
            })
            .await;
    }

    // ─── Backup ──────────────────────────────────────────────────────

    pub async fn backup(&self) -> BackupReport {
        self.goals.backup().await
    }
}

fn restart_week(goal: &mut Goal, now: DateTime<Utc>) {
    goal.current_value = 0.0;
    goal.week_start_date = Some(now);
}
