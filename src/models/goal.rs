// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Goal model for local storage and the `goals` table.

use crate::db::{keys, Table};
use crate::error::{AppError, Result};
use crate::models::{row_id, SyncRecord};
use crate::time_utils::week_elapsed;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum GoalType {
    Weight,
    Conditioning,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum GoalDirection {
    Lose,
    Gain,
}

/// Weight or conditioning goal. At most one goal per dog is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub id: String,
    #[serde(default)]
    pub dog_id: Option<String>,
    #[serde(rename = "type")]
    pub goal_type: GoalType,
    /// Weight goals only
    #[serde(default)]
    pub direction: Option<GoalDirection>,
    pub name: String,
    pub target_value: f64,
    pub start_value: f64,
    pub current_value: f64,
    pub unit: String,
    /// Conditioning goals only: training points per week
    #[serde(default)]
    pub weekly_target: Option<f64>,
    /// Conditioning goals only: start of the current progress week
    #[serde(default)]
    pub week_start_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    /// Whether a conditioning goal's progress week has run out.
    pub fn needs_weekly_reset(&self, now: DateTime<Utc>) -> bool {
        self.goal_type == GoalType::Conditioning
            && self
                .week_start_date
                .is_some_and(|start| week_elapsed(start, now))
    }

    /// Progress toward the target in `[0, 1]`.
    pub fn progress(&self) -> f64 {
        let fraction = match self.goal_type {
            GoalType::Conditioning => {
                let target = self.weekly_target.unwrap_or(self.target_value);
                if target <= 0.0 {
                    return 0.0;
                }
                self.current_value / target
            }
            // Signed span, so losing and gaining both divide out positive.
            GoalType::Weight => {
                let span = self.target_value - self.start_value;
                if span == 0.0 {
                    return 1.0;
                }
                (self.current_value - self.start_value) / span
            }
        };
        fraction.clamp(0.0, 1.0)
    }
}

/// Remote row for the `goals` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub dog_id: String,
    #[serde(rename = "type")]
    pub goal_type: GoalType,
    pub direction: Option<GoalDirection>,
    pub name: String,
    pub target_value: f64,
    pub start_value: f64,
    pub current_value: f64,
    pub unit: String,
    pub weekly_target: Option<f64>,
    pub week_start_date: Option<DateTime<Utc>>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncRecord for Goal {
    const TABLE: Table = Table::Goals;
    const LOCAL_KEY: &'static str = keys::GOALS;

    fn id(&self) -> &str {
        &self.id
    }

    fn set_id(&mut self, id: String) {
        self.id = id;
    }

    fn dog_id(&self) -> Option<&str> {
        self.dog_id.as_deref()
    }

    fn set_dog_id(&mut self, dog_id: String) {
        self.dog_id = Some(dog_id);
    }

    fn revision(&self) -> Option<DateTime<Utc>> {
        Some(self.updated_at)
    }

    fn to_row(&self, user_id: &str, dog_id: &str) -> Result<serde_json::Value> {
        let row = GoalRow {
            id: row_id(&self.id),
            user_id: user_id.to_string(),
            dog_id: dog_id.to_string(),
            goal_type: self.goal_type,
            direction: self.direction,
            name: self.name.clone(),
            target_value: self.target_value,
            start_value: self.start_value,
            current_value: self.current_value,
            unit: self.unit.clone(),
            weekly_target: self.weekly_target,
            week_start_date: self.week_start_date,
            is_active: self.is_active,
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        Ok(serde_json::to_value(row)?)
    }

    fn from_row(row: serde_json::Value) -> Result<Self> {
        let row: GoalRow = serde_json::from_value(row)?;
        let id = row
            .id
            .ok_or_else(|| AppError::rejected("Goal row without id"))?;
        Ok(Self {
            id,
            dog_id: Some(row.dog_id),
            goal_type: row.goal_type,
            direction: row.direction,
            name: row.name,
            target_value: row.target_value,
            start_value: row.start_value,
            current_value: row.current_value,
            unit: row.unit,
            weekly_target: row.weekly_target,
            week_start_date: row.week_start_date,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Input for a new goal. New goals are always created active.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewGoal {
    #[serde(rename = "type")]
    pub goal_type: GoalType,
    pub direction: Option<GoalDirection>,
    #[validate(length(min = 1, max = 80, message = "Goal name is required"))]
    pub name: String,
    pub target_value: f64,
    pub start_value: f64,
    #[validate(length(min = 1, max = 16))]
    pub unit: String,
    pub weekly_target: Option<f64>,
}

impl NewGoal {
    /// Validate and build the record.
    pub fn into_goal(self, id: String, dog_id: Option<String>, now: DateTime<Utc>) -> Result<Goal> {
        self.validate()?;
        let (direction, weekly_target, week_start_date) = match self.goal_type {
            GoalType::Weight => {
                let direction = self.direction.ok_or_else(|| {
                    AppError::Validation("Weight goals need a direction".to_string())
                })?;
                (Some(direction), None, None)
            }
            GoalType::Conditioning => {
                let weekly = self.weekly_target.unwrap_or(self.target_value);
                if weekly <= 0.0 {
                    return Err(AppError::Validation(
                        "Weekly target must be positive".to_string(),
                    ));
                }
                (None, Some(weekly), Some(now))
            }
        };
        let current_value = match self.goal_type {
            GoalType::Weight => self.start_value,
            GoalType::Conditioning => 0.0,
        };

        Ok(Goal {
            id,
            dog_id,
            goal_type: self.goal_type,
            direction,
            name: self.name,
            target_value: self.target_value,
            start_value: self.start_value,
            current_value,
            unit: self.unit,
            weekly_target,
            week_start_date,
            is_active: true,
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update of a goal.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct GoalPatch {
    #[validate(length(min = 1, max = 80, message = "Goal name is required"))]
    pub name: Option<String>,
    pub target_value: Option<f64>,
    pub current_value: Option<f64>,
    #[validate(length(min = 1, max = 16))]
    pub unit: Option<String>,
    pub weekly_target: Option<f64>,
    pub week_start_date: Option<DateTime<Utc>>,
}

impl GoalPatch {
    pub fn apply(&self, goal: &mut Goal, now: DateTime<Utc>) {
        if let Some(name) = &self.name {
            goal.name = name.clone();
        }
        if let Some(target) = self.target_value {
            goal.target_value = target;
        }
        if let Some(current) = self.current_value {
            goal.current_value = current;
        }
        if let Some(unit) = &self.unit {
            goal.unit = unit.clone();
        }
        if self.weekly_target.is_some() {
            goal.weekly_target = self.weekly_target;
        }
        if self.week_start_date.is_some() {
            goal.week_start_date = self.week_start_date;
        }
        goal.updated_at = now;
    }
}
