// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Activity model for local storage and the `activities` table.

use crate::db::{keys, Table};
use crate::error::{AppError, Result};
use crate::models::{row_id, SyncRecord};
use crate::time_utils::week;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// How far into the future an activity date may be (clock skew allowance).
const FUTURE_SKEW_MINUTES: i64 = 5;

/// Kind of logged activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Walk,
    Run,
    Training,
    Play,
    Social,
    Other,
}

/// Perceived effort of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Effort {
    Low,
    Moderate,
    High,
}

impl Effort {
    /// Training-points multiplier per minute.
    pub fn multiplier(self) -> f64 {
        match self {
            Effort::Low => 1.0,
            Effort::Moderate => 1.5,
            Effort::High => 2.0,
        }
    }
}

/// Derived training-points score for a duration and effort.
pub fn training_points(duration_minutes: u32, effort: Effort) -> u32 {
    (f64::from(duration_minutes) * effort.multiplier()).round() as u32
}

/// Reject activity dates outside the backdating window.
///
/// The window is measured from `now`: exactly seven days back is accepted,
/// anything earlier is not.
pub fn check_activity_date(activity_date: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
    if activity_date < now - week() {
        return Err(AppError::Validation(
            "Activities can only be backdated up to 7 days".to_string(),
        ));
    }
    if activity_date > now + Duration::minutes(FUTURE_SKEW_MINUTES) {
        return Err(AppError::Validation(
            "Activity date cannot be in the future".to_string(),
        ));
    }
    Ok(())
}

/// Activity record as persisted locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct Activity {
    pub id: String,
    /// Owning profile
    #[serde(default)]
    pub dog_id: Option<String>,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    /// Duration in minutes
    pub duration: u32,
    pub effort: Effort,
    pub training_points: u32,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub photo: Option<String>,
    /// Weight observation in kg
    #[serde(default)]
    pub weight: Option<f64>,
    /// Nominal calendar date the entry was logged (`YYYY-MM-DD`)
    pub date: String,
    /// When the activity actually happened
    pub activity_date: DateTime<Utc>,
    #[serde(default)]
    pub contributes_to_goal: bool,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
}

/// Remote row for the `activities` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub dog_id: String,
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    pub duration: u32,
    pub effort: Effort,
    pub training_points: u32,
    pub notes: Option<String>,
    pub photo: Option<String>,
    pub weight: Option<f64>,
    pub date: String,
    pub activity_date: DateTime<Utc>,
    pub contributes_to_goal: bool,
    pub edited_at: Option<DateTime<Utc>>,
}

impl SyncRecord for Activity {
    const TABLE: Table = Table::Activities;
    const LOCAL_KEY: &'static str = keys::ACTIVITIES;

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
        self.edited_at
    }

    fn to_row(&self, user_id: &str, dog_id: &str) -> Result<serde_json::Value> {
        let row = ActivityRow {
            id: row_id(&self.id),
            user_id: user_id.to_string(),
            dog_id: dog_id.to_string(),
            activity_type: self.activity_type,
            duration: self.duration,
            effort: self.effort,
            training_points: self.training_points,
            notes: self.notes.clone(),
            photo: self.photo.clone(),
            weight: self.weight,
            date: self.date.clone(),
            activity_date: self.activity_date,
            contributes_to_goal: self.contributes_to_goal,
            edited_at: self.edited_at,
        };
        Ok(serde_json::to_value(row)?)
    }

    fn from_row(row: serde_json::Value) -> Result<Self> {
        let row: ActivityRow = serde_json::from_value(row)?;
        let id = row
            .id
            .ok_or_else(|| AppError::rejected("Activity row without id"))?;
        Ok(Self {
            id,
            dog_id: Some(row.dog_id),
            activity_type: row.activity_type,
            duration: row.duration,
            effort: row.effort,
            training_points: row.training_points,
            notes: row.notes,
            photo: row.photo,
            weight: row.weight,
            date: row.date,
            activity_date: row.activity_date,
            contributes_to_goal: row.contributes_to_goal,
            edited_at: row.edited_at,
        })
    }
}

/// Input for logging a new activity.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewActivity {
    #[serde(rename = "type")]
    pub activity_type: ActivityType,
    #[validate(range(min = 1, max = 1440, message = "Duration must be 1-1440 minutes"))]
    pub duration: u32,
    pub effort: Effort,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
    pub photo: Option<String>,
    #[validate(range(min = 0.1, max = 150.0, message = "Weight must be 0.1-150 kg"))]
    pub weight: Option<f64>,
    pub activity_date: DateTime<Utc>,
    #[serde(default)]
    pub contributes_to_goal: bool,
}

impl NewActivity {
    /// Validate and build the record with a provisional id.
    pub fn into_activity(
        self,
        id: String,
        dog_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Activity> {
        self.validate()?;
        check_activity_date(self.activity_date, now)?;

        Ok(Activity {
            id,
            dog_id,
            activity_type: self.activity_type,
            duration: self.duration,
            effort: self.effort,
            training_points: training_points(self.duration, self.effort),
            notes: self.notes,
            photo: self.photo,
            weight: self.weight,
            date: crate::time_utils::calendar_date(now),
            activity_date: self.activity_date,
            contributes_to_goal: self.contributes_to_goal,
            edited_at: None,
        })
    }
}

/// Partial update of an activity.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ActivityPatch {
    #[serde(rename = "type")]
    pub activity_type: Option<ActivityType>,
    #[validate(range(min = 1, max = 1440, message = "Duration must be 1-1440 minutes"))]
    pub duration: Option<u32>,
    pub effort: Option<Effort>,
    #[validate(length(max = 2000, message = "Notes must be at most 2000 characters"))]
    pub notes: Option<String>,
    pub photo: Option<String>,
    #[validate(range(min = 0.1, max = 150.0, message = "Weight must be 0.1-150 kg"))]
    pub weight: Option<f64>,
    pub activity_date: Option<DateTime<Utc>>,
    pub contributes_to_goal: Option<bool>,
}

impl ActivityPatch {
    /// Validate the patch before any write.
    pub fn check(&self, now: DateTime<Utc>) -> Result<()> {
        self.validate()?;
        if let Some(activity_date) = self.activity_date {
            check_activity_date(activity_date, now)?;
        }
        Ok(())
    }

    /// Apply the patch, recomputing derived fields and stamping `edited_at`.
    pub fn apply(&self, activity: &mut Activity, now: DateTime<Utc>) {
        if let Some(activity_type) = self.activity_type {
            activity.activity_type = activity_type;
        }
        if let Some(duration) = self.duration {
            activity.duration = duration;
        }
        if let Some(effort) = self.effort {
            activity.effort = effort;
        }
        if let Some(notes) = &self.notes {
            activity.notes = Some(notes.clone()).filter(|n| !n.is_empty());
        }
        if let Some(photo) = &self.photo {
            activity.photo = Some(photo.clone()).filter(|p| !p.is_empty());
        }
        if self.weight.is_some() {
            activity.weight = self.weight;
        }
        if let Some(activity_date) = self.activity_date {
            activity.activity_date = activity_date;
        }
        if let Some(contributes) = self.contributes_to_goal {
            activity.contributes_to_goal = contributes;
        }
        activity.training_points = training_points(activity.duration, activity.effort);
        activity.edited_at = Some(now);
    }
}
