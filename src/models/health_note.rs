// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Health note model for local storage and the `health_notes` table.

use crate::db::{keys, Table};
use crate::error::{AppError, Result};
use crate::models::{row_id, SyncRecord};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

/// Free-text health note, optionally with a weight and Body Condition Score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct HealthNote {
    pub id: String,
    /// Owning profile. Legacy notes have none and belong to the active profile.
    #[serde(default)]
    pub dog_id: Option<String>,
    pub text: String,
    pub created_at: DateTime<Utc>,
    /// Display date (`YYYY-MM-DD`)
    pub date: String,
    /// Weight observation in kg
    #[serde(default)]
    pub weight: Option<f64>,
    /// Body Condition Score, 1-9
    #[serde(default)]
    pub body_condition_score: Option<u8>,
    #[serde(default)]
    pub edited_at: Option<DateTime<Utc>>,
}

impl HealthNote {
    /// Category tag encoded as `[Tag]` on the first line, if any.
    pub fn category(&self) -> Option<&str> {
        let first = self.text.lines().next()?.trim();
        first
            .strip_prefix('[')
            .and_then(|rest| rest.strip_suffix(']'))
            .map(str::trim)
            .filter(|tag| !tag.is_empty())
    }

    /// Note text without the category line.
    pub fn body(&self) -> &str {
        if self.category().is_none() {
            return &self.text;
        }
        match self.text.split_once('\n') {
            Some((_, rest)) => rest.trim_start(),
            None => "",
        }
    }
}

/// Remote row for the `health_notes` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthNoteRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub dog_id: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub date: String,
    pub weight: Option<f64>,
    pub body_condition_score: Option<u8>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl SyncRecord for HealthNote {
    const TABLE: Table = Table::HealthNotes;
    const LOCAL_KEY: &'static str = keys::HEALTH_NOTES;

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
        let row = HealthNoteRow {
            id: row_id(&self.id),
            user_id: user_id.to_string(),
            dog_id: dog_id.to_string(),
            text: self.text.clone(),
            created_at: self.created_at,
            date: self.date.clone(),
            weight: self.weight,
            body_condition_score: self.body_condition_score,
            edited_at: self.edited_at,
        };
        Ok(serde_json::to_value(row)?)
    }

    fn from_row(row: serde_json::Value) -> Result<Self> {
        let row: HealthNoteRow = serde_json::from_value(row)?;
        let id = row
            .id
            .ok_or_else(|| AppError::rejected("Health note row without id"))?;
        Ok(Self {
            id,
            dog_id: Some(row.dog_id),
            text: row.text,
            created_at: row.created_at,
            date: row.date,
            weight: row.weight,
            body_condition_score: row.body_condition_score,
            edited_at: row.edited_at,
        })
    }
}

/// Input for a new health note.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewHealthNote {
    #[validate(length(min = 1, max = 5000, message = "Note text is required"))]
    pub text: String,
    /// Display date; defaults to today
    pub date: Option<String>,
    #[validate(range(min = 0.1, max = 150.0, message = "Weight must be 0.1-150 kg"))]
    pub weight: Option<f64>,
    #[validate(range(min = 1, max = 9, message = "Body Condition Score must be 1-9"))]
    pub body_condition_score: Option<u8>,
}

impl NewHealthNote {
    /// Validate and build the record.
    pub fn into_note(
        self,
        id: String,
        dog_id: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<HealthNote> {
        self.validate()?;
        if self.text.trim().is_empty() {
            return Err(AppError::Validation("Note text is required".to_string()));
        }
        Ok(HealthNote {
            id,
            dog_id,
            text: self.text,
            created_at: now,
            date: self
                .date
                .unwrap_or_else(|| crate::time_utils::calendar_date(now)),
            weight: self.weight,
            body_condition_score: self.body_condition_score,
            edited_at: None,
        })
    }
}

/// Partial update of a health note.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct HealthNotePatch {
    #[validate(length(min = 1, max = 5000, message = "Note text is required"))]
    pub text: Option<String>,
    pub date: Option<String>,
    #[validate(range(min = 0.1, max = 150.0, message = "Weight must be 0.1-150 kg"))]
    pub weight: Option<f64>,
    #[validate(range(min = 1, max = 9, message = "Body Condition Score must be 1-9"))]
    pub body_condition_score: Option<u8>,
}

impl HealthNotePatch {
    pub fn apply(&self, note: &mut HealthNote, now: DateTime<Utc>) {
        if let Some(text) = &self.text {
            note.text = text.clone();
        }
        if let Some(date) = &self.date {
            note.date = date.clone();
        }
        if self.weight.is_some() {
            note.weight = self.weight;
        }
        if self.body_condition_score.is_some() {
            note.body_condition_score = self.body_condition_score;
        }
        note.edited_at = Some(now);
    }
}
