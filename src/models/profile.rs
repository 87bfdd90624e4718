// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Dog profile model.
//!
//! Locally the profile is one JSON object with its breed components embedded.
//! Remotely it is one `dogs` row plus one `breed_components` row per breed.

use crate::error::{AppError, Result};
use crate::models::row_id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
#[cfg(feature = "binding-generation")]
use ts_rs::TS;
use validator::Validate;

const LB_PER_KG: f64 = 2.20462;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum Sex {
    Male,
    Female,
}

/// Preferred display unit. Weight is always stored in kg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[default]
    Kg,
    Lb,
}

impl WeightUnit {
    /// Convert a canonical kg value for display, rounded to one decimal.
    pub fn display(self, kg: f64) -> f64 {
        let value = match self {
            WeightUnit::Kg => kg,
            WeightUnit::Lb => kg * LB_PER_KG,
        };
        (value * 10.0).round() / 10.0
    }

    /// Convert a value entered in this unit to kg.
    pub fn to_kg(self, value: f64) -> f64 {
        match self {
            WeightUnit::Kg => value,
            WeightUnit::Lb => value / LB_PER_KG,
        }
    }
}

/// One breed in the dog's mix.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct BreedComponent {
    pub breed_name: String,
    pub percentage: f64,
    #[serde(default)]
    pub is_unknown: bool,
    #[serde(default)]
    pub traits: Option<String>,
    #[serde(default)]
    pub strengths: Option<String>,
    #[serde(default)]
    pub risks: Option<String>,
}

/// The dog profile. One per identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "app/src/lib/generated/")
)]
#[serde(rename_all = "camelCase")]
pub struct DogProfile {
    pub id: String,
    pub name: String,
    /// Age in years
    #[serde(default)]
    pub age: Option<f64>,
    #[serde(default)]
    pub sex: Option<Sex>,
    /// Weight in kg
    pub weight: f64,
    #[serde(default)]
    pub weight_unit: WeightUnit,
    #[serde(default)]
    pub photo: Option<String>,
    #[serde(default)]
    pub breeds: Vec<BreedComponent>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl DogProfile {
    /// Weight in the preferred display unit.
    pub fn display_weight(&self) -> f64 {
        self.weight_unit.display(self.weight)
    }

    /// Canonical key for the breed mix, independent of entry order.
    pub fn breed_signature(&self) -> String {
        breed_signature(&self.breeds)
    }

    /// Map to the `dogs` row.
    pub fn to_dog_row(&self, user_id: &str) -> Result<serde_json::Value> {
        let row = DogRow {
            id: row_id(&self.id),
            user_id: user_id.to_string(),
            name: self.name.clone(),
            age: self.age,
            sex: self.sex,
            weight: self.weight,
            weight_unit: self.weight_unit,
            photo: self.photo.clone(),
            created_at: self.created_at,
            updated_at: self.updated_at,
        };
        Ok(serde_json::to_value(row)?)
    }

    /// Map the breed mix to `breed_components` rows for `dog_id`.
    pub fn to_breed_rows(&self, user_id: &str, dog_id: &str) -> Result<Vec<serde_json::Value>> {
        self.breeds
            .iter()
            .map(|breed| {
                let row = BreedComponentRow {
                    id: None,
                    user_id: user_id.to_string(),
                    dog_id: dog_id.to_string(),
                    breed_name: breed.breed_name.clone(),
                    percentage: breed.percentage,
                    is_unknown: breed.is_unknown,
                    traits: breed.traits.clone(),
                    strengths: breed.strengths.clone(),
                    risks: breed.risks.clone(),
                };
                Ok(serde_json::to_value(row)?)
            })
            .collect()
    }

    /// Rebuild a profile from its `dogs` row and `breed_components` rows.
    pub fn from_rows(dog: serde_json::Value, breeds: Vec<serde_json::Value>) -> Result<Self> {
        let dog: DogRow = serde_json::from_value(dog)?;
        let id = dog
            .id
            .ok_or_else(|| AppError::rejected("Dog row without id"))?;
        let breeds = breeds
            .into_iter()
            .map(|row| {
                let row: BreedComponentRow = serde_json::from_value(row)?;
                Ok(BreedComponent {
                    breed_name: row.breed_name,
                    percentage: row.percentage,
                    is_unknown: row.is_unknown,
                    traits: row.traits,
                    strengths: row.strengths,
                    risks: row.risks,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self {
            id,
            name: dog.name,
            age: dog.age,
            sex: dog.sex,
            weight: dog.weight,
            weight_unit: dog.weight_unit,
            photo: dog.photo,
            breeds,
            created_at: dog.created_at,
            updated_at: dog.updated_at,
        })
    }
}

/// Canonical key for a breed mix: sorted `name:percentage` pairs.
pub fn breed_signature(breeds: &[BreedComponent]) -> String {
    let mut parts: Vec<String> = breeds
        .iter()
        .map(|b| {
            let name = if b.is_unknown {
                "unknown".to_string()
            } else {
                b.breed_name.trim().to_lowercase()
            };
            format!("{}:{}", name, b.percentage)
        })
        .collect();
    parts.sort();
    parts.join("|")
}

/// Remote row for the `dogs` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DogRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub name: String,
    pub age: Option<f64>,
    pub sex: Option<Sex>,
    pub weight: f64,
    pub weight_unit: WeightUnit,
    pub photo: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Remote row for the `breed_components` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreedComponentRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub user_id: String,
    pub dog_id: String,
    pub breed_name: String,
    pub percentage: f64,
    pub is_unknown: bool,
    pub traits: Option<String>,
    pub strengths: Option<String>,
    pub risks: Option<String>,
}

/// Input for creating or editing the profile.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProfileInput {
    #[validate(length(min = 1, max = 64, message = "Name must be 1-64 characters"))]
    pub name: String,
    #[validate(range(min = 0.0, max = 40.0, message = "Age must be 0-40 years"))]
    pub age: Option<f64>,
    pub sex: Option<Sex>,
    /// Weight in kg
    #[validate(range(min = 0.1, max = 150.0, message = "Weight must be 0.1-150 kg"))]
    pub weight: f64,
    #[serde(default)]
    pub weight_unit: WeightUnit,
    pub photo: Option<String>,
    #[serde(default)]
    pub breeds: Vec<BreedComponent>,
}

impl ProfileInput {
    /// Build a brand-new profile.
    pub fn into_profile(self, id: String, now: DateTime<Utc>) -> Result<DogProfile> {
        self.validate()?;
        Ok(DogProfile {
            id,
            name: self.name,
            age: self.age,
            sex: self.sex,
            weight: self.weight,
            weight_unit: self.weight_unit,
            photo: self.photo,
            breeds: self.breeds,
            created_at: now,
            updated_at: Some(now),
        })
    }

    /// Apply to an existing profile, keeping its id and creation time.
    pub fn apply(self, profile: &mut DogProfile, now: DateTime<Utc>) -> Result<()> {
        self.validate()?;
        profile.name = self.name;
        profile.age = self.age;
        profile.sex = self.sex;
        profile.weight = self.weight;
        profile.weight_unit = self.weight_unit;
        profile.photo = self.photo;
        profile.breeds = self.breeds;
        profile.updated_at = Some(now);
        Ok(())
    }
}
