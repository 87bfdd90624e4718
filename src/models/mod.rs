// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.
//!
//! Records use the camelCase shape the app persists locally. Each syncable
//! record also has a snake_case row type matching the remote table, with a
//! total mapping in both directions.

pub mod activity;
pub mod goal;
pub mod health_note;
pub mod profile;

pub use activity::{Activity, ActivityPatch, ActivityType, Effort, NewActivity};
pub use goal::{Goal, GoalDirection, GoalPatch, GoalType, NewGoal};
pub use health_note::{HealthNote, HealthNotePatch, NewHealthNote};
pub use profile::{BreedComponent, DogProfile, ProfileInput, Sex, WeightUnit};

use crate::db::Table;
use crate::error::Result;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use uuid::Uuid;

/// Prefix of locally generated identifiers.
pub const PROVISIONAL_PREFIX: &str = "local-";

/// Generate a provisional identifier for a record created on this device.
pub fn provisional_id() -> String {
    format!("{}{}", PROVISIONAL_PREFIX, Uuid::new_v4())
}

/// Whether an identifier has never been assigned by the remote store.
///
/// Remote identifiers are UUIDs. Anything else, including legacy
/// timestamp-style ids, is provisional.
pub fn is_provisional_id(id: &str) -> bool {
    Uuid::parse_str(id).is_err()
}

/// A dog-scoped record that can be mirrored to a remote table.
pub trait SyncRecord:
    Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + std::fmt::Debug + 'static
{
    /// Remote table holding this record type.
    const TABLE: Table;
    /// Local Store key holding the whole collection.
    const LOCAL_KEY: &'static str;

    fn id(&self) -> &str;
    fn set_id(&mut self, id: String);
    fn dog_id(&self) -> Option<&str>;
    fn set_dog_id(&mut self, dog_id: String);

    /// Last local modification, used to keep offline edits during hydration.
    fn revision(&self) -> Option<DateTime<Utc>>;

    /// Map to the remote row shape. Provisional ids are omitted so the remote
    /// store assigns one.
    fn to_row(&self, user_id: &str, dog_id: &str) -> Result<serde_json::Value>;

    /// Map a remote row back to the local record shape.
    fn from_row(row: serde_json::Value) -> Result<Self>;
}

/// Row id to send: `None` for provisional ids.
pub(crate) fn row_id(id: &str) -> Option<String> {
    (!is_provisional_id(id)).then(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provisional_ids() {
        let id = provisional_id();
        assert!(id.starts_with(PROVISIONAL_PREFIX));
        assert!(is_provisional_id(&id));
        assert!(is_provisional_id("1718000000000"));
        assert!(!is_provisional_id("7b0c8a4e-3f55-4d1e-9f2a-0f5d2b6f1c3e"));
    }
}
