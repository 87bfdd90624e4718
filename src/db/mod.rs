//! Storage layer: the on-device Local Store and the hosted Remote Store.

pub mod local;
pub mod remote;

pub use local::{FileBackend, LocalStore, MemoryBackend, StorageBackend};
pub use remote::{PostgrestClient, RemoteScope, RemoteStore};

/// Local Store keys. Every key holds one JSON document.
pub mod keys {
    pub const PROFILE: &str = "@dog_profile";
    pub const ACTIVITIES: &str = "@activities";
    pub const HEALTH_NOTES: &str = "@health_notes";
    pub const GOALS: &str = "@goals";
    pub const PENDING_BREED_ANALYSIS: &str = "@pending_breed_analysis";
    pub const BREED_ANALYSIS_CACHE: &str = "@breed_analysis_cache";
    pub const DOG_ID_ALIASES: &str = "@dog_id_aliases";

    /// Companion key listing deletes not yet applied remotely.
    pub fn tombstones(collection: &str) -> String {
        format!("{}:tombstones", collection)
    }
}

/// Remote tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Dogs,
    Activities,
    HealthNotes,
    Goals,
    BreedComponents,
}

impl Table {
    pub fn as_str(self) -> &'static str {
        match self {
            Table::Dogs => "dogs",
            Table::Activities => "activities",
            Table::HealthNotes => "health_notes",
            Table::Goals => "goals",
            Table::BreedComponents => "breed_components",
        }
    }

    /// Whether rows carry a `dog_id` that every request must filter on.
    pub fn is_dog_scoped(self) -> bool {
        !matches!(self, Table::Dogs)
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
