// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - sync managers and their collaborators.

pub mod activities;
pub mod breed_analysis;
pub mod collection;
pub mod dual_write;
pub mod env;
pub mod goals;
pub mod identity;
pub mod notices;
pub mod orchestrator;
pub mod profile;
pub mod reachability;

pub use activities::ActivitiesManager;
pub use breed_analysis::{BreedAnalysisCache, BreedAnalysisTrigger, NoopBreedAnalysis};
pub use collection::{BackupReport, Collection, HydrationState};
pub use env::{ActiveDog, DeferReason, SyncEnv, WriteScope};
pub use goals::GoalsManager;
pub use identity::{Identity, IdentityProvider, IdentityState};
pub use notices::{Notice, Notifier};
pub use orchestrator::{Orchestrator, SyncNowOutcome, SyncReport, SyncTrigger};
pub use profile::ProfileManager;
pub use reachability::{HttpProbe, NetworkStatus, Reachability, ReachabilityProbe};
