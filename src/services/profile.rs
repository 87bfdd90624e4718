// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Profile sync manager.
//!
//! The profile is a single local document (`@dog_profile`) that maps to one
//! `dogs` row plus one `breed_components` row per breed. Its id is the owning
//! dog id for every other domain, so whenever it changes the active dog is
//! republished and the old id recorded as an alias.

use crate::db::{keys, RemoteScope, Table};
use crate::error::{AppError, Result};
use crate::models::{is_provisional_id, provisional_id, DogProfile, ProfileInput};
use crate::services::breed_analysis::{BreedAnalysisCache, BreedAnalysisTrigger};
use crate::services::collection::{is_newer, BackupReport, HydrationState};
use crate::services::dual_write;
use crate::services::env::{SyncEnv, WriteScope};
use crate::services::reachability::Reachability;
use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Default)]
struct ProfileState {
    phase: HydrationState,
    profile: Option<DogProfile>,
    dirty: bool,
    /// Breed rows differ from what the remote store holds.
    breeds_dirty: bool,
    /// A breed edit has not reached the remote store yet.
    pending_breed_analysis: bool,
}

/// Sync manager for the dog profile.
pub struct ProfileManager {
    env: Arc<SyncEnv>,
    state: RwLock<ProfileState>,
    push_lock: Mutex<()>,
    breed_trigger: Arc<dyn BreedAnalysisTrigger>,
    breed_cache: Arc<BreedAnalysisCache>,
}

impl ProfileManager {
    pub fn new(
        env: Arc<SyncEnv>,
        breed_trigger: Arc<dyn BreedAnalysisTrigger>,
        breed_cache: Arc<BreedAnalysisCache>,
    ) -> Self {
        Self {
            env,
            state: RwLock::new(ProfileState::default()),
            push_lock: Mutex::new(()),
            breed_trigger,
            breed_cache,
        }
    }

    pub async fn profile(&self) -> Option<DogProfile> {
        self.state.read().await.profile.clone()
    }

    pub async fn phase(&self) -> HydrationState {
        self.state.read().await.phase
    }

    pub async fn is_loading(&self) -> bool {
        self.phase().await.is_loading()
    }

    /// Always false in guest mode.
    pub async fn has_unsynced(&self) -> bool {
        self.env.identity.is_authenticated() && self.state.read().await.dirty
    }

    pub async fn has_pending_breed_analysis(&self) -> bool {
        self.state.read().await.pending_breed_analysis
    }

    // ─── Hydration ───────────────────────────────────────────────────

    /// Load the profile and publish it as the active dog.
    pub async fn hydrate(&self) {
        self.state.write().await.phase = HydrationState::Hydrating;

        let authenticated = self.env.identity.is_authenticated();
        let remote = self.fetch_remote().await;

        let mut state = self.state.write().await;
        let local: Option<DogProfile> = self.env.local.read_record(keys::PROFILE).await;
        let pending: bool = self
            .env
            .local
            .read_record(keys::PENDING_BREED_ANALYSIS)
            .await
            .unwrap_or(false);

        let (profile, dirty, phase) = match (remote, local) {
            (Some(Some(remote)), Some(local))
                if local.id == remote.id && is_newer(local.updated_at, remote.updated_at) =>
            {
                tracing::debug!(dog_id = %local.id, "Keeping newer offline profile edit");
                (Some(local), true, HydrationState::HydratedRemote)
            }
            (Some(Some(remote)), local) => {
                // An existing account dog wins over a profile made as a guest.
                if let Some(local) = local.filter(|l| is_provisional_id(&l.id)) {
                    self.env
                        .active_dog
                        .add_alias(&self.env.local, &local.id, &remote.id)
                        .await;
                }
                (Some(remote), false, HydrationState::HydratedRemote)
            }
            (fetched, local) => {
                let remote_empty = fetched.is_some();
                let dirty = authenticated
                    && local
                        .as_ref()
                        .is_some_and(|p| remote_empty || is_provisional_id(&p.id));
                (local, dirty, HydrationState::HydratedLocal)
            }
        };

        self.env
            .active_dog
            .set(profile.as_ref().map(|p| p.id.clone()));
        state.profile = profile;
        state.dirty = dirty;
        state.breeds_dirty = dirty;
        state.pending_breed_analysis = pending;
        state.phase = phase;
        self.persist(&state).await;

        tracing::info!(
            ?phase,
            dog_id = ?state.profile.as_ref().map(|p| p.id.as_str()),
            unsynced = dirty,
            "Profile hydrated"
        );
    }

    /// `None`: not read. `Some(None)`: no remote dog for this identity.
    async fn fetch_remote(&self) -> Option<Option<DogProfile>> {
        let scope = self.env.identity_scope()?;
        let (_, reachability) = self.env.network.refresh(self.env.probe.as_ref()).await;
        if reachability != Reachability::Online {
            return None;
        }

        match self.read_remote(&scope).await {
            Ok(_) if !self.env.scope_is_current(&scope) => {
                tracing::warn!("Identity changed during profile read");
                None
            }
            Ok(profile) => Some(profile),
            Err(e) => {
                if e.is_connectivity() {
                    tracing::warn!(error = %e, "Remote profile read failed, using local copy");
                    self.env.network.set(Reachability::Offline);
                } else {
                    tracing::error!(error = %e, "Remote profile read rejected, using local copy");
                }
                None
            }
        }
    }

    async fn read_remote(&self, scope: &RemoteScope) -> Result<Option<DogProfile>> {
        let dogs = self.env.remote.select(Table::Dogs, scope.clone()).await?;
        let Some(dog) = dogs.into_iter().next() else {
            return Ok(None);
        };
        let dog_id = dual_write::returned_id(&dog)?;
        let breeds = self
            .env
            .remote
            .select(Table::BreedComponents, scope.for_dog(dog_id))
            .await?;
        DogProfile::from_rows(dog, breeds).map(Some)
    }

    // ─── Mutations ───────────────────────────────────────────────────

    /// Create or edit the profile.
    pub async fn save_profile(&self, input: ProfileInput) -> Result<DogProfile> {
        self.mutate(|current, now| match current {
            Some(mut profile) => {
                input.apply(&mut profile, now)?;
                Ok(profile)
            }
            None => input.into_profile(provisional_id(), now),
        })
        .await
    }

    /// Record a new weight observation (kg) on the profile.
    pub async fn record_weight(&self, weight: f64) -> Result<DogProfile> {
        if !(0.1..=150.0).contains(&weight) {
            return Err(AppError::Validation(
                "Weight must be 0.1-150 kg".to_string(),
            ));
        }
        self.mutate(|current, now| {
            let mut profile =
                current.ok_or_else(|| AppError::NotFound("No dog profile".to_string()))?;
            profile.weight = weight;
            profile.updated_at = Some(now);
            Ok(profile)
        })
        .await
    }

    async fn mutate<F>(&self, edit: F) -> Result<DogProfile>
    where
        F: FnOnce(Option<DogProfile>, chrono::DateTime<Utc>) -> Result<DogProfile>,
    {
        let (profile, previous, breeds_changed, scope) = {
            let mut state = self.state.write().await;
            let previous = state.profile.clone();
            let profile = edit(previous.clone(), Utc::now())?;
            let breeds_changed = match &previous {
                Some(previous) => previous.breed_signature() != profile.breed_signature(),
                None => !profile.breeds.is_empty(),
            };

            state.profile = Some(profile.clone());
            state.breeds_dirty |= breeds_changed;
            self.persist(&state).await;
            self.env.active_dog.set(Some(profile.id.clone()));

            let scope = self.env.profile_write_scope();
            if scope.leaves_unsynced() {
                state.dirty = true;
            }
            if breeds_changed && matches!(scope, WriteScope::Deferred(_)) {
                state.pending_breed_analysis = true;
                self.persist_pending(&state).await;
            }
            (profile, previous, breeds_changed, scope)
        };

        if breeds_changed {
            if let Some(previous) = &previous {
                self.breed_cache.invalidate(&previous.breeds).await;
            }
        }

        match scope {
            WriteScope::Guest => {
                if breeds_changed {
                    self.breed_trigger.regenerate(profile.clone()).await;
                }
            }
            WriteScope::Deferred(reason) => {
                dual_write::record_deferred(&self.env, Table::Dogs, &profile.id, reason);
            }
            WriteScope::Ready(scope) => {
                // Faults are absorbed into the unsynced flag.
                let _ = self.push(scope, false).await;
            }
        }

        Ok(self.profile().await.unwrap_or(profile))
    }

    // ─── Remote push ─────────────────────────────────────────────────

    /// Write the profile remotely. `full` rewrites breed rows unconditionally.
    async fn push(&self, scope: RemoteScope, full: bool) -> Result<()> {
        let _push = self.push_lock.lock().await;

        let (profile, breeds_dirty) = {
            let state = self.state.read().await;
            match &state.profile {
                Some(profile) => (profile.clone(), state.breeds_dirty),
                None => return Ok(()),
            }
        };
        let write_breeds = full || breeds_dirty || is_provisional_id(&profile.id);

        let dog_id = match self.write_remote(&scope, &profile, write_breeds).await {
            Ok(dog_id) => dog_id,
            Err(e) => {
                dual_write::record_fault(&self.env, Table::Dogs, &profile.id, "save", &e);
                let mut state = self.state.write().await;
                state.dirty = true;
                if breeds_dirty && !state.pending_breed_analysis {
                    state.pending_breed_analysis = true;
                    self.persist_pending(&state).await;
                }
                return Err(e);
            }
        };

        if !self.env.scope_is_current(&scope) {
            tracing::warn!(dog_id = %dog_id, "Identity changed during profile write, result not applied");
            return Ok(());
        }

        let (synced, fire_analysis) = {
            let mut state = self.state.write().await;
            let unchanged = state.profile.as_ref() == Some(&profile);
            if let Some(current) = state.profile.as_mut() {
                if current.id == profile.id {
                    current.id = dog_id.clone();
                }
            }
            if profile.id != dog_id {
                self.env
                    .active_dog
                    .add_alias(&self.env.local, &profile.id, &dog_id)
                    .await;
                self.env.active_dog.set(Some(dog_id.clone()));
            }
            if unchanged {
                state.dirty = false;
                if write_breeds {
                    state.breeds_dirty = false;
                }
            }
            let fire = (write_breeds && breeds_dirty) || state.pending_breed_analysis;
            if state.pending_breed_analysis {
                state.pending_breed_analysis = false;
                self.persist_pending(&state).await;
            }
            self.persist(&state).await;
            (state.profile.clone(), fire)
        };

        tracing::info!(dog_id = %dog_id, breeds = write_breeds, "Profile synced");
        if fire_analysis {
            if let Some(profile) = synced {
                self.breed_trigger.regenerate(profile).await;
            }
        }
        Ok(())
    }

    /// Insert or upsert the `dogs` row and optionally replace breed rows.
    /// Returns the remote dog id.
    async fn write_remote(
        &self,
        scope: &RemoteScope,
        profile: &DogProfile,
        write_breeds: bool,
    ) -> Result<String> {
        let row = profile.to_dog_row(&scope.user_id)?;
        let returned = if is_provisional_id(&profile.id) {
            self.env.remote.insert(Table::Dogs, scope.clone(), row).await?
        } else {
            self.env.remote.upsert(Table::Dogs, scope.clone(), row).await?
        };
        let dog_id = dual_write::returned_id(&returned)?;

        if write_breeds {
            let dog_scope = scope.for_dog(dog_id.clone());
            self.env
                .remote
                .delete_all(Table::BreedComponents, dog_scope.clone())
                .await?;
            for row in profile.to_breed_rows(&scope.user_id, &dog_id)? {
                self.env
                    .remote
                    .insert(Table::BreedComponents, dog_scope.clone(), row)
                    .await?;
            }
        }
        Ok(dog_id)
    }

    // ─── Backup ──────────────────────────────────────────────────────

    /// Write the local profile and its breed rows to the remote store.
    pub async fn backup(&self) -> BackupReport {
        let mut report = BackupReport::default();
        self.env.recheck_if_offline().await;
        let scope = match self.env.profile_write_scope() {
            WriteScope::Ready(scope) => scope,
            other => {
                report.deferred = other.leaves_unsynced();
                return report;
            }
        };

        // Backup works from the Local Store copy.
        let local: Option<DogProfile> = self.env.local.read_record(keys::PROFILE).await;
        let Some(local) = local else {
            return report;
        };
        {
            let mut state = self.state.write().await;
            if state.profile.is_none() {
                state.profile = Some(local.clone());
            }
        }

        let provisional = is_provisional_id(&local.id);
        match self.push(scope, true).await {
            Ok(()) if provisional => report.inserted += 1,
            Ok(()) => report.upserted += 1,
            Err(_) => report.failed += 1,
        }
        report
    }

    // ─── Local persistence ───────────────────────────────────────────

    async fn persist(&self, state: &ProfileState) {
        if let Some(profile) = &state.profile {
            let _ = self.env.local.write_record(keys::PROFILE, profile).await;
        }
    }

    async fn persist_pending(&self, state: &ProfileState) {
        let _ = self
            .env
            .local
            .write_record(keys::PENDING_BREED_ANALYSIS, &state.pending_breed_analysis)
            .await;
    }
}
