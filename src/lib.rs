// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! PawTrack: local-first sync core for a dog activity tracker
//!
//! This crate keeps a dog's profile, activities, health notes and goals in
//! on-device storage and mirrors them to a hosted PostgREST data service
//! whenever an identity and connectivity allow.

pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod time_utils;

use config::Config;
use db::{LocalStore, RemoteStore};
use error::Result;
use models::{Activity, HealthNote, NewActivity, NewHealthNote};
use services::{
    ActivitiesManager, BreedAnalysisCache, BreedAnalysisTrigger, GoalsManager, IdentityProvider,
    Orchestrator, ProfileManager, ReachabilityProbe, SyncEnv, SyncTrigger,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Shared sync state: every manager plus the orchestrator composing them.
pub struct SyncContext {
    pub env: Arc<SyncEnv>,
    pub profile: Arc<ProfileManager>,
    pub activities: Arc<ActivitiesManager>,
    pub goals: Arc<GoalsManager>,
    pub orchestrator: Arc<Orchestrator>,
    pub breed_cache: Arc<BreedAnalysisCache>,
}

/// Background tasks started by [`SyncContext::start`].
pub struct SyncTasks {
    /// Send foreground/background and OS connectivity events here.
    pub triggers: mpsc::Sender<SyncTrigger>,
    pub handles: Vec<JoinHandle<()>>,
}

impl SyncTasks {
    pub fn abort(&self) {
        for handle in &self.handles {
            handle.abort();
        }
    }
}

impl SyncContext {
    pub fn new(
        local: LocalStore,
        remote: Arc<dyn RemoteStore>,
        probe: Arc<dyn ReachabilityProbe>,
        identity: Arc<IdentityProvider>,
        breed_trigger: Arc<dyn BreedAnalysisTrigger>,
        sync_pass_timeout: Duration,
    ) -> Self {
        let breed_cache = Arc::new(BreedAnalysisCache::new(local.clone()));
        let env = Arc::new(SyncEnv::new(local, remote, probe, identity));
        let profile = Arc::new(ProfileManager::new(
            env.clone(),
            breed_trigger,
            breed_cache.clone(),
        ));
        let activities = Arc::new(ActivitiesManager::new(env.clone()));
        let goals = Arc::new(GoalsManager::new(env.clone()));
        let orchestrator = Arc::new(Orchestrator::new(
            env.clone(),
            profile.clone(),
            activities.clone(),
            goals.clone(),
            sync_pass_timeout,
        ));

        Self {
            env,
            profile,
            activities,
            goals,
            orchestrator,
            breed_cache,
        }
    }

    /// Build from configuration with the production HTTP client and probe.
    pub fn from_config(
        config: &Config,
        identity: Arc<IdentityProvider>,
        breed_trigger: Arc<dyn BreedAnalysisTrigger>,
    ) -> Result<Self> {
        let local = LocalStore::open(&config.data_dir);
        let remote = Arc::new(db::PostgrestClient::new(
            &config.remote_url,
            config.remote_api_key.clone(),
        ));
        let probe = Arc::new(services::HttpProbe::new(
            &config.remote_url,
            config.remote_api_key.clone(),
            config.probe_timeout,
        )?);
        Ok(Self::new(
            local,
            remote,
            probe,
            identity,
            breed_trigger,
            config.sync_pass_timeout,
        ))
    }

    /// Load persisted side tables and hydrate every domain.
    pub async fn load(&self) {
        self.env.active_dog.load(&self.env.local).await;
        self.breed_cache.load().await;
        self.orchestrator.hydrate_all().await;
    }

    /// Load, then start the trigger loop, poller and identity watcher.
    pub async fn start(&self, poll_interval: Duration) -> SyncTasks {
        self.load().await;

        let (triggers, rx) = mpsc::channel(32);
        let handles = vec![
            self.orchestrator.spawn_trigger_loop(rx),
            Orchestrator::spawn_poller(triggers.clone(), poll_interval),
            self.orchestrator.spawn_identity_watcher(),
        ];
        SyncTasks { triggers, handles }
    }

    /// Log an activity and apply it to the active goal and profile weight.
    ///
    /// Only a fault in the activity itself is returned. Once it is saved,
    /// follow-on updates that fail are logged.
    pub async fn log_activity(&self, input: NewActivity) -> Result<Activity> {
        let activity = self.activities.add_activity(input).await?;
        if activity.contributes_to_goal {
            if let Err(e) = self
                .goals
                .apply_training_points(activity.training_points)
                .await
            {
                tracing::warn!(id = %activity.id, error = %e, "Training points not applied to goal");
            }
        }
        if let Some(weight) = activity.weight {
            self.record_weight(&activity.id, weight).await;
        }
        Ok(activity)
    }

    /// Add a health note and apply any weight it records.
    pub async fn add_health_note(&self, input: NewHealthNote) -> Result<HealthNote> {
        let note = self.activities.add_health_note(input).await?;
        if let Some(weight) = note.weight {
            self.record_weight(&note.id, weight).await;
        }
        Ok(note)
    }

    async fn record_weight(&self, source_id: &str, weight: f64) {
        if let Err(e) = self.goals.apply_weight_observation(weight).await {
            tracing::warn!(source_id, error = %e, "Weight not applied to goal");
        }
        if let Err(e) = self.profile.record_weight(weight).await {
            tracing::warn!(source_id, error = %e, "Weight not applied to profile");
        }
    }
}
