// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Shared collaborators for the sync managers, and the per-mutation decision
//! of whether a remote write may be attempted.

use crate::db::{keys, LocalStore, RemoteScope, RemoteStore};
use crate::models::is_provisional_id;
use crate::services::identity::IdentityProvider;
use crate::services::notices::Notifier;
use crate::services::reachability::{NetworkStatus, ReachabilityProbe};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Why a mutation stayed local even though an identity is present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeferReason {
    Offline,
    ProfileNotSynced,
}

/// Where a mutation may go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteScope {
    /// No identity. Local only, nothing to sync later.
    Guest,
    /// Identity present but the remote write cannot be attempted now.
    Deferred(DeferReason),
    /// Remote write may be attempted with this scope.
    Ready(RemoteScope),
}

impl WriteScope {
    /// Whether a local-only write leaves something to sync later.
    pub fn leaves_unsynced(&self) -> bool {
        !matches!(self, WriteScope::Guest)
    }
}

/// The profile currently in view, plus provisional → remote id aliases.
pub struct ActiveDog {
    current: watch::Sender<Option<String>>,
    aliases: DashMap<String, String>,
}

impl Default for ActiveDog {
    fn default() -> Self {
        let (current, _rx) = watch::channel(None);
        Self {
            current,
            aliases: DashMap::new(),
        }
    }
}

impl ActiveDog {
    pub fn id(&self) -> Option<String> {
        self.current.borrow().clone()
    }

    /// Remote id of the active dog, if it has one.
    pub fn remote_id(&self) -> Option<String> {
        self.id().filter(|id| !is_provisional_id(id))
    }

    pub fn set(&self, id: Option<String>) {
        self.current.send_if_modified(|current| {
            if *current == id {
                return false;
            }
            tracing::debug!(dog_id = ?id, "Active dog changed");
            *current = id;
            true
        });
    }

    pub fn subscribe(&self) -> watch::Receiver<Option<String>> {
        self.current.subscribe()
    }

    /// Follow aliases to the newest known id.
    pub fn resolve(&self, id: &str) -> String {
        let mut resolved = id.to_string();
        // Bounded walk so a corrupt alias cycle cannot hang.
        for _ in 0..8 {
            match self.aliases.get(&resolved) {
                Some(next) if *next != resolved => resolved = next.clone(),
                _ => break,
            }
        }
        resolved
    }

    /// Whether a record owned by `dog_id` belongs to the active dog.
    ///
    /// Records with no owner belong to whichever dog is active.
    pub fn owns(&self, dog_id: Option<&str>) -> bool {
        match (dog_id, self.id()) {
            (None, _) => true,
            (Some(_), None) => false,
            (Some(dog_id), Some(active)) => self.resolve(dog_id) == self.resolve(&active),
        }
    }

    /// Load persisted aliases.
    pub async fn load(&self, local: &LocalStore) {
        let stored: HashMap<String, String> = local
            .read_record(keys::DOG_ID_ALIASES)
            .await
            .unwrap_or_default();
        for (from, to) in stored {
            self.aliases.insert(from, to);
        }
    }

    /// Record that `from` now means `to`, and persist the alias table.
    pub async fn add_alias(&self, local: &LocalStore, from: &str, to: &str) {
        if from == to {
            return;
        }
        tracing::info!(from, to, "Recording dog id alias");
        self.aliases.insert(from.to_string(), to.to_string());
        let snapshot: HashMap<String, String> = self
            .aliases
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect();
        // Failure is logged by the store; the in-memory alias still applies.
        let _ = local.write_record(keys::DOG_ID_ALIASES, &snapshot).await;
    }
}

/// Everything a sync manager talks to.
pub struct SyncEnv {
    pub local: LocalStore,
    pub remote: Arc<dyn RemoteStore>,
    pub probe: Arc<dyn ReachabilityProbe>,
    pub identity: Arc<IdentityProvider>,
    pub network: NetworkStatus,
    pub active_dog: ActiveDog,
    pub notifier: Notifier,
}

impl SyncEnv {
    pub fn new(
        local: LocalStore,
        remote: Arc<dyn RemoteStore>,
        probe: Arc<dyn ReachabilityProbe>,
        identity: Arc<IdentityProvider>,
    ) -> Self {
        Self {
            local,
            remote,
            probe,
            identity,
            network: NetworkStatus::default(),
            active_dog: ActiveDog::default(),
            notifier: Notifier::default(),
        }
    }

    /// Probe again when the last observation was offline.
    pub async fn recheck_if_offline(&self) {
        if self.network.is_offline() {
            self.network.refresh(self.probe.as_ref()).await;
        }
    }

    /// Scope for identity-only tables (`dogs`), if an identity is present.
    pub fn identity_scope(&self) -> Option<RemoteScope> {
        let state = self.identity.snapshot();
        state.identity.map(|identity| RemoteScope {
            user_id: identity.user_id,
            access_token: identity.access_token,
            dog_id: None,
            generation: state.refresh_trigger,
        })
    }

    /// Decide where a profile mutation may go.
    pub fn profile_write_scope(&self) -> WriteScope {
        match self.identity_scope() {
            None => WriteScope::Guest,
            Some(_) if self.network.is_offline() => WriteScope::Deferred(DeferReason::Offline),
            Some(scope) => WriteScope::Ready(scope),
        }
    }

    /// Decide where a dog-scoped mutation may go.
    pub fn write_scope(&self) -> WriteScope {
        match self.profile_write_scope() {
            WriteScope::Ready(scope) => match self.active_dog.remote_id() {
                Some(dog_id) => WriteScope::Ready(scope.for_dog(dog_id)),
                None => WriteScope::Deferred(DeferReason::ProfileNotSynced),
            },
            other => other,
        }
    }

    /// Whether a remote result obtained under `scope` may still be applied.
    ///
    /// False once the identity has changed, or the active dog has moved on.
    pub fn scope_is_current(&self, scope: &RemoteScope) -> bool {
        let state = self.identity.snapshot();
        let same_identity = state.refresh_trigger == scope.generation
            && state
                .identity
                .as_ref()
                .is_some_and(|identity| identity.user_id == scope.user_id);
        let same_dog = match &scope.dog_id {
            None => true,
            Some(dog_id) => self.active_dog.remote_id().as_deref() == Some(dog_id.as_str()),
        };
        same_identity && same_dog
    }
}
