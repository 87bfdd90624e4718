// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Generic local-first collection of dog-scoped records.
//!
//! A [`Collection`] owns the in-memory copy of one Local Store collection and
//! runs every mutation through the dual-write pipeline in
//! [`crate::services::dual_write`]. It also owns hydration, the per-record
//! unsynced marks, offline delete tombstones and manual backup.
//!
//! Locking: the state write lock is held across the local write, so local
//! writes for one collection never interleave. It is released before any
//! remote call. Remote calls for one collection are serialized by a separate
//! push lock, and each push reads the record as it stands when the push runs,
//! so an update queued behind an insert sees the remote id.

use crate::db::{keys, RemoteScope};
use crate::error::{AppError, Result};
use crate::models::{is_provisional_id, SyncRecord};
use crate::services::dual_write::{self, RemoteOp};
use crate::services::env::{SyncEnv, WriteScope};
use crate::services::reachability::Reachability;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Where the current view came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HydrationState {
    #[default]
    Uninitialized,
    Hydrating,
    /// View comes from the Local Store.
    HydratedLocal,
    /// View comes from the remote store, merged with unsynced local edits.
    HydratedRemote,
}

impl HydrationState {
    pub fn is_loading(self) -> bool {
        matches!(self, HydrationState::Uninitialized | HydrationState::Hydrating)
    }
}

/// A remote-origin record deleted locally whose remote delete has not
/// completed yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tombstone {
    pub id: String,
    #[serde(default)]
    pub dog_id: Option<String>,
}

/// Outcome of a manual backup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackupReport {
    pub inserted: usize,
    pub upserted: usize,
    pub deleted: usize,
    pub failed: usize,
    /// Records owned by a dog other than the active one.
    pub skipped: usize,
    /// Nothing was attempted because the remote write could not be made.
    pub deferred: bool,
}

impl BackupReport {
    pub fn is_complete(&self) -> bool {
        self.failed == 0 && !self.deferred
    }

    pub fn written(&self) -> usize {
        self.inserted + self.upserted + self.deleted
    }

    pub fn merge(&mut self, other: &BackupReport) {
        self.inserted += other.inserted;
        self.upserted += other.upserted;
        self.deleted += other.deleted;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.deferred |= other.deferred;
    }
}

struct CollectionState<T> {
    phase: HydrationState,
    all: Vec<T>,
    dirty: BTreeSet<String>,
    tombstones: Vec<Tombstone>,
    /// Provisional id → remote id, for callers still holding the old id.
    renamed: HashMap<String, String>,
}

impl<T: SyncRecord> CollectionState<T> {
    fn resolve(&self, id: &str) -> String {
        self.renamed
            .get(id)
            .cloned()
            .unwrap_or_else(|| id.to_string())
    }

    fn position(&self, id: &str) -> Option<usize> {
        self.all.iter().position(|record| record.id() == id)
    }

    fn find(&self, id: &str) -> Option<&T> {
        self.all.iter().find(|record| record.id() == id)
    }

    /// Give a provisional record its remote id.
    fn rename(&mut self, old_id: &str, new_id: &str, dog_id: &str) {
        if let Some(index) = self.position(old_id) {
            self.all[index].set_id(new_id.to_string());
            self.all[index].set_dog_id(dog_id.to_string());
        }
        if self.dirty.remove(old_id) {
            self.dirty.insert(new_id.to_string());
        }
        self.renamed.insert(old_id.to_string(), new_id.to_string());
    }
}

enum Intent {
    Save,
    Delete,
    DeactivateOthers { changed: Vec<String>, patch: Value },
}

/// Local-first collection of one record type.
pub struct Collection<T: SyncRecord> {
    env: Arc<SyncEnv>,
    state: RwLock<CollectionState<T>>,
    push_lock: Mutex<()>,
}

impl<T: SyncRecord> Collection<T> {
    pub fn new(env: Arc<SyncEnv>) -> Self {
        Self {
            env,
            state: RwLock::new(CollectionState {
                phase: HydrationState::Uninitialized,
                all: Vec::new(),
                dirty: BTreeSet::new(),
                tombstones: Vec::new(),
                renamed: HashMap::new(),
            }),
            push_lock: Mutex::new(()),
        }
    }

    fn tombstone_key() -> String {
        keys::tombstones(T::LOCAL_KEY)
    }

    // ─── Reads ───────────────────────────────────────────────────────

    pub async fn phase(&self) -> HydrationState {
        self.state.read().await.phase
    }

    pub async fn is_loading(&self) -> bool {
        self.phase().await.is_loading()
    }

    /// Records owned by the active dog.
    pub async fn view(&self) -> Vec<T> {
        let state = self.state.read().await;
        state
            .all
            .iter()
            .filter(|record| self.env.active_dog.owns(record.dog_id()))
            .cloned()
            .collect()
    }

    /// Look up a record by current or provisional id.
    pub async fn get(&self, id: &str) -> Option<T> {
        let state = self.state.read().await;
        state.find(&state.resolve(id)).cloned()
    }

    /// Whether anything in this collection still needs a remote write.
    ///
    /// Always false in guest mode.
    pub async fn has_unsynced(&self) -> bool {
        if !self.env.identity.is_authenticated() {
            return false;
        }
        let state = self.state.read().await;
        !state.dirty.is_empty()
            || state
                .tombstones
                .iter()
                .any(|t| self.env.active_dog.owns(t.dog_id.as_deref()))
    }

    // ─── Hydration ───────────────────────────────────────────────────

    /// Rebuild the view from the Local Store and, when possible, the remote
    /// store.
    pub async fn hydrate(&self) {
        self.state.write().await.phase = HydrationState::Hydrating;

        let authenticated = self.env.identity.is_authenticated();
        let remote = self.fetch_remote().await;

        // Local state is re-read under the lock so writes that landed while
        // the remote read was in flight are not lost.
        let mut state = self.state.write().await;
        let local: Vec<T> = self.env.local.read_collection(T::LOCAL_KEY).await;
        let tombstones: Vec<Tombstone> =
            self.env.local.read_collection(&Self::tombstone_key()).await;
        let mut dirty = BTreeSet::new();

        let (all, phase) = match remote {
            Some(remote) if !remote.is_empty() => {
                let all = self.merge(local, remote, &tombstones, &mut dirty);
                (all, HydrationState::HydratedRemote)
            }
            fetched => {
                // Remote empty: every local record is unsynced. Remote
                // unreachable: only records never written remotely are known
                // to be unsynced.
                if authenticated {
                    let remote_empty = fetched.is_some();
                    dirty.extend(
                        local
                            .iter()
                            .filter(|r| self.env.active_dog.owns(r.dog_id()))
                            .filter(|r| remote_empty || is_provisional_id(r.id()))
                            .map(|r| r.id().to_string()),
                    );
                }
                (local, HydrationState::HydratedLocal)
            }
        };

        state.all = all;
        state.dirty = dirty;
        state.tombstones = tombstones;
        state.phase = phase;
        self.persist(&mut state).await;

        tracing::info!(
            table = %T::TABLE,
            ?phase,
            records = state.all.len(),
            unsynced = state.dirty.len(),
            "Collection hydrated"
        );
    }

    /// Read this collection remotely. `None` when not possible or failed.
    async fn fetch_remote(&self) -> Option<Vec<T>> {
        let base = self.env.identity_scope()?;
        let dog_id = self.env.active_dog.remote_id()?;
        let (_, reachability) = self.env.network.refresh(self.env.probe.as_ref()).await;
        if reachability != Reachability::Online {
            return None;
        }

        let scope = base.for_dog(dog_id);
        match self.env.remote.select(T::TABLE, scope.clone()).await {
            Ok(rows) if self.env.scope_is_current(&scope) => Some(
                rows.into_iter()
                    .filter_map(|row| {
                        T::from_row(row)
                            .inspect_err(|e| {
                                tracing::warn!(table = %T::TABLE, error = %e, "Skipping malformed remote row");
                            })
                            .ok()
                    })
                    .collect(),
            ),
            Ok(_) => {
                tracing::warn!(table = %T::TABLE, "Identity changed during remote read");
                None
            }
            Err(e) => {
                if e.is_connectivity() {
                    tracing::warn!(table = %T::TABLE, error = %e, "Remote read failed, using local copy");
                    self.env.network.set(Reachability::Offline);
                } else {
                    tracing::error!(table = %T::TABLE, error = %e, "Remote read rejected, using local copy");
                }
                None
            }
        }
    }

    /// Merge a non-empty remote view with the local collection.
    fn merge(
        &self,
        local: Vec<T>,
        remote: Vec<T>,
        tombstones: &[Tombstone],
        dirty: &mut BTreeSet<String>,
    ) -> Vec<T> {
        let tombstoned: HashSet<&str> = tombstones.iter().map(|t| t.id.as_str()).collect();
        let remote: Vec<T> = remote
            .into_iter()
            .filter(|r| !tombstoned.contains(r.id()))
            .collect();
        let remote_ids: HashSet<String> = remote.iter().map(|r| r.id().to_string()).collect();

        let mut other_dogs = Vec::new();
        let mut local_only = Vec::new();
        let mut shared: HashMap<String, T> = HashMap::new();
        for record in local {
            if !self.env.active_dog.owns(record.dog_id()) {
                other_dogs.push(record);
            } else if remote_ids.contains(record.id()) {
                shared.insert(record.id().to_string(), record);
            } else {
                dirty.insert(record.id().to_string());
                local_only.push(record);
            }
        }

        let mut merged = other_dogs;
        for remote_record in remote {
            match shared.remove(remote_record.id()) {
                Some(local) if is_newer(local.revision(), remote_record.revision()) => {
                    tracing::debug!(table = %T::TABLE, id = local.id(), "Keeping newer offline edit");
                    dirty.insert(local.id().to_string());
                    merged.push(local);
                }
                _ => merged.push(remote_record),
            }
        }
        merged.extend(local_only);
        merged
    }

    // ─── Mutations ───────────────────────────────────────────────────

    /// Add a record. Records without an owner are assigned the active dog.
    pub async fn insert(&self, mut record: T) -> Result<T> {
        let id = record.id().to_string();
        let scope = {
            let mut state = self.state.write().await;
            if record.dog_id().is_none() {
                if let Some(dog_id) = self.env.active_dog.id() {
                    record.set_dog_id(dog_id);
                }
            }
            state.all.push(record.clone());
            self.persist(&mut state).await;
            let scope = self.env.write_scope();
            if scope.leaves_unsynced() {
                state.dirty.insert(id.clone());
            }
            scope
        };

        self.push(id.clone(), Intent::Save, scope).await;
        Ok(self.get(&id).await.unwrap_or(record))
    }

    /// Apply `edit` to a copy of the record; nothing is written if it fails.
    pub async fn update<F>(&self, id: &str, edit: F) -> Result<T>
    where
        F: FnOnce(&mut T) -> Result<()>,
    {
        let (id, updated, scope) = {
            let mut state = self.state.write().await;
            let id = state.resolve(id);
            let index = state
                .position(&id)
                .ok_or_else(|| AppError::NotFound(format!("{} {}", T::TABLE, id)))?;
            let mut updated = state.all[index].clone();
            edit(&mut updated)?;
            state.all[index] = updated.clone();
            self.persist(&mut state).await;
            let scope = self.env.write_scope();
            if scope.leaves_unsynced() {
                state.dirty.insert(id.clone());
            }
            (id, updated, scope)
        };

        self.push(id.clone(), Intent::Save, scope).await;
        Ok(self.get(&id).await.unwrap_or(updated))
    }

    /// Delete a record.
    pub async fn remove(&self, id: &str) -> Result<()> {
        let (id, scope) = {
            let mut state = self.state.write().await;
            let id = state.resolve(id);
            let index = state
                .position(&id)
                .ok_or_else(|| AppError::NotFound(format!("{} {}", T::TABLE, id)))?;
            let removed = state.all.remove(index);
            state.dirty.remove(&id);
            self.persist(&mut state).await;

            let scope = self.env.write_scope();
            if scope.leaves_unsynced() && !is_provisional_id(&id) {
                state.tombstones.push(Tombstone {
                    id: id.clone(),
                    dog_id: removed.dog_id().map(str::to_string),
                });
                self.persist_tombstones(&state).await;
            }
            (id, scope)
        };

        if !is_provisional_id(&id) {
            self.push(id, Intent::Delete, scope).await;
        }
        Ok(())
    }

    /// Apply `deactivate` to every other record of the active dog locally, and
    /// `patch` to every other active row remotely. `deactivate` returns whether
    /// it changed the record. `patch` must carry the same field values so the
    /// two copies compare equal on the next hydration.
    pub async fn deactivate_others<F>(&self, keep_id: &str, patch: Value, mut deactivate: F)
    where
        F: FnMut(&mut T) -> bool,
    {
        let (keep_id, changed, scope) = {
            let mut state = self.state.write().await;
            let keep_id = state.resolve(keep_id);
            let mut changed = Vec::new();
            for record in state.all.iter_mut() {
                if record.id() != keep_id
                    && self.env.active_dog.owns(record.dog_id())
                    && deactivate(record)
                {
                    changed.push(record.id().to_string());
                }
            }
            self.persist(&mut state).await;
            let scope = self.env.write_scope();
            if let WriteScope::Deferred(_) = scope {
                state.dirty.extend(changed.iter().cloned());
            }
            (keep_id, changed, scope)
        };

        // Remote rows may be active even when nothing changed locally.
        self.push(keep_id, Intent::DeactivateOthers { changed, patch }, scope)
            .await;
    }

    // ─── Remote push ─────────────────────────────────────────────────

    async fn push(&self, id: String, intent: Intent, scope: WriteScope) {
        let scope = match scope {
            WriteScope::Ready(scope) => scope,
            WriteScope::Deferred(reason) => {
                dual_write::record_deferred(&self.env, T::TABLE, &id, reason);
                return;
            }
            WriteScope::Guest => return,
        };
        let Some(dog_id) = scope.dog_id.clone() else {
            return;
        };

        let _push = self.push_lock.lock().await;

        let (id, op, snapshot) = {
            let state = self.state.read().await;
            let id = state.resolve(&id);
            match &intent {
                Intent::Save => {
                    // Deleted while queued.
                    let Some(record) = state.find(&id) else {
                        return;
                    };
                    if !self.env.active_dog.owns(record.dog_id()) {
                        tracing::debug!(table = %T::TABLE, id = %id, "Record belongs to another dog, not pushed");
                        return;
                    }
                    let row = match record.to_row(&scope.user_id, &dog_id) {
                        Ok(row) => row,
                        Err(e) => {
                            dual_write::record_fault(&self.env, T::TABLE, &id, "map", &e);
                            return;
                        }
                    };
                    let op = if is_provisional_id(&id) {
                        RemoteOp::Insert { row }
                    } else {
                        RemoteOp::Update {
                            id: id.clone(),
                            row,
                        }
                    };
                    (id, op, Some(record.clone()))
                }
                Intent::Delete => (id.clone(), RemoteOp::Delete { id }, None),
                Intent::DeactivateOthers { patch, .. } => {
                    let keep_id = (!is_provisional_id(&id)).then(|| id.clone());
                    let op = RemoteOp::DeactivateOthers {
                        keep_id,
                        patch: patch.clone(),
                    };
                    (id, op, None)
                }
            }
        };

        let op_name = op.name();
        let inserted = matches!(op, RemoteOp::Insert { .. });
        let result =
            dual_write::execute(self.env.remote.as_ref(), T::TABLE, scope.clone(), op).await;

        match result {
            Ok(_) if !self.env.scope_is_current(&scope) => {
                tracing::warn!(table = %T::TABLE, id = %id, op = op_name, "Identity changed during remote write, result not applied");
                if let Intent::Save = intent {
                    self.state.write().await.dirty.insert(id);
                }
            }
            Ok(returned) => {
                let mut state = self.state.write().await;
                match intent {
                    Intent::Save => {
                        let unchanged = snapshot.as_ref() == state.find(&id);
                        let mut current_id = id.clone();
                        if inserted {
                            let new_id = returned
                                .as_ref()
                                .ok_or_else(|| AppError::rejected("Insert returned no row"))
                                .and_then(dual_write::returned_id);
                            match new_id {
                                Ok(new_id) => {
                                    state.rename(&id, &new_id, &dog_id);
                                    current_id = new_id;
                                }
                                Err(e) => {
                                    dual_write::record_fault(&self.env, T::TABLE, &id, op_name, &e);
                                    state.dirty.insert(id);
                                    return;
                                }
                            }
                        }
                        if unchanged {
                            state.dirty.remove(&current_id);
                        }
                        self.persist(&mut state).await;
                        tracing::debug!(table = %T::TABLE, id = %current_id, op = op_name, "Remote write reconciled");
                    }
                    Intent::Delete => {
                        state.tombstones.retain(|t| t.id != id);
                        self.persist_tombstones(&state).await;
                        tracing::debug!(table = %T::TABLE, id = %id, "Remote delete applied");
                    }
                    Intent::DeactivateOthers { .. } => {
                        tracing::debug!(table = %T::TABLE, keep_id = %id, "Other records deactivated remotely");
                    }
                }
            }
            Err(e) => {
                dual_write::record_fault(&self.env, T::TABLE, &id, op_name, &e);
                let mut state = self.state.write().await;
                match intent {
                    Intent::Save => {
                        state.dirty.insert(id);
                    }
                    Intent::Delete => {
                        if !state.tombstones.iter().any(|t| t.id == id) {
                            state.tombstones.push(Tombstone {
                                id,
                                dog_id: Some(dog_id),
                            });
                            self.persist_tombstones(&state).await;
                        }
                    }
                    Intent::DeactivateOthers { changed, .. } => {
                        state.dirty.extend(changed);
                    }
                }
            }
        }
    }

    // ─── Backup ──────────────────────────────────────────────────────

    /// Write the entire local collection to the remote store.
    ///
    /// Pending deletes go first. Provisional records are inserted, remote-origin
    /// records upserted. Failures are counted and skipped. Running it twice
    /// writes the same rows twice and creates nothing new.
    pub async fn backup(&self) -> BackupReport {
        let mut report = BackupReport::default();
        self.env.recheck_if_offline().await;
        let scope = match self.env.write_scope() {
            WriteScope::Ready(scope) => scope,
            other => {
                report.deferred = other.leaves_unsynced();
                tracing::debug!(table = %T::TABLE, scope = ?other, "Backup not attempted");
                return report;
            }
        };
        let Some(dog_id) = scope.dog_id.clone() else {
            return report;
        };

        let _push = self.push_lock.lock().await;

        let tombstones = self.state.read().await.tombstones.clone();
        let cleared = self.replay_tombstones(&scope, tombstones, &mut report).await;

        let records: Vec<T> = self.env.local.read_collection(T::LOCAL_KEY).await;
        let mut synced: Vec<(T, Option<String>)> = Vec::new();
        for record in records {
            if !self.env.active_dog.owns(record.dog_id()) {
                report.skipped += 1;
                continue;
            }
            match self.backup_one(&scope, &dog_id, &record).await {
                Ok(new_id) => {
                    if new_id.is_some() {
                        report.inserted += 1;
                    } else {
                        report.upserted += 1;
                    }
                    synced.push((record, new_id));
                }
                Err(e) => {
                    dual_write::record_fault(&self.env, T::TABLE, record.id(), "backup", &e);
                    report.failed += 1;
                }
            }
        }

        if !self.env.scope_is_current(&scope) {
            tracing::warn!(table = %T::TABLE, "Identity changed during backup, results not applied");
            return report;
        }

        let mut state = self.state.write().await;
        if !cleared.is_empty() {
            state.tombstones.retain(|t| !cleared.contains(&t.id));
            self.persist_tombstones(&state).await;
        }
        for (sent, new_id) in synced {
            let id = state.resolve(sent.id());
            let unchanged = state.find(&id) == Some(&sent);
            let current_id = match new_id {
                Some(new_id) => {
                    state.rename(&id, &new_id, &dog_id);
                    new_id
                }
                None => id,
            };
            if unchanged {
                state.dirty.remove(&current_id);
            }
        }
        self.persist(&mut state).await;

        tracing::info!(
            table = %T::TABLE,
            inserted = report.inserted,
            upserted = report.upserted,
            deleted = report.deleted,
            failed = report.failed,
            "Backup finished"
        );
        report
    }

    /// Write one record; returns the new remote id for inserts.
    async fn backup_one(
        &self,
        scope: &RemoteScope,
        dog_id: &str,
        record: &T,
    ) -> Result<Option<String>> {
        let row = record.to_row(&scope.user_id, dog_id)?;
        if is_provisional_id(record.id()) {
            let returned = self.env.remote.insert(T::TABLE, scope.clone(), row).await?;
            dual_write::returned_id(&returned).map(Some)
        } else {
            self.env.remote.upsert(T::TABLE, scope.clone(), row).await?;
            Ok(None)
        }
    }

    /// Apply pending deletes; returns the ids that are done.
    async fn replay_tombstones(
        &self,
        scope: &RemoteScope,
        tombstones: Vec<Tombstone>,
        report: &mut BackupReport,
    ) -> HashSet<String> {
        let mut cleared = HashSet::new();
        for tombstone in tombstones {
            if !self.env.active_dog.owns(tombstone.dog_id.as_deref()) {
                report.skipped += 1;
                continue;
            }
            let op = RemoteOp::Delete {
                id: tombstone.id.clone(),
            };
            match dual_write::execute(self.env.remote.as_ref(), T::TABLE, scope.clone(), op).await
            {
                Ok(_) => {
                    report.deleted += 1;
                    cleared.insert(tombstone.id);
                }
                Err(e) => {
                    dual_write::record_fault(&self.env, T::TABLE, &tombstone.id, "delete", &e);
                    report.failed += 1;
                }
            }
        }
        cleared
    }

    // ─── Local persistence ───────────────────────────────────────────

    /// Write the whole collection, rewriting aliased owners to their newest id.
    ///
    /// Failures are logged by the store; in-memory state is kept either way.
    async fn persist(&self, state: &mut CollectionState<T>) {
        for record in state.all.iter_mut() {
            let resolved = record.dog_id().and_then(|dog_id| {
                let resolved = self.env.active_dog.resolve(dog_id);
                (resolved != dog_id).then_some(resolved)
            });
            if let Some(resolved) = resolved {
                record.set_dog_id(resolved);
            }
        }
        let _ = self
            .env
            .local
            .write_collection(T::LOCAL_KEY, &state.all)
            .await;
    }

    async fn persist_tombstones(&self, state: &CollectionState<T>) {
        let _ = self
            .env
            .local
            .write_collection(&Self::tombstone_key(), &state.tombstones)
            .await;
    }

}

/// Whether a local revision should win over the remote one.
pub(crate) fn is_newer(local: Option<DateTime<Utc>>, remote: Option<DateTime<Utc>>) -> bool {
    match (local, remote) {
        (Some(local), Some(remote)) => local > remote,
        (Some(_), None) => true,
        _ => false,
    }
}
