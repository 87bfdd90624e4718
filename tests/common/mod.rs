// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{Duration, Utc};
use futures_util::future::BoxFuture;
use pawtrack::db::{keys, LocalStore, RemoteScope, RemoteStore, Table};
use pawtrack::error::{AppError, Result};
use pawtrack::models::{
    ActivityType, BreedComponent, Effort, GoalType, NewActivity, NewGoal, ProfileInput,
};
use pawtrack::services::{
    BreedAnalysisTrigger, Identity, IdentityProvider, Reachability, ReachabilityProbe,
};
use pawtrack::SyncContext;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const USER_ID: &str = "5d1c2b8e-6a0f-4c3e-9b7d-2f4a1e8c0d93";

/// How the fake remote store answers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(dead_code)]
pub enum Failure {
    #[default]
    None,
    /// Every call fails as if the network were down.
    Offline,
    /// Every call is declined.
    Reject,
    /// Every call waits forever.
    Hang,
}

/// In-memory remote store with PostgREST-like scoping.
#[derive(Default)]
pub struct FakeRemote {
    tables: Mutex<HashMap<Table, Vec<Value>>>,
    failure: Mutex<Failure>,
    calls: Mutex<Vec<(&'static str, Table)>>,
    /// Local Store to snapshot on every write, if set.
    observed: Mutex<Option<LocalStore>>,
    /// Local Store documents seen at the moment of each write.
    local_at_write: Mutex<Vec<(Table, Value)>>,
}

#[allow(dead_code)]
impl FakeRemote {
    pub fn fail(&self, failure: Failure) {
        *self.failure.lock().unwrap() = failure;
    }

    pub fn observe(&self, local: LocalStore) {
        *self.observed.lock().unwrap() = Some(local);
    }

    pub fn seed(&self, table: Table, row: Value) {
        self.tables
            .lock()
            .unwrap()
            .entry(table)
            .or_default()
            .push(row);
    }

    pub fn rows(&self, table: Table) -> Vec<Value> {
        self.tables
            .lock()
            .unwrap()
            .get(&table)
            .cloned()
            .unwrap_or_default()
    }

    pub fn calls(&self) -> Vec<(&'static str, Table)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, op: &str, table: Table) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|(o, t)| *o == op && *t == table)
            .count()
    }

    pub fn local_at_write(&self, table: Table) -> Vec<Value> {
        self.local_at_write
            .lock()
            .unwrap()
            .iter()
            .filter(|(t, _)| *t == table)
            .map(|(_, doc)| doc.clone())
            .collect()
    }

    async fn gate(&self, op: &'static str, table: Table) -> Result<()> {
        self.calls.lock().unwrap().push((op, table));
        let failure = *self.failure.lock().unwrap();
        match failure {
            Failure::None => Ok(()),
            Failure::Offline => Err(AppError::Offline("connection refused".to_string())),
            Failure::Reject => Err(AppError::Rejected {
                status: Some(403),
                message: "HTTP 403: permission denied".to_string(),
            }),
            Failure::Hang => std::future::pending().await,
        }
    }

    async fn snapshot_local(&self, table: Table) {
        let key = match table {
            Table::Dogs => keys::PROFILE,
            Table::Activities => keys::ACTIVITIES,
            Table::HealthNotes => keys::HEALTH_NOTES,
            Table::Goals => keys::GOALS,
            Table::BreedComponents => return,
        };
        let local = self.observed.lock().unwrap().clone();
        if let Some(local) = local {
            let doc: Value = local.read_record(key).await.unwrap_or(Value::Null);
            self.local_at_write.lock().unwrap().push((table, doc));
        }
    }

    fn in_scope(table: Table, scope: &RemoteScope, row: &Value) -> bool {
        let user = row.get("user_id").and_then(Value::as_str);
        let dog = row.get("dog_id").and_then(Value::as_str);
        user == Some(scope.user_id.as_str())
            && (!table.is_dog_scoped() || dog == scope.dog_id.as_deref())
    }

    fn check_scope(table: Table, scope: &RemoteScope) -> Result<()> {
        if table.is_dog_scoped() && scope.dog_id.is_none() {
            return Err(AppError::rejected("dog-scoped request without dog id"));
        }
        Ok(())
    }

    fn owned(table: Table, scope: &RemoteScope, mut row: Value) -> Value {
        if let Some(object) = row.as_object_mut() {
            object.insert("user_id".into(), Value::String(scope.user_id.clone()));
            if let (true, Some(dog_id)) = (table.is_dog_scoped(), &scope.dog_id) {
                object.insert("dog_id".into(), Value::String(dog_id.clone()));
            }
            if !object.contains_key("id") {
                object.insert("id".into(), Value::String(uuid::Uuid::new_v4().to_string()));
            }
        }
        row
    }
}

fn merge_into(target: &mut Value, patch: &Value) {
    if let (Some(target), Some(patch)) = (target.as_object_mut(), patch.as_object()) {
        for (key, value) in patch {
            target.insert(key.clone(), value.clone());
        }
    }
}

fn row_id(row: &Value) -> Option<&str> {
    row.get("id").and_then(Value::as_str)
}

impl RemoteStore for FakeRemote {
    fn select(&self, table: Table, scope: RemoteScope) -> BoxFuture<'_, Result<Vec<Value>>> {
        Box::pin(async move {
            self.gate("select", table).await?;
            Self::check_scope(table, &scope)?;
            Ok(self
                .rows(table)
                .into_iter()
                .filter(|row| Self::in_scope(table, &scope, row))
                .collect())
        })
    }

    fn insert(&self, table: Table, scope: RemoteScope, row: Value) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            self.gate("insert", table).await?;
            Self::check_scope(table, &scope)?;
            self.snapshot_local(table).await;
            let row = Self::owned(table, &scope, row);
            self.seed(table, row.clone());
            Ok(row)
        })
    }

    fn upsert(&self, table: Table, scope: RemoteScope, row: Value) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            self.gate("upsert", table).await?;
            Self::check_scope(table, &scope)?;
            self.snapshot_local(table).await;
            let row = Self::owned(table, &scope, row);
            let mut tables = self.tables.lock().unwrap();
            let rows = tables.entry(table).or_default();
            match rows
                .iter_mut()
                .find(|existing| row_id(existing) == row_id(&row))
            {
                Some(existing) => {
                    merge_into(existing, &row);
                    Ok(existing.clone())
                }
                None => {
                    rows.push(row.clone());
                    Ok(row)
                }
            }
        })
    }

    fn update(
        &self,
        table: Table,
        scope: RemoteScope,
        id: String,
        row: Value,
    ) -> BoxFuture<'_, Result<Value>> {
        Box::pin(async move {
            self.gate("update", table).await?;
            Self::check_scope(table, &scope)?;
            self.snapshot_local(table).await;
            let mut patch = row;
            if let Some(object) = patch.as_object_mut() {
                object.remove("id");
            }
            let mut tables = self.tables.lock().unwrap();
            let rows = tables.entry(table).or_default();
            let existing = rows
                .iter_mut()
                .find(|r| row_id(r) == Some(id.as_str()) && Self::in_scope(table, &scope, r))
                .ok_or_else(|| AppError::rejected(format!("{} {} not found", table, id)))?;
            merge_into(existing, &patch);
            Ok(existing.clone())
        })
    }

    fn deactivate_others(
        &self,
        table: Table,
        scope: RemoteScope,
        keep_id: Option<String>,
        patch: Value,
    ) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.gate("deactivate_others", table).await?;
            Self::check_scope(table, &scope)?;
            if let Some(keep_id) = keep_id.as_deref().filter(|id| !is_remote_id(id)) {
                // A uuid column refuses a non-uuid literal.
                return Err(AppError::Rejected {
                    status: Some(400),
                    message: format!("invalid input syntax for type uuid: \"{}\"", keep_id),
                });
            }
            let mut tables = self.tables.lock().unwrap();
            for row in tables.entry(table).or_default().iter_mut() {
                if row_id(row) != keep_id.as_deref()
                    && row["is_active"] == true
                    && Self::in_scope(table, &scope, row)
                {
                    merge_into(row, &patch);
                }
            }
            Ok(())
        })
    }

    fn delete(&self, table: Table, scope: RemoteScope, id: String) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.gate("delete", table).await?;
            Self::check_scope(table, &scope)?;
            let mut tables = self.tables.lock().unwrap();
            tables
                .entry(table)
                .or_default()
                .retain(|r| !(row_id(r) == Some(id.as_str()) && Self::in_scope(table, &scope, r)));
            Ok(())
        })
    }

    fn delete_all(&self, table: Table, scope: RemoteScope) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            self.gate("delete_all", table).await?;
            Self::check_scope(table, &scope)?;
            let mut tables = self.tables.lock().unwrap();
            tables
                .entry(table)
                .or_default()
                .retain(|r| !Self::in_scope(table, &scope, r));
            Ok(())
        })
    }
}

/// Probe whose answer the test controls.
pub struct SwitchProbe {
    reachable: AtomicBool,
    probes: AtomicUsize,
}

#[allow(dead_code)]
impl SwitchProbe {
    pub fn new(reachable: bool) -> Self {
        Self {
            reachable: AtomicBool::new(reachable),
            probes: AtomicUsize::new(0),
        }
    }

    pub fn set(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }

    pub fn probes(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }
}

impl ReachabilityProbe for SwitchProbe {
    fn is_reachable(&self) -> BoxFuture<'_, bool> {
        Box::pin(async move {
            self.probes.fetch_add(1, Ordering::SeqCst);
            self.reachable.load(Ordering::SeqCst)
        })
    }
}

/// Breed analysis trigger that counts regenerations.
#[derive(Default)]
pub struct CountingAnalysis {
    runs: AtomicUsize,
}

#[allow(dead_code)]
impl CountingAnalysis {
    pub fn runs(&self) -> usize {
        self.runs.load(Ordering::SeqCst)
    }
}

impl BreedAnalysisTrigger for CountingAnalysis {
    fn regenerate(&self, _profile: pawtrack::models::DogProfile) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            self.runs.fetch_add(1, Ordering::SeqCst);
        })
    }
}

/// A sync context wired to fakes.
pub struct Harness {
    pub ctx: SyncContext,
    pub local: LocalStore,
    pub remote: Arc<FakeRemote>,
    pub probe: Arc<SwitchProbe>,
    pub identity: Arc<IdentityProvider>,
    pub analysis: Arc<CountingAnalysis>,
}

#[allow(dead_code)]
impl Harness {
    pub fn new(identity: IdentityProvider) -> Self {
        Self::with_local(identity, LocalStore::in_memory())
    }

    pub fn with_local(identity: IdentityProvider, local: LocalStore) -> Self {
        let remote = Arc::new(FakeRemote::default());
        remote.observe(local.clone());
        let probe = Arc::new(SwitchProbe::new(true));
        let identity = Arc::new(identity);
        let analysis = Arc::new(CountingAnalysis::default());
        let ctx = SyncContext::new(
            local.clone(),
            remote.clone(),
            probe.clone(),
            identity.clone(),
            analysis.clone(),
            std::time::Duration::from_secs(5),
        );
        Self {
            ctx,
            local,
            remote,
            probe,
            identity,
            analysis,
        }
    }

    pub fn guest() -> Self {
        Self::new(IdentityProvider::guest())
    }

    pub fn signed_in() -> Self {
        Self::new(IdentityProvider::signed_in(identity()))
    }

    /// Signed in with a profile that already exists remotely.
    pub async fn signed_in_with_dog() -> Self {
        let h = Self::signed_in();
        h.ctx.load().await;
        h.ctx
            .profile
            .save_profile(profile_input("Biscuit"))
            .await
            .expect("profile save");
        h
    }

    /// Remote store and probe both unreachable. Nothing has noticed yet.
    pub fn cut_network(&self) {
        self.probe.set(false);
        self.remote.fail(Failure::Offline);
    }

    /// Remote store and probe both reachable. Nothing has noticed yet.
    pub fn restore_network(&self) {
        self.probe.set(true);
        self.remote.fail(Failure::None);
    }

    /// Unreachable, and already known to be.
    pub fn go_offline(&self) {
        self.cut_network();
        self.ctx.env.network.set(Reachability::Offline);
    }

    pub fn dog_id(&self) -> String {
        self.ctx.env.active_dog.id().expect("active dog")
    }
}

pub fn identity() -> Identity {
    Identity {
        user_id: USER_ID.to_string(),
        access_token: "test-access-token".to_string(),
    }
}

#[allow(dead_code)]
pub fn profile_input(name: &str) -> ProfileInput {
    ProfileInput {
        name: name.to_string(),
        age: Some(3.0),
        sex: None,
        weight: 22.5,
        weight_unit: Default::default(),
        photo: None,
        breeds: vec![breed("Border Collie", 60.0), breed("Labrador Retriever", 40.0)],
    }
}

#[allow(dead_code)]
pub fn breed(name: &str, percentage: f64) -> BreedComponent {
    BreedComponent {
        breed_name: name.to_string(),
        percentage,
        is_unknown: false,
        traits: None,
        strengths: None,
        risks: None,
    }
}

#[allow(dead_code)]
pub fn walk(minutes: u32, effort: Effort) -> NewActivity {
    NewActivity {
        activity_type: ActivityType::Walk,
        duration: minutes,
        effort,
        notes: Some("park loop".to_string()),
        photo: None,
        weight: None,
        activity_date: Utc::now() - Duration::hours(1),
        contributes_to_goal: true,
    }
}

#[allow(dead_code)]
pub fn conditioning_goal(name: &str, weekly_target: f64) -> NewGoal {
    NewGoal {
        goal_type: GoalType::Conditioning,
        direction: None,
        name: name.to_string(),
        target_value: weekly_target,
        start_value: 0.0,
        unit: "points".to_string(),
        weekly_target: Some(weekly_target),
    }
}

#[allow(dead_code)]
pub fn is_remote_id(id: &str) -> bool {
    !pawtrack::models::is_provisional_id(id)
}
