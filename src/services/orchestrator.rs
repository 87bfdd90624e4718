// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Global sync orchestrator.
//!
//! Composes the domain managers and decides when to run a "sync everything"
//! pass:
//! - an unreachable → reachable transition (poll, foreground, OS online)
//! - the first guest → authenticated transition of a login session
//! - a manual [`Orchestrator::sync_now`]
//!
//! All reachability inputs arrive as [`SyncTrigger`] values on one channel.
//! Only one pass runs at a time; triggers that arrive during a pass are
//! dropped.

use crate::services::activities::ActivitiesManager;
use crate::services::collection::BackupReport;
use crate::services::env::SyncEnv;
use crate::services::goals::GoalsManager;
use crate::services::notices::Notice;
use crate::services::profile::ProfileManager;
use crate::services::reachability::Reachability;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

/// Reachability-related events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncTrigger {
    /// Fixed-interval poll. Ignored while backgrounded.
    PollTick,
    /// App returned to the foreground.
    Foreground,
    /// App went to the background.
    Background,
    /// OS reports connectivity.
    OsOnline,
    /// OS reports loss of connectivity.
    OsOffline,
}

/// Result of one "sync everything" pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub profile: BackupReport,
    pub activities: BackupReport,
    pub goals: BackupReport,
    pub timed_out: bool,
}

impl SyncReport {
    pub fn is_complete(&self) -> bool {
        !self.timed_out
            && self.profile.is_complete()
            && self.activities.is_complete()
            && self.goals.is_complete()
    }
}

/// Result of a manual sync request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNowOutcome {
    Offline,
    AlreadyRunning,
    Completed(SyncReport),
}

/// Clears the in-progress flag when a pass ends, however it ends.
struct PassGuard<'a>(&'a AtomicBool);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct Orchestrator {
    env: Arc<SyncEnv>,
    profile: Arc<ProfileManager>,
    activities: Arc<ActivitiesManager>,
    goals: Arc<GoalsManager>,
    pass_timeout: Duration,
    in_progress: AtomicBool,
    /// Guest data has been migrated for the current login session.
    migrated: AtomicBool,
    foreground: AtomicBool,
    last_seen: Mutex<Reachability>,
}

impl Orchestrator {
    pub fn new(
        env: Arc<SyncEnv>,
        profile: Arc<ProfileManager>,
        activities: Arc<ActivitiesManager>,
        goals: Arc<GoalsManager>,
        pass_timeout: Duration,
    ) -> Self {
        Self {
            env,
            profile,
            activities,
            goals,
            pass_timeout,
            in_progress: AtomicBool::new(false),
            migrated: AtomicBool::new(false),
            foreground: AtomicBool::new(true),
            last_seen: Mutex::new(Reachability::Unknown),
        }
    }

    /// Aggregate unsynced flag across every domain.
    pub async fn has_unsynced_changes(&self) -> bool {
        self.profile.has_unsynced().await
            || self.activities.has_unsynced().await
            || self.goals.has_unsynced().await
    }

    pub fn is_syncing(&self) -> bool {
        self.in_progress.load(Ordering::Acquire)
    }

    pub fn is_foreground(&self) -> bool {
        self.foreground.load(Ordering::Acquire)
    }

    /// Hydrate the profile first so the others see the active dog.
    pub async fn hydrate_all(&self) {
        self.profile.hydrate().await;
        tokio::join!(self.activities.hydrate(), self.goals.hydrate());
    }

    // ─── Passes ──────────────────────────────────────────────────────

    /// Run one pass unless one is already running.
    pub async fn sync_everything(&self) -> Option<SyncReport> {
        if self
            .in_progress
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Sync pass already running, trigger dropped");
            return None;
        }
        let _guard = PassGuard(&self.in_progress);

        let report = match tokio::time::timeout(self.pass_timeout, self.run_pass()).await {
            Ok(report) => report,
            Err(_) => {
                tracing::error!(timeout_secs = self.pass_timeout.as_secs(), "Sync pass timed out");
                SyncReport {
                    timed_out: true,
                    ..Default::default()
                }
            }
        };
        Some(report)
    }

    /// Profile, then activities, then goals. Failures never stop the pass.
    async fn run_pass(&self) -> SyncReport {
        tracing::info!("Sync pass started");
        let mut report = SyncReport::default();
        if self.profile.has_unsynced().await {
            report.profile = self.profile.backup().await;
        }
        if self.activities.has_unsynced().await {
            report.activities = self.activities.backup().await;
        }
        if self.goals.has_unsynced().await {
            report.goals = self.goals.backup().await;
        }
        tracing::info!(
            complete = report.is_complete(),
            profile_failed = report.profile.failed,
            activities_failed = report.activities.failed,
            goals_failed = report.goals.failed,
            "Sync pass finished"
        );
        report
    }

    /// Manual "sync everything now".
    pub async fn sync_now(&self) -> SyncNowOutcome {
        if self.check_reachability().await != Reachability::Online {
            self.env.notifier.notify(Notice::YouAreOffline);
            return SyncNowOutcome::Offline;
        }
        match self.sync_everything().await {
            Some(report) => SyncNowOutcome::Completed(report),
            None => SyncNowOutcome::AlreadyRunning,
        }
    }

    // ─── Triggers ────────────────────────────────────────────────────

    /// React to one reachability event.
    pub async fn handle(&self, trigger: SyncTrigger) {
        tracing::debug!(?trigger, "Sync trigger");
        match trigger {
            SyncTrigger::Background => {
                self.foreground.store(false, Ordering::Release);
            }
            SyncTrigger::OsOffline => {
                self.env.network.set(Reachability::Offline);
                *self.last_seen.lock().await = Reachability::Offline;
            }
            SyncTrigger::PollTick if !self.is_foreground() => {}
            SyncTrigger::Foreground | SyncTrigger::PollTick | SyncTrigger::OsOnline => {
                if trigger == SyncTrigger::Foreground {
                    self.foreground.store(true, Ordering::Release);
                }
                let before = *self.last_seen.lock().await;
                let was_down = before != Reachability::Online || self.env.network.is_offline();
                let now = self.check_reachability().await;
                if now == Reachability::Online && was_down && self.has_unsynced_changes().await {
                    tracing::info!("Remote store reachable again, syncing");
                    self.sync_everything().await;
                }
            }
        }
    }

    async fn check_reachability(&self) -> Reachability {
        let (_, now) = self.env.network.refresh(self.env.probe.as_ref()).await;
        *self.last_seen.lock().await = now;
        now
    }

    /// React to a login or logout.
    pub async fn on_identity_change(&self, was_authenticated: bool, authenticated: bool) {
        self.hydrate_all().await;

        if !authenticated {
            self.migrated.store(false, Ordering::Release);
            return;
        }
        let first_login = !was_authenticated && !self.migrated.swap(true, Ordering::AcqRel);
        if first_login && self.has_unsynced_changes().await {
            tracing::info!("Signed in with local data, migrating");
            self.sync_everything().await;
        }
    }

    // ─── Tasks ───────────────────────────────────────────────────────

    /// Handle triggers until the channel closes. Each trigger is handled on
    /// its own task so a long pass never delays the next check.
    pub fn spawn_trigger_loop(
        self: &Arc<Self>,
        mut triggers: mpsc::Receiver<SyncTrigger>,
    ) -> JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move {
            while let Some(trigger) = triggers.recv().await {
                let this = this.clone();
                tokio::spawn(async move { this.handle(trigger).await });
            }
            tracing::debug!("Sync trigger channel closed");
        })
    }

    /// Emit a poll tick every `interval`.
    pub fn spawn_poller(triggers: mpsc::Sender<SyncTrigger>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if triggers.send(SyncTrigger::PollTick).await.is_err() {
                    break;
                }
            }
        })
    }

    /// Re-hydrate on every login and logout, then migrate guest data once.
    pub fn spawn_identity_watcher(self: &Arc<Self>) -> JoinHandle<()> {
        let this = self.clone();
        let mut identity = self.env.identity.subscribe();
        tokio::spawn(async move {
            let mut last = identity.borrow_and_update().clone();
            while identity.changed().await.is_ok() {
                let current = identity.borrow_and_update().clone();
                if current.refresh_trigger != last.refresh_trigger {
                    this.on_identity_change(last.identity.is_some(), current.identity.is_some())
                        .await;
                }
                last = current;
            }
        })
    }
}
