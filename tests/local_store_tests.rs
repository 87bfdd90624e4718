// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use pawtrack::config::Config;
use pawtrack::db::{keys, FileBackend, LocalStore, StorageBackend};
use pawtrack::models::{Activity, DogProfile, Effort};
use pawtrack::services::{HydrationState, IdentityProvider, NoopBreedAnalysis};
use pawtrack::SyncContext;
use std::sync::Arc;

mod common;
use common::{conditioning_goal, profile_input, walk, Harness};

#[tokio::test]
async fn test_file_store_round_trips_documents() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::open(dir.path());

    store.write_collection("@numbers", &[1, 2, 3]).await.unwrap();

    let reopened = LocalStore::open(dir.path());
    let numbers: Vec<u32> = reopened.read_collection("@numbers").await;
    assert_eq!(numbers, vec![1, 2, 3]);
}

#[tokio::test]
async fn test_file_store_leaves_no_temp_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::open(dir.path());

    store.write_record(keys::PROFILE, &"first").await.unwrap();
    store.write_record(keys::PROFILE, &"second").await.unwrap();

    let names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, vec!["_dog_profile.json".to_string()]);
}

#[tokio::test]
async fn test_file_store_remove_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let backend = Arc::new(FileBackend::new(dir.path()));

    backend.write("@goals", "[]".to_string()).await.unwrap();
    backend.remove("@goals").await.unwrap();
    backend.remove("@goals").await.unwrap();

    assert_eq!(backend.read("@goals").await.unwrap(), None);
}

#[tokio::test]
async fn test_corrupt_file_reads_as_empty() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("_activities.json"), "{ truncated").unwrap();

    let store = LocalStore::open(dir.path());
    let activities: Vec<Activity> = store.read_collection(keys::ACTIVITIES).await;

    assert!(activities.is_empty());
}

#[tokio::test]
async fn test_guest_data_survives_restart() {
    let dir = tempfile::tempdir().unwrap();

    let logged = {
        let h = Harness::with_local(IdentityProvider::guest(), LocalStore::open(dir.path()));
        h.ctx.load().await;
        h.ctx.profile.save_profile(profile_input("Biscuit")).await.unwrap();
        h.ctx.goals.add_goal(conditioning_goal("Base", 100.0)).await.unwrap();
        h.ctx.log_activity(walk(30, Effort::Moderate)).await.unwrap()
    };

    let h = Harness::with_local(IdentityProvider::guest(), LocalStore::open(dir.path()));
    h.ctx.load().await;

    assert_eq!(h.ctx.profile.phase().await, HydrationState::HydratedLocal);
    assert_eq!(h.ctx.profile.profile().await.unwrap().name, "Biscuit");
    assert_eq!(h.ctx.activities.activities().await, vec![logged]);
    assert_eq!(h.ctx.goals.active_goal().await.unwrap().current_value, 45.0);
}

#[tokio::test]
async fn test_context_from_config_uses_data_dir() {
    let dir = tempfile::tempdir().unwrap();
    let config = Config {
        data_dir: dir.path().to_path_buf(),
        ..Config::test_default()
    };

    let ctx = SyncContext::from_config(
        &config,
        Arc::new(IdentityProvider::guest()),
        Arc::new(NoopBreedAnalysis),
    )
    .unwrap();
    ctx.load().await;
    ctx.profile.save_profile(profile_input("Biscuit")).await.unwrap();

    let store = LocalStore::open(dir.path());
    let stored: Option<DogProfile> = store.read_record(keys::PROFILE).await;
    assert_eq!(stored.unwrap().name, "Biscuit");
}
