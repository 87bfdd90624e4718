// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use pawtrack::db::{keys, Table};
use pawtrack::error::AppError;
use pawtrack::services::{HydrationState, SyncNowOutcome};

mod common;
use common::{breed, is_remote_id, profile_input, Harness};

#[tokio::test]
async fn test_guest_breed_edit_regenerates_analysis() {
    let h = Harness::guest();
    h.ctx.load().await;

    h.ctx.profile.save_profile(profile_input("Biscuit")).await.unwrap();
    assert_eq!(h.analysis.runs(), 1);

    // Same mix in a different order is not a breed change.
    let mut reordered = profile_input("Biscuit");
    reordered.breeds.reverse();
    h.ctx.profile.save_profile(reordered).await.unwrap();
    assert_eq!(h.analysis.runs(), 1);

    let mut changed = profile_input("Biscuit");
    changed.breeds = vec![breed("Beagle", 100.0)];
    h.ctx.profile.save_profile(changed).await.unwrap();
    assert_eq!(h.analysis.runs(), 2);
    assert!(!h.ctx.profile.has_pending_breed_analysis().await);
}

#[tokio::test]
async fn test_offline_breed_edit_is_analyzed_after_sync() {
    let h = Harness::signed_in_with_dog().await;
    assert_eq!(h.analysis.runs(), 1);

    h.go_offline();
    let mut changed = profile_input("Biscuit");
    changed.breeds = vec![breed("Beagle", 100.0)];
    h.ctx.profile.save_profile(changed).await.unwrap();

    assert_eq!(h.analysis.runs(), 1);
    assert!(h.ctx.profile.has_pending_breed_analysis().await);
    assert!(h.ctx.profile.has_unsynced().await);
    let pending: Option<bool> = h.local.read_record(keys::PENDING_BREED_ANALYSIS).await;
    assert_eq!(pending, Some(true));

    h.restore_network();
    let outcome = h.ctx.orchestrator.sync_now().await;
    assert!(matches!(outcome, SyncNowOutcome::Completed(ref r) if r.is_complete()));

    assert_eq!(h.analysis.runs(), 2);
    assert!(!h.ctx.profile.has_pending_breed_analysis().await);
    assert!(!h.ctx.profile.has_unsynced().await);
    let pending: Option<bool> = h.local.read_record(keys::PENDING_BREED_ANALYSIS).await;
    assert_eq!(pending, Some(false));
    let breeds = h.remote.rows(Table::BreedComponents);
    assert_eq!(breeds.len(), 1);
    assert_eq!(breeds[0]["breed_name"], "Beagle");
}

#[tokio::test]
async fn test_breed_change_invalidates_cached_analysis() {
    let h = Harness::guest();
    h.ctx.load().await;
    let original = profile_input("Biscuit");
    let old_breeds = original.breeds.clone();
    h.ctx.profile.save_profile(original).await.unwrap();
    h.ctx
        .breed_cache
        .populate(&old_breeds, "Herding drive with a retriever's appetite")
        .await;
    assert!(h.ctx.breed_cache.get(&old_breeds).is_some());

    let mut changed = profile_input("Biscuit");
    changed.breeds = vec![breed("Beagle", 100.0)];
    h.ctx.profile.save_profile(changed).await.unwrap();

    assert!(h.ctx.breed_cache.get(&old_breeds).is_none());
}

#[tokio::test]
async fn test_record_weight_validation() {
    let h = Harness::guest();
    h.ctx.load().await;

    let err = h.ctx.profile.record_weight(20.0).await.unwrap_err();
    assert!(matches!(err, AppError::NotFound(_)));

    h.ctx.profile.save_profile(profile_input("Biscuit")).await.unwrap();
    let err = h.ctx.profile.record_weight(151.0).await.unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(h.ctx.profile.profile().await.unwrap().weight, 22.5);
}

#[tokio::test]
async fn test_invalid_profile_is_rejected() {
    let h = Harness::guest();
    h.ctx.load().await;

    let mut input = profile_input("");
    input.weight = 22.0;
    let err = h.ctx.profile.save_profile(input).await.unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert!(h.ctx.profile.profile().await.is_none());
    assert_eq!(h.ctx.env.active_dog.id(), None);
}

#[tokio::test]
async fn test_offline_profile_edit_survives_hydration() {
    let h = Harness::signed_in_with_dog().await;
    let dog_id = h.dog_id();

    h.go_offline();
    h.ctx.profile.save_profile(profile_input("Biscuit II")).await.unwrap();
    h.restore_network();

    h.ctx.profile.hydrate().await;

    assert_eq!(h.ctx.profile.phase().await, HydrationState::HydratedRemote);
    let profile = h.ctx.profile.profile().await.unwrap();
    assert_eq!(profile.name, "Biscuit II");
    assert_eq!(profile.id, dog_id);
    assert!(h.ctx.profile.has_unsynced().await);

    h.ctx.orchestrator.sync_now().await;
    assert_eq!(h.remote.rows(Table::Dogs)[0]["name"], "Biscuit II");
    assert!(!h.ctx.orchestrator.has_unsynced_changes().await);
}

#[tokio::test]
async fn test_profile_backup_is_idempotent() {
    let h = Harness::signed_in_with_dog().await;

    let first = h.ctx.profile.backup().await;
    let second = h.ctx.profile.backup().await;

    assert_eq!(first.upserted, 1);
    assert_eq!(second.upserted, 1);
    assert_eq!(h.remote.rows(Table::Dogs).len(), 1);
    assert_eq!(h.remote.rows(Table::BreedComponents).len(), 2);
    assert!(is_remote_id(&h.dog_id()));
}
