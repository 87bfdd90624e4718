// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use chrono::{Duration, Utc};
use pawtrack::db::{keys, Table};
use pawtrack::error::AppError;
use pawtrack::models::{Effort, Goal, GoalDirection, GoalPatch, GoalType, NewGoal};
use pawtrack::services::HydrationState;

mod common;
use common::{conditioning_goal, profile_input, walk, Harness};

fn weight_goal(target: f64) -> NewGoal {
    NewGoal {
        goal_type: GoalType::Weight,
        direction: Some(GoalDirection::Lose),
        name: "Trim down".to_string(),
        target_value: target,
        start_value: 22.5,
        unit: "kg".to_string(),
        weekly_target: None,
    }
}

fn active_rows(h: &Harness) -> usize {
    h.remote
        .rows(Table::Goals)
        .iter()
        .filter(|row| row["is_active"] == true)
        .count()
}

#[tokio::test]
async fn test_adding_goal_deactivates_others() {
    let h = Harness::signed_in_with_dog().await;
    let first = h.ctx.goals.add_goal(conditioning_goal("Base", 100.0)).await.unwrap();
    let second = h.ctx.goals.add_goal(weight_goal(20.0)).await.unwrap();

    let goals = h.ctx.goals.goals().await;
    assert_eq!(goals.len(), 2);
    assert_eq!(goals.iter().filter(|g| g.is_active).count(), 1);
    assert_eq!(h.ctx.goals.active_goal().await.unwrap().id, second.id);
    assert!(!h.ctx.goals.goals().await.iter().any(|g| g.id == first.id && g.is_active));

    assert_eq!(h.remote.rows(Table::Goals).len(), 2);
    assert_eq!(active_rows(&h), 1);
}

#[tokio::test]
async fn test_switching_goals_online_stays_synced() {
    let h = Harness::signed_in_with_dog().await;
    h.ctx.goals.add_goal(conditioning_goal("Base", 100.0)).await.unwrap();
    h.ctx.goals.add_goal(weight_goal(20.0)).await.unwrap();
    assert!(!h.ctx.goals.has_unsynced().await);
    assert_eq!(h.remote.calls_for("deactivate_others", Table::Goals), 2);

    h.ctx.goals.hydrate().await;

    assert_eq!(h.ctx.goals.phase().await, HydrationState::HydratedRemote);
    assert!(!h.ctx.goals.has_unsynced().await);
    assert!(!h.ctx.orchestrator.has_unsynced_changes().await);
    assert_eq!(active_rows(&h), 1);
}

#[tokio::test]
async fn test_single_active_goal_survives_offline_switch() {
    let h = Harness::signed_in_with_dog().await;
    h.ctx.goals.add_goal(conditioning_goal("Base", 100.0)).await.unwrap();

    h.go_offline();
    let offline = h.ctx.goals.add_goal(weight_goal(20.0)).await.unwrap();
    assert_eq!(
        h.ctx.goals.goals().await.iter().filter(|g| g.is_active).count(),
        1
    );

    h.restore_network();
    let report = h.ctx.goals.backup().await;

    assert!(report.is_complete());
    assert_eq!(active_rows(&h), 1);
    let active_id = h.ctx.goals.active_goal().await.unwrap().id;
    assert_ne!(active_id, offline.id);
    assert!(h
        .remote
        .rows(Table::Goals)
        .iter()
        .any(|row| row["id"] == active_id.as_str() && row["is_active"] == true));
}

#[tokio::test]
async fn test_set_active_goal() {
    let h = Harness::signed_in_with_dog().await;
    let first = h.ctx.goals.add_goal(conditioning_goal("Base", 100.0)).await.unwrap();
    h.ctx.goals.add_goal(weight_goal(20.0)).await.unwrap();

    h.ctx.goals.set_active_goal(&first.id).await.unwrap();

    assert_eq!(h.ctx.goals.active_goal().await.unwrap().id, first.id);
    assert_eq!(active_rows(&h), 1);
}

#[tokio::test]
async fn test_deleting_active_goal_leaves_none_active() {
    let h = Harness::guest();
    h.ctx.load().await;
    h.ctx.profile.save_profile(profile_input("Biscuit")).await.unwrap();
    h.ctx.goals.add_goal(conditioning_goal("Base", 100.0)).await.unwrap();
    let active = h.ctx.goals.add_goal(weight_goal(20.0)).await.unwrap();

    h.ctx.goals.delete_goal(&active.id).await.unwrap();

    assert_eq!(h.ctx.goals.goals().await.len(), 1);
    assert!(h.ctx.goals.active_goal().await.is_none());
}

#[tokio::test]
async fn test_training_points_accumulate_on_conditioning_goal() {
    let h = Harness::guest();
    h.ctx.load().await;
    h.ctx.profile.save_profile(profile_input("Biscuit")).await.unwrap();
    h.ctx.goals.add_goal(conditioning_goal("Base", 100.0)).await.unwrap();

    h.ctx.log_activity(walk(30, Effort::Moderate)).await.unwrap();
    h.ctx.log_activity(walk(20, Effort::High)).await.unwrap();
    let mut casual = walk(60, Effort::High);
    casual.contributes_to_goal = false;
    h.ctx.log_activity(casual).await.unwrap();

    let goal = h.ctx.goals.active_goal().await.unwrap();
    assert_eq!(goal.current_value, 85.0);
    assert!((goal.progress() - 0.85).abs() < 1e-9);
}

#[tokio::test]
async fn test_weight_goal_tracks_latest_observation() {
    let h = Harness::guest();
    h.ctx.load().await;
    h.ctx.profile.save_profile(profile_input("Biscuit")).await.unwrap();
    h.ctx.goals.add_goal(weight_goal(20.0)).await.unwrap();

    let mut weigh_in = walk(15, Effort::Low);
    weigh_in.weight = Some(21.5);
    h.ctx.log_activity(weigh_in).await.unwrap();

    let goal = h.ctx.goals.active_goal().await.unwrap();
    assert_eq!(goal.current_value, 21.5);
    assert_eq!(h.ctx.profile.profile().await.unwrap().weight, 21.5);
}

#[tokio::test]
async fn test_weekly_reset_on_load() {
    let h = Harness::guest();
    h.ctx.load().await;
    h.ctx.profile.save_profile(profile_input("Biscuit")).await.unwrap();
    h.ctx.goals.add_goal(conditioning_goal("Base", 100.0)).await.unwrap();
    h.ctx.log_activity(walk(30, Effort::Moderate)).await.unwrap();

    let mut stored: Vec<Goal> = h.local.read_collection(keys::GOALS).await;
    stored[0].week_start_date = Some(Utc::now() - Duration::days(8));
    h.local.write_collection(keys::GOALS, &stored).await.unwrap();

    h.ctx.goals.hydrate().await;

    let goal = h.ctx.goals.active_goal().await.unwrap();
    assert_eq!(goal.current_value, 0.0);
    let started = goal.week_start_date.unwrap();
    assert!(Utc::now() - started < Duration::minutes(1));
    let persisted: Vec<Goal> = h.local.read_collection(keys::GOALS).await;
    assert_eq!(persisted[0].current_value, 0.0);
}

#[tokio::test]
async fn test_week_in_progress_is_not_reset() {
    let h = Harness::guest();
    h.ctx.load().await;
    h.ctx.profile.save_profile(profile_input("Biscuit")).await.unwrap();
    h.ctx.goals.add_goal(conditioning_goal("Base", 100.0)).await.unwrap();
    h.ctx.log_activity(walk(30, Effort::Moderate)).await.unwrap();

    let mut stored: Vec<Goal> = h.local.read_collection(keys::GOALS).await;
    stored[0].week_start_date = Some(Utc::now() - Duration::days(6));
    h.local.write_collection(keys::GOALS, &stored).await.unwrap();

    h.ctx.goals.hydrate().await;

    assert_eq!(h.ctx.goals.active_goal().await.unwrap().current_value, 45.0);
}

#[tokio::test]
async fn test_points_after_expired_week_start_fresh() {
    let h = Harness::guest();
    h.ctx.load().await;
    h.ctx.profile.save_profile(profile_input("Biscuit")).await.unwrap();
    let goal = h.ctx.goals.add_goal(conditioning_goal("Base", 100.0)).await.unwrap();
    h.ctx
        .goals
        .update_goal(
            &goal.id,
            GoalPatch {
                current_value: Some(90.0),
                week_start_date: Some(Utc::now() - Duration::days(9)),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    h.ctx.log_activity(walk(10, Effort::Low)).await.unwrap();

    assert_eq!(h.ctx.goals.active_goal().await.unwrap().current_value, 10.0);
}

#[tokio::test]
async fn test_multiple_active_goals_normalized_on_load() {
    let h = Harness::guest();
    h.ctx.load().await;
    h.ctx.profile.save_profile(profile_input("Biscuit")).await.unwrap();
    h.ctx.goals.add_goal(conditioning_goal("Old", 100.0)).await.unwrap();
    let newer = h.ctx.goals.add_goal(weight_goal(20.0)).await.unwrap();

    let mut stored: Vec<Goal> = h.local.read_collection(keys::GOALS).await;
    for goal in stored.iter_mut() {
        goal.is_active = true;
    }
    h.local.write_collection(keys::GOALS, &stored).await.unwrap();

    h.ctx.goals.hydrate().await;

    let active: Vec<Goal> = h
        .ctx
        .goals
        .goals()
        .await
        .into_iter()
        .filter(|g| g.is_active)
        .collect();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, newer.id);
}

#[tokio::test]
async fn test_invalid_weekly_target_is_rejected() {
    let h = Harness::guest();
    h.ctx.load().await;
    h.ctx.profile.save_profile(profile_input("Biscuit")).await.unwrap();
    let goal = h.ctx.goals.add_goal(conditioning_goal("Base", 100.0)).await.unwrap();

    let err = h
        .ctx
        .goals
        .update_goal(
            &goal.id,
            GoalPatch {
                weekly_target: Some(0.0),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, AppError::Validation(_)));
    assert_eq!(
        h.ctx.goals.active_goal().await.unwrap().weekly_target,
        Some(100.0)
    );
}
