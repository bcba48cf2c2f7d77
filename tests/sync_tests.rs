// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Conquest sync tests against the in-memory store and a fake Strava.
//!
//! These tests verify that:
//! 1. Sync never calls Strava without a usable credential
//! 2. Repeated syncs are idempotent
//! 3. Manual conquests always win over synced ones
//! 4. Failures leave stored conquests untouched

use chrono::NaiveDate;
use conquest_tracker::db::{ConquestStore, CyclistStore};
use conquest_tracker::error::AppError;
use conquest_tracker::models::{ConquestRecord, CredentialUpdate, LatLng, MountainPass};
use conquest_tracker::services::PassCatalog;
use std::sync::atomic::Ordering;

mod common;
use common::{activity_json, connect_cyclist, create_test_app};

const NEAR_STELVIO: (f64, f64) = (46.5290, 10.4530);
const NEAR_GALIBIER: (f64, f64) = (45.0650, 6.4080);
const NOWHERE: (f64, f64) = (51.5007, -0.1246);

fn manual_record(cyclist_id: &str, pass_id: &str) -> ConquestRecord {
    ConquestRecord {
        cyclist_id: cyclist_id.to_string(),
        pass_id: pass_id.to_string(),
        date_completed: NaiveDate::from_ymd_opt(2019, 8, 3).unwrap(),
        time_completed: Some("01:52:00".to_string()),
        external_activity_id: None,
        synced_from_external: false,
        personal_notes: Some("First time up, in the rain".to_string()),
        photos: vec!["https://example.com/stelvio.jpg".to_string()],
        created_at: "2019-08-03T18:00:00Z".to_string(),
    }
}

#[tokio::test]
async fn test_no_credential_is_token_unavailable_without_network() {
    let app = create_test_app().await;
    app.strava
        .set_activities(vec![activity_json(1, "Ride", Some(NEAR_STELVIO))]);

    let result = app
        .state
        .reconciler
        .sync("c-none", &app.state.pass_catalog)
        .await;

    assert!(matches!(result, Err(AppError::TokenUnavailable(_))));
    assert_eq!(app.strava.activity_calls(), 0);
    assert_eq!(app.strava.refresh_calls(), 0);
}

#[tokio::test]
async fn test_disconnected_cyclist_is_token_unavailable() {
    let app = create_test_app().await;
    connect_cyclist(&app.db, "c1", 6 * 3600).await;
    let cyclist = app.db.get_cyclist("c1").await.unwrap().unwrap();
    app.db
        .set_credential("c1", &cyclist.strava.apply(CredentialUpdate::Disconnect))
        .await
        .unwrap();

    let result = app
        .state
        .reconciler
        .sync("c1", &app.state.pass_catalog)
        .await;

    assert!(matches!(result, Err(AppError::TokenUnavailable(_))));
    assert_eq!(app.strava.activity_calls(), 0);
}

#[tokio::test]
async fn test_sync_creates_conquests_and_is_idempotent() {
    let app = create_test_app().await;
    connect_cyclist(&app.db, "c1", 6 * 3600).await;
    app.strava.set_activities(vec![
        activity_json(101, "Ride", Some(NEAR_STELVIO)),
        activity_json(102, "Ride", Some(NOWHERE)),
        activity_json(103, "VirtualRide", Some(NEAR_GALIBIER)),
    ]);

    let first = app
        .state
        .reconciler
        .sync("c1", &app.state.pass_catalog)
        .await
        .unwrap();

    assert_eq!(first.synced_count, 2);
    assert_eq!(first.new_conquests.len(), 2);
    assert_eq!(first.activities_scanned, 3);
    assert_eq!(app.strava.last_bearer().as_deref(), Some("stored-access"));

    let stored = app.db.get_conquests("c1").await.unwrap();
    let pass_ids: Vec<&str> = stored.iter().map(|c| c.pass_id.as_str()).collect();
    assert_eq!(pass_ids, vec!["galibier", "stelvio"]);

    let stelvio = stored.iter().find(|c| c.pass_id == "stelvio").unwrap();
    assert!(stelvio.synced_from_external);
    assert_eq!(stelvio.external_activity_id, Some(101));
    assert_eq!(
        stelvio.date_completed,
        NaiveDate::from_ymd_opt(2025, 7, 14).unwrap()
    );
    assert_eq!(
        stelvio.personal_notes.as_deref(),
        Some("Synced from Strava activity \"Activity 101\" (#101)")
    );

    let second = app
        .state
        .reconciler
        .sync("c1", &app.state.pass_catalog)
        .await
        .unwrap();
    assert_eq!(second.synced_count, 0);
    assert_eq!(second.skipped_already_synced, 2);
    assert_eq!(app.db.get_conquests("c1").await.unwrap(), stored);
}

#[tokio::test]
async fn test_two_rides_on_same_pass_converge() {
    let app = create_test_app().await;
    connect_cyclist(&app.db, "c1", 6 * 3600).await;
    app.strava.set_activities(vec![
        activity_json(201, "Ride", Some(NEAR_STELVIO)),
        activity_json(202, "Ride", Some(NEAR_STELVIO)),
    ]);

    let first = app
        .state
        .reconciler
        .sync("c1", &app.state.pass_catalog)
        .await
        .unwrap();
    assert_eq!(first.synced_count, 1);
    assert_eq!(first.new_conquests[0].external_activity_id, Some(201));

    // The second ride must not steal the conquest on a later run
    let second = app
        .state
        .reconciler
        .sync("c1", &app.state.pass_catalog)
        .await
        .unwrap();
    assert_eq!(second.synced_count, 0);

    let stored = app.db.get_conquests("c1").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].external_activity_id, Some(201));
}

#[tokio::test]
async fn test_manual_conquest_is_never_overwritten() {
    let app = create_test_app().await;
    connect_cyclist(&app.db, "c1", 6 * 3600).await;
    let manual = manual_record("c1", "stelvio");
    app.db.upsert_conquests(&[manual.clone()]).await.unwrap();

    app.strava
        .set_activities(vec![activity_json(301, "Ride", Some(NEAR_STELVIO))]);

    let result = app
        .state
        .reconciler
        .sync("c1", &app.state.pass_catalog)
        .await
        .unwrap();

    assert_eq!(result.synced_count, 0);
    assert_eq!(result.skipped_already_conquered, 1);
    assert_eq!(app.db.get_conquests("c1").await.unwrap(), vec![manual]);
}

#[tokio::test]
async fn test_ineligible_activity_types_are_ignored() {
    let app = create_test_app().await;
    connect_cyclist(&app.db, "c1", 6 * 3600).await;
    app.strava.set_activities(vec![
        activity_json(401, "Run", Some(NEAR_STELVIO)),
        activity_json(402, "Hike", Some(NEAR_GALIBIER)),
    ]);

    let result = app
        .state
        .reconciler
        .sync("c1", &app.state.pass_catalog)
        .await
        .unwrap();

    assert_eq!(result.synced_count, 0);
    assert_eq!(result.skipped_ineligible, 2);
    assert!(app.db.get_conquests("c1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_first_match_wins_in_catalog_order() {
    let app = create_test_app().await;
    connect_cyclist(&app.db, "c1", 6 * 3600).await;

    let pass = |id: &str, lat: f64, lng: f64| MountainPass {
        id: id.to_string(),
        name: id.to_string(),
        coordinates: LatLng::new(lat, lng),
        country: None,
        region: None,
        altitude_m: None,
    };
    // Both within 5 km of the ride; catalog order decides
    let catalog = PassCatalog::from_passes(vec![
        pass("umbrail", 46.5440, 10.4340),
        pass("stelvio", 46.5286, 10.4533),
    ]);
    app.strava
        .set_activities(vec![activity_json(501, "Ride", Some(NEAR_STELVIO))]);

    let result = app.state.reconciler.sync("c1", &catalog).await.unwrap();

    assert_eq!(result.synced_count, 1);
    assert_eq!(result.new_conquests[0].pass_id, "umbrail");
}

#[tokio::test]
async fn test_activities_without_gps_match_nothing() {
    let app = create_test_app().await;
    connect_cyclist(&app.db, "c1", 6 * 3600).await;
    app.strava
        .set_activities(vec![activity_json(601, "VirtualRide", None)]);

    let result = app
        .state
        .reconciler
        .sync("c1", &app.state.pass_catalog)
        .await
        .unwrap();

    assert_eq!(result.synced_count, 0);
    assert_eq!(result.activities_scanned, 1);
}

#[tokio::test]
async fn test_fetch_failure_aborts_without_writes() {
    let app = create_test_app().await;
    connect_cyclist(&app.db, "c1", 6 * 3600).await;
    app.strava
        .set_activities(vec![activity_json(701, "Ride", Some(NEAR_STELVIO))]);
    app.strava.activities_status.store(500, Ordering::SeqCst);

    let result = app
        .state
        .reconciler
        .sync("c1", &app.state.pass_catalog)
        .await;

    let err = result.unwrap_err();
    assert!(matches!(err, AppError::ActivityFetchFailed(_)));
    assert!(err.is_retryable());
    assert!(app.db.get_conquests("c1").await.unwrap().is_empty());

    // Retry after recovery succeeds
    app.strava.activities_status.store(200, Ordering::SeqCst);
    let retried = app
        .state
        .reconciler
        .sync("c1", &app.state.pass_catalog)
        .await
        .unwrap();
    assert_eq!(retried.synced_count, 1);
}

#[tokio::test]
async fn test_persistence_failure_is_reported() {
    let app = create_test_app().await;
    connect_cyclist(&app.db, "c1", 6 * 3600).await;
    app.strava
        .set_activities(vec![activity_json(801, "Ride", Some(NEAR_STELVIO))]);
    app.db.set_fail_conquest_writes(true);

    let result = app
        .state
        .reconciler
        .sync("c1", &app.state.pass_catalog)
        .await;

    assert!(matches!(result, Err(AppError::PersistenceFailed(_))));
    assert!(app.db.get_conquests("c1").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_fetch_window_is_one_year() {
    let app = create_test_app().await;
    connect_cyclist(&app.db, "c1", 6 * 3600).await;

    app.state
        .reconciler
        .sync("c1", &app.state.pass_catalog)
        .await
        .unwrap();

    let expected = chrono::Utc::now().timestamp() - 365 * 24 * 3600;
    let after = app.strava.last_after().unwrap();
    assert!((after - expected).abs() < 60, "after={} expected={}", after, expected);
}

#[tokio::test]
async fn test_expiring_token_is_refreshed_before_fetch() {
    let app = create_test_app().await;
    connect_cyclist(&app.db, "c1", 200).await;

    app.state
        .reconciler
        .sync("c1", &app.state.pass_catalog)
        .await
        .unwrap();

    assert_eq!(app.strava.refresh_calls(), 1);
    assert_eq!(app.strava.last_bearer().as_deref(), Some("refreshed-access-1"));
}

#[tokio::test]
async fn test_concurrent_syncs_converge_on_one_record() {
    let app = create_test_app().await;
    connect_cyclist(&app.db, "c1", 6 * 3600).await;
    app.strava
        .set_activities(vec![activity_json(901, "Ride", Some(NEAR_STELVIO))]);

    let reconciler = &app.state.reconciler;
    let catalog = &app.state.pass_catalog;
    let (a, b) = tokio::join!(reconciler.sync("c1", catalog), reconciler.sync("c1", catalog));
    let (a, b) = (a.unwrap(), b.unwrap());

    // Runs are not serialized: both may report the same conquest
    assert!(a.synced_count <= 1 && b.synced_count <= 1);
    assert!(a.synced_count + b.synced_count >= 1);

    let stored = app.db.get_conquests("c1").await.unwrap();
    assert_eq!(stored.len(), 1);
    assert_eq!(stored[0].pass_id, "stelvio");
    assert_eq!(stored[0].external_activity_id, Some(901));

    let after = reconciler.sync("c1", catalog).await.unwrap();
    assert_eq!(after.synced_count, 0);
    assert_eq!(app.db.get_conquests("c1").await.unwrap(), stored);
}
