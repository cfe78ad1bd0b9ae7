//! Persistence layer tests: image identity resolution, the one-prediction
//! invariant, and the listing queries.

mod helpers;

use chrono::{Duration, Utc};

use helpers::{sample_analysis, setup_db};
use smogwatch_server::db::{images, locations, predictions};
use smogwatch_server::models::{Classification, EmissionLabel};

fn classification(label: EmissionLabel, probability: f64, confidence: f64) -> Classification {
    Classification {
        label,
        probability,
        confidence,
    }
}

#[tokio::test]
async fn resolve_or_create_is_idempotent_per_locator() {
    let (pool, _dir) = setup_db().await;
    let now = Utc::now();

    let first = images::resolve_or_create(&pool, "/captures/a.jpg", "a.jpg", now, None)
        .await
        .unwrap();
    let second = images::resolve_or_create(&pool, "/captures/a.jpg", "a.jpg", now, None)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM images")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn resolve_or_create_falls_back_to_filename() {
    let (pool, _dir) = setup_db().await;
    let now = Utc::now();

    // Row created under an old locator scheme (public URL)
    let original = images::resolve_or_create(
        &pool,
        "http://old-host/captures/a.jpg",
        "a.jpg",
        now,
        None,
    )
    .await
    .unwrap();

    // Same capture rediscovered under a local path: must attach to the
    // existing row, not create a duplicate
    let resolved = images::resolve_or_create(&pool, "/captures/a.jpg", "a.jpg", now, None)
        .await
        .unwrap();

    assert_eq!(resolved.id, original.id);
    assert_eq!(resolved.locator, "http://old-host/captures/a.jpg");
}

#[tokio::test]
async fn resolve_or_create_stamps_location() {
    let (pool, _dir) = setup_db().await;
    let location_id = locations::create(&pool, Some("Checkpoint 4"), -13.7, -76.2)
        .await
        .unwrap();

    let image = images::resolve_or_create(
        &pool,
        "/captures/a.jpg",
        "a.jpg",
        Utc::now(),
        Some(location_id),
    )
    .await
    .unwrap();

    assert_eq!(image.location_id, Some(location_id));

    let reloaded = images::find_by_id(&pool, image.id).await.unwrap().unwrap();
    assert_eq!(reloaded.location_id, Some(location_id));
    assert_eq!(reloaded.plate, None);
}

#[tokio::test]
async fn set_plate_updates_only_the_plate() {
    let (pool, _dir) = setup_db().await;
    let image = images::resolve_or_create(&pool, "/captures/a.jpg", "a.jpg", Utc::now(), None)
        .await
        .unwrap();

    images::set_plate(&pool, image.id, "XYZ-987").await.unwrap();

    let reloaded = images::find_by_id(&pool, image.id).await.unwrap().unwrap();
    assert_eq!(reloaded.plate.as_deref(), Some("XYZ-987"));
    assert_eq!(reloaded.original_filename, "a.jpg");
    assert_eq!(reloaded.locator, "/captures/a.jpg");
}

#[tokio::test]
async fn one_prediction_per_image_is_enforced() {
    let (pool, _dir) = setup_db().await;
    let image = images::resolve_or_create(&pool, "/captures/a.jpg", "a.jpg", Utc::now(), None)
        .await
        .unwrap();

    assert!(!predictions::exists_for_image(&pool, image.id).await.unwrap());

    predictions::insert(
        &pool,
        image.id,
        &classification(EmissionLabel::Smog, 0.8, 0.9),
        "cnn-sidecar",
        Utc::now(),
    )
    .await
    .unwrap();
    assert!(predictions::exists_for_image(&pool, image.id).await.unwrap());

    // A second insert for the same image must hit the unique constraint
    let duplicate = predictions::insert(
        &pool,
        image.id,
        &classification(EmissionLabel::Clear, 0.1, 0.5),
        "cnn-sidecar",
        Utc::now(),
    )
    .await;
    assert!(duplicate.is_err());

    let stored = predictions::find_by_image(&pool, image.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.label, EmissionLabel::Smog);
    assert_eq!(stored.severity, 0.8);
    assert_eq!(stored.confidence, 0.9);
    assert_eq!(stored.observation.as_deref(), Some("cnn-sidecar"));
}

#[tokio::test]
async fn overwrite_keeps_the_same_row() {
    let (pool, _dir) = setup_db().await;
    let image = images::resolve_or_create(&pool, "/captures/a.jpg", "a.jpg", Utc::now(), None)
        .await
        .unwrap();
    let inserted = predictions::insert(
        &pool,
        image.id,
        &classification(EmissionLabel::Smog, 0.8, 0.9),
        "cnn-sidecar",
        Utc::now(),
    )
    .await
    .unwrap();

    predictions::overwrite_with_analysis(&pool, inserted.id, &sample_analysis(), Utc::now())
        .await
        .unwrap();

    let updated = predictions::find_by_image(&pool, image.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(updated.id, inserted.id);
    assert_eq!(updated.image_id, image.id);
    assert_eq!(updated.label, EmissionLabel::Clear);
    assert_eq!(updated.confidence, 0.95);
    assert_eq!(updated.severity, 0.10);
    assert_eq!(updated.observation.as_deref(), Some("light haze only"));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM predictions")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn emissions_listing_joins_newest_first() {
    let (pool, _dir) = setup_db().await;
    let now = Utc::now();

    let older = images::resolve_or_create(&pool, "/captures/a.jpg", "a.jpg", now, None)
        .await
        .unwrap();
    let newer = images::resolve_or_create(&pool, "/captures/b.jpg", "b.jpg", now, None)
        .await
        .unwrap();
    // No prediction: must not appear in the listing
    images::resolve_or_create(&pool, "/captures/c.jpg", "c.jpg", now, None)
        .await
        .unwrap();

    predictions::insert(
        &pool,
        older.id,
        &classification(EmissionLabel::Clear, 0.1, 0.7),
        "cnn-sidecar",
        now - Duration::hours(2),
    )
    .await
    .unwrap();
    predictions::insert(
        &pool,
        newer.id,
        &classification(EmissionLabel::Smog, 0.9, 0.95),
        "cnn-sidecar",
        now,
    )
    .await
    .unwrap();

    let rows = predictions::list_emissions(&pool).await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].original_filename, "b.jpg");
    assert_eq!(rows[0].label, EmissionLabel::Smog);
    assert_eq!(rows[1].original_filename, "a.jpg");
    assert_eq!(rows[1].label, EmissionLabel::Clear);
}

#[tokio::test]
async fn predicted_since_bounds_the_backlog() {
    let (pool, _dir) = setup_db().await;
    let now = Utc::now();

    let recent = images::resolve_or_create(&pool, "/captures/new.jpg", "new.jpg", now, None)
        .await
        .unwrap();
    let stale = images::resolve_or_create(
        &pool,
        "/captures/old.jpg",
        "old.jpg",
        now - Duration::days(3),
        None,
    )
    .await
    .unwrap();
    // Recent but unpredicted: not part of the backlog either
    images::resolve_or_create(&pool, "/captures/raw.jpg", "raw.jpg", now, None)
        .await
        .unwrap();

    for image_id in [recent.id, stale.id] {
        predictions::insert(
            &pool,
            image_id,
            &classification(EmissionLabel::Smog, 0.8, 0.9),
            "cnn-sidecar",
            now,
        )
        .await
        .unwrap();
    }

    let backlog = images::predicted_since(&pool, now - Duration::hours(1))
        .await
        .unwrap();
    assert_eq!(backlog.len(), 1);
    assert_eq!(backlog[0].id, recent.id);
}
