//! Integration tests for the PostgreSQL entity store.
//!
//! These need a reachable PostgreSQL server (`DATABASE_URL`); run them with
//! `cargo test -p vidintel-db -- --ignored`.

use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use sqlx::PgPool;
use vidintel_core::analysis::{ErrorCode, ProcessingError, ResultPayload, Stage};
use vidintel_core::lifecycle::{SourceType, VideoStatus};
use vidintel_core::types::new_id;
use vidintel_db::models::task::TaskState;
use vidintel_db::models::video::CreateVideo;
use vidintel_db::repositories::{TaskRepo, VideoRepo};
use vidintel_db::store::{PgVideoStore, StatusChange, StoreError, VideoStore};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn url_video(url: &str) -> CreateVideo {
    CreateVideo {
        id: new_id(),
        source_type: SourceType::Url,
        source_url: Some(url.to_string()),
        storage_path: url.to_string(),
        duration: None,
        resolution: None,
        size_mb: None,
        status: VideoStatus::Uploaded,
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn status_lookup_table_matches_enum(pool: PgPool) {
    vidintel_db::health_check(&pool).await.unwrap();

    let rows: Vec<(i16, String)> =
        sqlx::query_as("SELECT id, name FROM video_statuses ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();

    for (id, name) in rows {
        let status = VideoStatus::from_id(id).expect("unknown status id in seed data");
        assert_eq!(status.as_str(), name);
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn check_constraint_enforces_source_url_iff_url(pool: PgPool) {
    let store = PgVideoStore::new(pool);
    let mut input = url_video("https://example.com/a.mp4");
    input.source_url = None;

    assert_matches!(
        store.insert_video(&input).await,
        Err(StoreError::Constraint(_))
    );
}

// ---------------------------------------------------------------------------
// Videos
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn create_get_and_list(pool: PgPool) {
    let repo = VideoRepo::new(Arc::new(PgVideoStore::new(pool)));

    let first = repo.create(&url_video("https://example.com/1.mp4")).await.unwrap();
    let second = repo.create(&url_video("https://example.com/2.mp4")).await.unwrap();

    let fetched = repo.get_by_id(first.id).await.unwrap().unwrap();
    assert_eq!(fetched.status, VideoStatus::Uploaded);
    assert_eq!(fetched.source_type, SourceType::Url);

    let listed = repo.list(10, 0).await.unwrap();
    assert_eq!(listed[0].id, second.id);
    assert_eq!(listed[1].id, first.id);
    assert!(repo.list(10, 2).await.unwrap().is_empty());
    assert_eq!(repo.count().await.unwrap(), 2);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn conditional_update_has_one_winner(pool: PgPool) {
    let store = PgVideoStore::new(pool);
    let video = store
        .insert_video(&url_video("https://example.com/a.mp4"))
        .await
        .unwrap();

    let (a, b) = tokio::join!(
        store.set_status(video.id, VideoStatus::Processing, Some(VideoStatus::Uploaded)),
        store.set_status(video.id, VideoStatus::Processing, Some(VideoStatus::Uploaded)),
    );
    let outcomes = [a.unwrap(), b.unwrap()];
    let applied = outcomes
        .iter()
        .filter(|c| matches!(c, StatusChange::Applied(_)))
        .count();
    assert_eq!(applied, 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn finalize_writes_status_and_result_together(pool: PgPool) {
    let store = PgVideoStore::new(pool);
    let video = store
        .insert_video(&url_video("https://example.com/a.mp4"))
        .await
        .unwrap();
    store
        .set_status(video.id, VideoStatus::Processing, None)
        .await
        .unwrap();

    let payload = ResultPayload {
        nlp_result: Some(json!({"summary": "ok"})),
        cv_result: None,
        risk_result: Some(json!({"score": 0.2})),
        errors: Some(vec![ProcessingError::new(
            Stage::Cv,
            ErrorCode::Timeout,
            "cv timed out",
        )]),
    };

    let change = store
        .finalize(video.id, VideoStatus::Processing, VideoStatus::PartialSuccess, &payload)
        .await
        .unwrap();
    assert_matches!(change, StatusChange::Applied(v) if v.status == VideoStatus::PartialSuccess);

    let stored = store.find_ai_result(video.id).await.unwrap().unwrap();
    assert_eq!(stored.payload(), payload);

    let stale = store
        .finalize(video.id, VideoStatus::Processing, VideoStatus::Failed, &payload)
        .await
        .unwrap();
    assert_matches!(stale, StatusChange::Stale(_));
}

// ---------------------------------------------------------------------------
// Task queue
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
#[ignore = "requires PostgreSQL"]
async fn queue_claims_once_and_redelivers_after_release(pool: PgPool) {
    let store: Arc<dyn VideoStore> = Arc::new(PgVideoStore::new(pool));
    let tasks = TaskRepo::new(Arc::clone(&store));
    let video = store
        .insert_video(&url_video("https://example.com/a.mp4"))
        .await
        .unwrap();

    let queued = tasks.enqueue(video.id).await.unwrap();
    assert_eq!(queued.state, TaskState::Queued);
    assert_eq!(tasks.enqueue(video.id).await.unwrap().id, queued.id);

    let claimed = tasks.claim(Duration::from_secs(60)).await.unwrap().unwrap();
    assert_eq!(claimed.state, TaskState::Running);
    assert!(tasks.claim(Duration::from_secs(60)).await.unwrap().is_none());

    tasks.release(claimed.id, Duration::ZERO, "transient").await.unwrap();
    let again = tasks.claim(Duration::from_secs(60)).await.unwrap().unwrap();
    assert_eq!(again.attempts, 2);
    assert_eq!(again.last_error.as_deref(), Some("transient"));

    tasks.complete(again.id).await.unwrap();
    assert!(tasks.claim(Duration::from_secs(60)).await.unwrap().is_none());
}
