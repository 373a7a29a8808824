use crate::domain::models::outbox::OutboxStatus;
use crate::domain::repositories::outbox_repository::{OutboxRepository, RepositoryError};
use crate::infrastructure::database::entities::outbox;
use crate::infrastructure::repositories::outbox_repo_impl::OutboxRepositoryImpl;
use chrono::Utc;
use migration::{Migrator, MigratorTrait};
use sea_orm::{ActiveModelTrait, Database, DatabaseConnection, EntityTrait, Set};
use std::collections::HashSet;
use std::sync::Arc;

/// File-backed SQLite so every pooled connection sees the same database
async fn setup_db() -> (Arc<DatabaseConnection>, tempfile::TempPath) {
    let path = tempfile::NamedTempFile::new().unwrap().into_temp_path();
    let url = format!("sqlite://{}?mode=rwc", path.to_str().unwrap());
    let db = Arc::new(Database::connect(&url).await.unwrap());
    Migrator::up(db.as_ref(), None).await.unwrap();
    (db, path)
}

async fn insert_message(
    db: &DatabaseConnection,
    application: &str,
    destination: &str,
    age_seconds: i64,
) -> i64 {
    let inserted_at = Utc::now() - chrono::Duration::seconds(age_seconds);
    let model = outbox::ActiveModel {
        destination: Set(destination.to_string()),
        payload: Set("hello".to_string()),
        status: Set(OutboxStatus::Pending.code()),
        application: Set(application.to_string()),
        inserted_at: Set(inserted_at.into()),
        ..Default::default()
    };
    model.insert(db).await.unwrap().id
}

async fn status_of(db: &DatabaseConnection, id: i64) -> i16 {
    outbox::Entity::find_by_id(id)
        .one(db)
        .await
        .unwrap()
        .unwrap()
        .status
}

#[tokio::test]
async fn test_claim_returns_oldest_pending_first() {
    let (db, _path) = setup_db().await;
    let repo = OutboxRepositoryImpl::new(db.clone());

    let oldest = insert_message(&db, "Sales", "081111111111", 300).await;
    let middle = insert_message(&db, "Sales", "082222222222", 200).await;
    let newest = insert_message(&db, "Sales", "083333333333", 100).await;

    let first = repo.claim_next("Sales").await.unwrap().unwrap();
    let second = repo.claim_next("Sales").await.unwrap().unwrap();
    let third = repo.claim_next("Sales").await.unwrap().unwrap();

    assert_eq!(first.id, oldest);
    assert_eq!(second.id, middle);
    assert_eq!(third.id, newest);
    assert_eq!(first.status, OutboxStatus::Claimed);
}

#[tokio::test]
async fn test_claim_respects_application_filter() {
    let (db, _path) = setup_db().await;
    let repo = OutboxRepositoryImpl::new(db.clone());

    // The AppB row is older but must stay invisible to the AppA worker
    let app_b = insert_message(&db, "AppB", "081111111111", 500).await;
    let app_a = insert_message(&db, "AppA", "082222222222", 100).await;

    let claimed = repo.claim_next("AppA").await.unwrap().unwrap();
    assert_eq!(claimed.id, app_a);
    assert_eq!(claimed.application, "AppA");

    assert!(repo.claim_next("AppA").await.unwrap().is_none());
    assert_eq!(status_of(&db, app_b).await, OutboxStatus::Pending.code());
}

#[tokio::test]
async fn test_wildcard_filter_matches_all_applications() {
    let (db, _path) = setup_db().await;
    let repo = OutboxRepositoryImpl::new(db.clone());

    insert_message(&db, "AppA", "081111111111", 200).await;
    insert_message(&db, "AppB", "082222222222", 100).await;

    let first = repo.claim_next("*").await.unwrap().unwrap();
    let second = repo.claim_next("*").await.unwrap().unwrap();

    assert_eq!(first.application, "AppA");
    assert_eq!(second.application, "AppB");
    assert!(repo.claim_next("*").await.unwrap().is_none());
}

#[tokio::test]
async fn test_concurrent_claims_yield_distinct_rows() {
    let (db, _path) = setup_db().await;
    let repo = Arc::new(OutboxRepositoryImpl::new(db.clone()));

    for i in 0..3 {
        insert_message(&db, "Sales", &format!("08123456789{}", i), 100 - i).await;
    }

    // Five claimers racing for three rows: exactly three distinct claims
    let attempts = (0..5).map(|_| {
        let repo = repo.clone();
        async move { repo.claim_next("Sales").await.unwrap() }
    });
    let results = futures::future::join_all(attempts).await;

    let claimed: Vec<i64> = results.iter().flatten().map(|m| m.id).collect();
    let distinct: HashSet<i64> = claimed.iter().copied().collect();

    assert_eq!(claimed.len(), 3);
    assert_eq!(distinct.len(), 3);
    assert_eq!(results.iter().filter(|r| r.is_none()).count(), 2);
}

#[tokio::test]
async fn test_terminal_states_are_final() {
    let (db, _path) = setup_db().await;
    let repo = OutboxRepositoryImpl::new(db.clone());

    let id = insert_message(&db, "Sales", "081234567890", 100).await;

    let claimed = repo.claim_next("Sales").await.unwrap().unwrap();
    assert_eq!(claimed.id, id);

    repo.mark_sent(id, "628000000001").await.unwrap();
    assert_eq!(status_of(&db, id).await, OutboxStatus::Sent.code());
    assert!(OutboxStatus::Sent.is_terminal());
    assert!(!OutboxStatus::Claimed.is_terminal());

    // A sent message is never claimed again
    assert!(repo.claim_next("Sales").await.unwrap().is_none());

    // And never changes status again
    let err = repo.mark_failed(id, "late failure").await.unwrap_err();
    assert!(matches!(err, RepositoryError::Inconsistent(_)));
    assert_eq!(status_of(&db, id).await, OutboxStatus::Sent.code());
}

#[tokio::test]
async fn test_mark_sent_records_identity_and_timestamp() {
    let (db, _path) = setup_db().await;
    let repo = OutboxRepositoryImpl::new(db.clone());

    let id = insert_message(&db, "Sales", "081234567890", 100).await;
    repo.claim_next("Sales").await.unwrap().unwrap();
    repo.mark_sent(id, "628000000001").await.unwrap();

    let row = outbox::Entity::find_by_id(id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.from_identity.as_deref(), Some("628000000001"));
    assert!(row.sent_at.is_some());
}

#[tokio::test]
async fn test_mark_failed_records_error_text() {
    let (db, _path) = setup_db().await;
    let repo = OutboxRepositoryImpl::new(db.clone());

    let id = insert_message(&db, "Sales", "081234567890", 100).await;
    repo.claim_next("Sales").await.unwrap().unwrap();
    repo.mark_failed(id, "provider rejected the message").await.unwrap();

    let row = outbox::Entity::find_by_id(id)
        .one(db.as_ref())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status, OutboxStatus::Failed.code());
    assert_eq!(
        row.last_error.as_deref(),
        Some("provider rejected the message")
    );
}

#[tokio::test]
async fn test_terminal_write_on_unclaimed_row_is_inconsistency() {
    let (db, _path) = setup_db().await;
    let repo = OutboxRepositoryImpl::new(db.clone());

    // Still Pending: nothing ever claimed it
    let id = insert_message(&db, "Sales", "081234567890", 100).await;

    let err = repo.mark_sent(id, "628000000001").await.unwrap_err();
    assert!(matches!(err, RepositoryError::Inconsistent(_)));
    assert_eq!(status_of(&db, id).await, OutboxStatus::Pending.code());
}
