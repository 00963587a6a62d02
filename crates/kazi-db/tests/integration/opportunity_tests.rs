use kazi_core::models::{CategorizedRecord, Category, PersistOutcome, RawRecord, RecordStatus};
use kazi_core::persist::PersistenceGateway;
use kazi_core::traits::OpportunityStore;

use crate::integration::common::setup_test_db;

fn record(n: usize, category: Category) -> CategorizedRecord {
    let raw = RawRecord::from_listing(
        &format!("Posting {n}"),
        Some("Acme Ltd"),
        Some("Nairobi"),
        Some("Work on things"),
        &format!("https://example.com/jobs/{n}"),
        "fuzu",
    )
    .unwrap();
    CategorizedRecord::new(raw, category)
}

async fn row_count(db: &kazi_db::Database) -> i64 {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM opportunities")
        .fetch_one(db.pool())
        .await
        .unwrap();
    count
}

#[tokio::test]
async fn insert_and_find_by_source_url() {
    let (db, _container) = setup_test_db().await;
    let repo = db.opportunity_repo();

    let rec = record(1, Category::Internship);
    let id = repo.insert(&rec).await.unwrap().expect("fresh insert");

    let found = repo
        .find_id_by_source_url("https://example.com/jobs/1")
        .await
        .unwrap();
    assert_eq!(found, Some(id));

    let stored = repo
        .get_by_source_url("https://example.com/jobs/1")
        .await
        .unwrap()
        .expect("stored row");
    assert_eq!(stored.id, id);
    assert_eq!(stored.record, rec);
    assert_eq!(stored.record.status, RecordStatus::Active);
}

#[tokio::test]
async fn unknown_url_is_not_found() {
    let (db, _container) = setup_test_db().await;
    let repo = db.opportunity_repo();

    assert_eq!(
        repo.find_id_by_source_url("https://example.com/missing")
            .await
            .unwrap(),
        None
    );
    assert!(
        repo.get_by_source_url("https://example.com/missing")
            .await
            .unwrap()
            .is_none()
    );
}

#[tokio::test]
async fn duplicate_insert_returns_none() {
    let (db, _container) = setup_test_db().await;
    let repo = db.opportunity_repo();

    let first = repo.insert(&record(1, Category::Job)).await.unwrap();
    assert!(first.is_some());

    // Same URL, different category: the stored row must not change
    let second = repo.insert(&record(1, Category::Attachment)).await.unwrap();
    assert_eq!(second, None);
    assert_eq!(row_count(&db).await, 1);

    let stored = repo
        .get_by_source_url("https://example.com/jobs/1")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.record.category, Category::Job);
}

#[tokio::test]
async fn gateway_saves_then_skips() {
    let (db, _container) = setup_test_db().await;
    let gateway = PersistenceGateway::new(db.opportunity_repo());
    let batch = vec![record(1, Category::Job), record(2, Category::Internship)];

    let first = gateway.persist_all(&batch).await;
    assert_eq!((first.saved, first.skipped, first.errors), (2, 0, 0));

    let second = gateway.persist_all(&batch).await;
    assert_eq!((second.saved, second.skipped, second.errors), (0, 2, 0));

    assert_eq!(row_count(&db).await, 2);
}

#[tokio::test]
async fn gateway_outcome_carries_store_id() {
    let (db, _container) = setup_test_db().await;
    let repo = db.opportunity_repo();
    let gateway = PersistenceGateway::new(repo.clone());

    let outcome = gateway.persist(&record(7, Category::Attachment)).await;
    let PersistOutcome::Saved(id) = outcome else {
        panic!("expected Saved, got {outcome:?}");
    };

    let found = OpportunityStore::find_by_source_url(&repo, "https://example.com/jobs/7")
        .await
        .unwrap();
    assert_eq!(found, Some(id));
}

#[tokio::test]
async fn dry_run_gateway_writes_nothing() {
    let (db, _container) = setup_test_db().await;
    let gateway = PersistenceGateway::new(db.opportunity_repo()).dry_run(true);

    let summary = gateway.persist_all(&[record(1, Category::Job)]).await;
    assert!(summary.dry_run);
    assert_eq!(summary.saved, 0);
    assert_eq!(row_count(&db).await, 0);
}

#[tokio::test]
async fn list_recent_filters_by_category() {
    let (db, _container) = setup_test_db().await;
    let repo = db.opportunity_repo();

    repo.insert(&record(1, Category::Job)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    repo.insert(&record(2, Category::Internship)).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    repo.insert(&record(3, Category::Job)).await.unwrap();

    let all = repo.list_recent(None, 10).await.unwrap();
    assert_eq!(all.len(), 3);
    assert_eq!(all[0].record.source_url(), "https://example.com/jobs/3");

    let jobs = repo.list_recent(Some(Category::Job), 10).await.unwrap();
    assert_eq!(jobs.len(), 2);
    assert!(jobs.iter().all(|o| o.record.category == Category::Job));

    let limited = repo.list_recent(None, 1).await.unwrap();
    assert_eq!(limited.len(), 1);
}

#[tokio::test]
async fn health_check_succeeds() {
    let (db, _container) = setup_test_db().await;
    db.opportunity_repo().health_check().await.unwrap();
}

#[tokio::test]
async fn check_constraint_rejects_unknown_type() {
    let (db, _container) = setup_test_db().await;

    let result = sqlx::query(
        r#"
        INSERT INTO opportunities (title, company, type, source_url)
        VALUES ('t', 'c', 'gig', 'https://x/1')
        "#,
    )
    .execute(db.pool())
    .await;
    assert!(result.is_err());
}
