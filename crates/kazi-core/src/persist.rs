use crate::models::{CategorizedRecord, PersistOutcome, PersistSummary};
use crate::traits::OpportunityStore;

/// Writes categorized records to the store at most once per `source_url`.
///
/// The existence check and the insert are two separate store calls with
/// nothing held between them.
pub struct PersistenceGateway<S: OpportunityStore> {
    store: S,
    dry_run: bool,
}

impl<S: OpportunityStore> PersistenceGateway<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            dry_run: false,
        }
    }

    /// In dry-run mode the store is never touched, not even for lookups.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Persist one record unless its URL is already stored.
    pub async fn persist(&self, record: &CategorizedRecord) -> PersistOutcome {
        let url = record.source_url();

        if self.dry_run {
            tracing::debug!(title = %record.title(), %url, "Dry run, not saving");
            return PersistOutcome::DryRun;
        }

        match self.store.find_by_source_url(url).await {
            Ok(Some(_)) => {
                tracing::info!(title = %record.title(), %url, "Skipping duplicate");
                return PersistOutcome::Skipped;
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!(title = %record.title(), %url, error = %e, "Lookup failed");
                return PersistOutcome::Failed(e.to_string());
            }
        }

        match self.store.insert(record).await {
            Ok(Some(id)) => {
                tracing::info!(%id, title = %record.title(), category = %record.category, "Saved");
                PersistOutcome::Saved(id)
            }
            Ok(None) => {
                tracing::info!(title = %record.title(), %url, "Stored concurrently, skipping");
                PersistOutcome::Skipped
            }
            Err(e) => {
                tracing::error!(title = %record.title(), %url, error = %e, "Insert failed");
                PersistOutcome::Failed(e.to_string())
            }
        }
    }

    /// Persist a batch in order. A failing record never stops the batch.
    pub async fn persist_all(&self, records: &[CategorizedRecord]) -> PersistSummary {
        let mut summary = PersistSummary {
            dry_run: self.dry_run,
            ..PersistSummary::default()
        };

        if self.dry_run {
            tracing::info!(records = records.len(), "Dry run, not saving to database");
        }

        for record in records {
            let outcome = self.persist(record).await;
            summary.record(&outcome);
        }

        tracing::info!(
            saved = summary.saved,
            skipped = summary.skipped,
            errors = summary.errors,
            "Persistence complete"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AppError;
    use crate::models::{Category, RecordStatus};
    use crate::testutil::*;

    #[tokio::test]
    async fn same_record_twice_saves_then_skips() {
        let store = MockStore::empty();
        let gateway = PersistenceGateway::new(store.clone());
        let record = make_categorized("fuzu", 1, Category::Job);

        let first = gateway.persist(&record).await;
        let second = gateway.persist(&record).await;

        assert!(matches!(first, PersistOutcome::Saved(_)));
        assert_eq!(second, PersistOutcome::Skipped);
        let rows = store.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].source_url(), record.source_url());
    }

    #[tokio::test]
    async fn inserted_record_is_active_with_category() {
        let store = MockStore::empty();
        let gateway = PersistenceGateway::new(store.clone());

        gateway
            .persist(&make_categorized("fuzu", 1, Category::Attachment))
            .await;

        let rows = store.rows.lock().unwrap();
        assert_eq!(rows[0].status, RecordStatus::Active);
        assert_eq!(rows[0].category, Category::Attachment);
    }

    #[tokio::test]
    async fn existing_url_is_not_written() {
        let existing = make_categorized("fuzu", 1, Category::Job);
        let store = MockStore::with_rows(vec![existing.clone()]);
        let gateway = PersistenceGateway::new(store.clone());

        let outcome = gateway.persist(&existing).await;

        assert_eq!(outcome, PersistOutcome::Skipped);
        assert_eq!(*store.inserts.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn store_error_is_counted_and_batch_continues() {
        let store = MockStore::empty().fail_insert_for("https://example.com/fuzu/1");
        let gateway = PersistenceGateway::new(store.clone());
        let records: Vec<_> = (0..3)
            .map(|i| make_categorized("fuzu", i, Category::Job))
            .collect();

        let summary = gateway.persist_all(&records).await;

        assert_eq!(summary.saved, 2);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.errors, 1);
        assert!(!summary.dry_run);
        assert_eq!(store.rows.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn lookup_error_is_reported_as_failed() {
        let store =
            MockStore::with_lookup_error(AppError::DatabaseError("connection reset".into()));
        let gateway = PersistenceGateway::new(store.clone());

        let outcome = gateway.persist(&make_categorized("fuzu", 1, Category::Job)).await;

        assert!(matches!(
            outcome,
            PersistOutcome::Failed(ref msg) if msg.contains("connection reset")
        ));
        assert_eq!(*store.inserts.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn lost_insert_race_counts_as_skipped() {
        let store = MockStore::empty().conflict_on_insert();
        let gateway = PersistenceGateway::new(store);

        let outcome = gateway.persist(&make_categorized("fuzu", 1, Category::Job)).await;

        assert_eq!(outcome, PersistOutcome::Skipped);
    }

    #[tokio::test]
    async fn mixed_batch_summary() {
        let existing = make_categorized("fuzu", 0, Category::Job);
        let store = MockStore::with_rows(vec![existing.clone()]);
        let gateway = PersistenceGateway::new(store);
        let records = vec![
            existing,
            make_categorized("fuzu", 1, Category::Internship),
            make_categorized("fuzu", 1, Category::Internship),
            make_categorized("fuzu", 2, Category::Attachment),
        ];

        let summary = gateway.persist_all(&records).await;

        assert_eq!(summary.saved, 2);
        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.errors, 0);
    }

    #[tokio::test]
    async fn dry_run_touches_nothing() {
        let store = MockStore::empty();
        let gateway = PersistenceGateway::new(store.clone()).dry_run(true);
        let records: Vec<_> = (0..5)
            .map(|i| make_categorized("fuzu", i, Category::Job))
            .collect();

        let summary = gateway.persist_all(&records).await;

        assert_eq!(summary.saved, 0);
        assert_eq!(summary.skipped, 0);
        assert_eq!(summary.errors, 0);
        assert!(summary.dry_run);
        assert_eq!(*store.lookups.lock().unwrap(), 0);
        assert_eq!(*store.inserts.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn dry_run_single_persist_touches_nothing() {
        let store = MockStore::empty();
        let gateway = PersistenceGateway::new(store.clone()).dry_run(true);

        let outcome = gateway.persist(&make_categorized("fuzu", 1, Category::Job)).await;

        assert_eq!(outcome, PersistOutcome::DryRun);
        assert_eq!(*store.lookups.lock().unwrap(), 0);
        assert_eq!(*store.inserts.lock().unwrap(), 0);
        assert!(store.rows.lock().unwrap().is_empty());
    }
}
