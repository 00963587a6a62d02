//! Test utilities: mock implementations of all core traits.
//!
//! Handwritten mocks for dependency injection in unit tests.
//! All mocks use `Arc<Mutex<_>>` for interior mutability, allowing
//! test assertions on recorded calls.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CategorizedRecord, Category, RawRecord};
use crate::pipeline::{PipelineEvent, PipelineReporter};
use crate::traits::{
    ClassificationOracle, Cleaner, Extractor, Fetcher, OpportunityStore, OracleRequest,
    SourceScraper,
};

// ---------------------------------------------------------------------------
// MockScraper
// ---------------------------------------------------------------------------

/// Mock source scraper returning a fixed set of records.
#[derive(Clone)]
pub struct MockScraper {
    platform: String,
    records: Vec<RawRecord>,
    /// Queue of errors. Each call pops the first one; once empty, the
    /// configured records are returned.
    errors: Arc<Mutex<Vec<AppError>>>,
    delay: Option<Duration>,
    panics: bool,
    /// `max_pages` of every call, in call order.
    pub calls: Arc<Mutex<Vec<u32>>>,
}

impl MockScraper {
    pub fn new(platform: &str, records: Vec<RawRecord>) -> Self {
        Self {
            platform: platform.to_string(),
            records,
            errors: Arc::new(Mutex::new(Vec::new())),
            delay: None,
            panics: false,
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_error(platform: &str, error: AppError) -> Self {
        let scraper = Self::new(platform, Vec::new());
        scraper.errors.lock().unwrap().push(error);
        scraper
    }

    pub fn panicking(platform: &str) -> Self {
        Self {
            panics: true,
            ..Self::new(platform, Vec::new())
        }
    }

    /// Sleep before answering, to simulate a slow board.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

impl SourceScraper for MockScraper {
    fn platform(&self) -> &str {
        &self.platform
    }

    async fn scrape(&self, max_pages: u32) -> Result<Vec<RawRecord>, AppError> {
        self.calls.lock().unwrap().push(max_pages);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.panics {
            panic!("scraper for {} blew up", self.platform);
        }

        let next_error = {
            let mut errors = self.errors.lock().unwrap();
            if errors.is_empty() {
                None
            } else {
                Some(errors.remove(0))
            }
        };
        match next_error {
            Some(e) => Err(e),
            None => Ok(self.records.clone()),
        }
    }
}

// ---------------------------------------------------------------------------
// MockOracle
// ---------------------------------------------------------------------------

/// Mock oracle with a queue of answers and a default once it runs dry.
#[derive(Clone)]
pub struct MockOracle {
    answers: Arc<Mutex<Vec<Result<String, AppError>>>>,
    /// Answer once the queue is empty. `Err` carries an error message.
    default: Result<String, String>,
    pub requests: Arc<Mutex<Vec<OracleRequest>>>,
}

impl MockOracle {
    /// Always answers `answer`.
    pub fn new(answer: &str) -> Self {
        Self {
            answers: Arc::new(Mutex::new(Vec::new())),
            default: Ok(answer.to_string()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Every call fails: the first with `error` itself, later ones with a
    /// network error carrying the same message.
    pub fn with_error(error: AppError) -> Self {
        let message = error.to_string();
        Self {
            answers: Arc::new(Mutex::new(vec![Err(error)])),
            default: Err(message),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Pops one answer per call, then answers `job`.
    pub fn with_answers(answers: Vec<Result<String, AppError>>) -> Self {
        Self {
            answers: Arc::new(Mutex::new(answers)),
            default: Ok("job".to_string()),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl ClassificationOracle for MockOracle {
    async fn complete(&self, request: &OracleRequest) -> Result<String, AppError> {
        self.requests.lock().unwrap().push(request.clone());

        let mut answers = self.answers.lock().unwrap();
        if answers.is_empty() {
            self.default.clone().map_err(AppError::NetworkError)
        } else {
            answers.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockStore
// ---------------------------------------------------------------------------

/// In-memory store that records lookups and inserts.
#[derive(Clone)]
pub struct MockStore {
    pub rows: Arc<Mutex<Vec<CategorizedRecord>>>,
    pub lookups: Arc<Mutex<usize>>,
    /// Insert attempts, including failed ones.
    pub inserts: Arc<Mutex<usize>>,
    lookup_error: Arc<Mutex<Option<AppError>>>,
    failing_urls: Vec<String>,
    conflict: bool,
}

impl MockStore {
    /// Empty store, nothing persisted yet.
    pub fn empty() -> Self {
        Self::with_rows(Vec::new())
    }

    /// Store that already holds `rows`.
    pub fn with_rows(rows: Vec<CategorizedRecord>) -> Self {
        Self {
            rows: Arc::new(Mutex::new(rows)),
            lookups: Arc::new(Mutex::new(0)),
            inserts: Arc::new(Mutex::new(0)),
            lookup_error: Arc::new(Mutex::new(None)),
            failing_urls: Vec::new(),
            conflict: false,
        }
    }

    /// Store whose next lookup fails.
    pub fn with_lookup_error(error: AppError) -> Self {
        let store = Self::empty();
        *store.lookup_error.lock().unwrap() = Some(error);
        store
    }

    /// Inserts for `url` fail with a database error.
    pub fn fail_insert_for(mut self, url: &str) -> Self {
        self.failing_urls.push(url.to_string());
        self
    }

    /// Inserts report a lost race: nothing is written and no id comes back.
    pub fn conflict_on_insert(mut self) -> Self {
        self.conflict = true;
        self
    }
}

impl OpportunityStore for MockStore {
    async fn find_by_source_url(&self, source_url: &str) -> Result<Option<Uuid>, AppError> {
        *self.lookups.lock().unwrap() += 1;

        if let Some(e) = self.lookup_error.lock().unwrap().take() {
            return Err(e);
        }
        let rows = self.rows.lock().unwrap();
        Ok(rows
            .iter()
            .any(|r| r.source_url() == source_url)
            .then(Uuid::nil))
    }

    async fn insert(&self, record: &CategorizedRecord) -> Result<Option<Uuid>, AppError> {
        *self.inserts.lock().unwrap() += 1;

        if self.failing_urls.iter().any(|u| u == record.source_url()) {
            return Err(AppError::DatabaseError(format!(
                "insert rejected for {}",
                record.source_url()
            )));
        }
        if self.conflict {
            return Ok(None);
        }
        self.rows.lock().unwrap().push(record.clone());
        Ok(Some(Uuid::new_v4()))
    }
}

// ---------------------------------------------------------------------------
// MockFetcher
// ---------------------------------------------------------------------------

/// Mock fetcher that returns a configurable response.
#[derive(Clone)]
pub struct MockFetcher {
    /// Queue of responses. Each call pops the first element.
    /// If empty, returns a default HTML string.
    responses: Arc<Mutex<Vec<Result<String, AppError>>>>,
    /// Every URL requested, in order.
    pub urls: Arc<Mutex<Vec<String>>>,
}

impl MockFetcher {
    pub fn new(html: &str) -> Self {
        Self::with_responses(vec![Ok(html.to_string())])
    }

    pub fn with_error(error: AppError) -> Self {
        Self::with_responses(vec![Err(error)])
    }

    pub fn with_responses(responses: Vec<Result<String, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            urls: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Fetcher for MockFetcher {
    async fn fetch(&self, url: &str) -> Result<String, AppError> {
        self.urls.lock().unwrap().push(url.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok("<html><body>default</body></html>".to_string())
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockCleaner
// ---------------------------------------------------------------------------

/// Mock cleaner that returns its input unchanged unless told to fail.
#[derive(Clone)]
pub struct MockCleaner {
    error: Arc<Mutex<Option<AppError>>>,
}

impl MockCleaner {
    pub fn passthrough() -> Self {
        Self {
            error: Arc::new(Mutex::new(None)),
        }
    }

    pub fn with_error(error: AppError) -> Self {
        Self {
            error: Arc::new(Mutex::new(Some(error))),
        }
    }
}

impl Cleaner for MockCleaner {
    fn clean(&self, html: &str) -> Result<String, AppError> {
        if let Some(e) = self.error.lock().unwrap().take() {
            return Err(e);
        }
        Ok(html.to_string())
    }
}

// ---------------------------------------------------------------------------
// MockExtractor
// ---------------------------------------------------------------------------

/// Mock extractor that returns configurable JSON.
#[derive(Clone)]
pub struct MockExtractor {
    responses: Arc<Mutex<Vec<Result<serde_json::Value, AppError>>>>,
    /// Content passed to every call, in order.
    pub contents: Arc<Mutex<Vec<String>>>,
}

impl MockExtractor {
    pub fn new(data: serde_json::Value) -> Self {
        Self::with_responses(vec![Ok(data)])
    }

    pub fn with_responses(responses: Vec<Result<serde_json::Value, AppError>>) -> Self {
        Self {
            responses: Arc::new(Mutex::new(responses)),
            contents: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl Extractor for MockExtractor {
    async fn extract(
        &self,
        content: &str,
        _schema: &serde_json::Value,
    ) -> Result<serde_json::Value, AppError> {
        self.contents.lock().unwrap().push(content.to_string());
        let mut responses = self.responses.lock().unwrap();
        if responses.is_empty() {
            Ok(serde_json::json!({"listings": []}))
        } else {
            responses.remove(0)
        }
    }
}

// ---------------------------------------------------------------------------
// MockReporter
// ---------------------------------------------------------------------------

/// Mock pipeline reporter that records event names.
#[derive(Default)]
pub struct MockReporter {
    pub events: Arc<Mutex<Vec<String>>>,
}

impl MockReporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PipelineReporter for MockReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        let label = match &event {
            PipelineEvent::Started { .. } => "Started",
            PipelineEvent::SourceCollected { .. } => "SourceCollected",
            PipelineEvent::SourceFailed { .. } => "SourceFailed",
            PipelineEvent::Deduplicated { .. } => "Deduplicated",
            PipelineEvent::Classified { .. } => "Classified",
            PipelineEvent::Persisted { .. } => "Persisted",
            PipelineEvent::Finished { .. } => "Finished",
        };
        self.events.lock().unwrap().push(label.to_string());
    }
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

/// A raw record with URL `https://example.com/{platform}/{n}`.
pub fn make_record(platform: &str, n: usize) -> RawRecord {
    RawRecord {
        title: format!("Title {n}"),
        company: "Acme Ltd".to_string(),
        location: "Nairobi".to_string(),
        description: format!("Description for posting {n}"),
        source_url: format!("https://example.com/{platform}/{n}"),
        source_platform: platform.to_string(),
    }
}

/// `count` records with distinct URLs.
pub fn make_records(platform: &str, count: usize) -> Vec<RawRecord> {
    (0..count).map(|n| make_record(platform, n)).collect()
}

pub fn make_categorized(platform: &str, n: usize, category: Category) -> CategorizedRecord {
    CategorizedRecord::new(make_record(platform, n), category)
}
