use std::future::Future;

use uuid::Uuid;

use crate::error::AppError;
use crate::models::{CategorizedRecord, RawRecord};

/// Produces raw posting records for one job board.
pub trait SourceScraper: Send + Sync {
    /// Stable identifier of the board (e.g. `"fuzu"`).
    fn platform(&self) -> &str;

    /// Scrape up to `max_pages` listing pages.
    fn scrape(
        &self,
        max_pages: u32,
    ) -> impl Future<Output = Result<Vec<RawRecord>, AppError>> + Send;
}

/// A single bounded question for the classification oracle.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// External reasoning capability used for primary categorization.
///
/// Returns the oracle's raw text answer; nothing guarantees it is a valid
/// category token.
pub trait ClassificationOracle: Send + Sync {
    fn complete(
        &self,
        request: &OracleRequest,
    ) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Durable opportunity collection keyed by `source_url`.
pub trait OpportunityStore: Send + Sync {
    /// Id of the stored opportunity with this URL, if any.
    fn find_by_source_url(
        &self,
        source_url: &str,
    ) -> impl Future<Output = Result<Option<Uuid>, AppError>> + Send;

    /// Insert a new opportunity. Returns the generated id, or `None` when a
    /// concurrent writer stored the same URL first.
    fn insert(
        &self,
        record: &CategorizedRecord,
    ) -> impl Future<Output = Result<Option<Uuid>, AppError>> + Send;
}

/// Fetches raw HTML content from a URL.
pub trait Fetcher: Send + Sync + Clone {
    fn fetch(&self, url: &str) -> impl Future<Output = Result<String, AppError>> + Send;
}

/// Converts raw HTML into clean Markdown text.
pub trait Cleaner: Send + Sync + Clone {
    fn clean(&self, html: &str) -> Result<String, AppError>;
}

/// Extracts structured JSON data from text content using an LLM.
pub trait Extractor: Send + Sync + Clone {
    /// Sends the content and JSON schema to the LLM and returns extracted JSON.
    fn extract(
        &self,
        content: &str,
        schema: &serde_json::Value,
    ) -> impl Future<Output = Result<serde_json::Value, AppError>> + Send;
}

/// A store that never finds and never writes anything.
///
/// Stands in for the real store when a run is started with `--dry-run`;
/// the gateway in dry-run mode does not call it either.
#[derive(Debug, Clone)]
pub struct NullStore;

impl OpportunityStore for NullStore {
    async fn find_by_source_url(&self, _source_url: &str) -> Result<Option<Uuid>, AppError> {
        Ok(None)
    }

    async fn insert(&self, _record: &CategorizedRecord) -> Result<Option<Uuid>, AppError> {
        Ok(None)
    }
}
