//! Source scrapers for the supported Kenyan job boards.
//!
//! Each board is scraped the same way: fetch a listing page, convert it to
//! Markdown, and let the LLM extractor pull postings out of it against
//! [`listing_schema`]. Only the page URLs differ between boards.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use kazi_core::error::AppError;
use kazi_core::models::RawRecord;
use kazi_core::traits::{Cleaner, Extractor, Fetcher, SourceScraper};
use serde::Deserialize;
use url::Url;

const DEFAULT_PAGE_DELAY: Duration = Duration::from_secs(2);

/// A supported job board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobBoard {
    Fuzu,
    MyJobMag,
    BrighterMonday,
}

impl JobBoard {
    pub const ALL: [JobBoard; 3] = [JobBoard::Fuzu, JobBoard::MyJobMag, JobBoard::BrighterMonday];

    pub fn platform(&self) -> &'static str {
        match self {
            JobBoard::Fuzu => "fuzu",
            JobBoard::MyJobMag => "myjobmag",
            JobBoard::BrighterMonday => "brightermonday",
        }
    }

    pub fn base_url(&self) -> &'static str {
        match self {
            JobBoard::Fuzu => "https://www.fuzu.com",
            JobBoard::MyJobMag => "https://www.myjobmag.com",
            JobBoard::BrighterMonday => "https://www.brightermonday.co.ke",
        }
    }

    /// Listing URL for a 1-indexed page.
    pub fn page_url(&self, page: u32) -> String {
        match self {
            JobBoard::Fuzu => format!("{}/ke/jobs?page={page}", self.base_url()),
            JobBoard::MyJobMag if page <= 1 => {
                format!("{}/jobs-by-country/kenya", self.base_url())
            }
            JobBoard::MyJobMag => format!("{}/jobs-by-country/kenya/page-{page}", self.base_url()),
            JobBoard::BrighterMonday => format!("{}/jobs?page={page}", self.base_url()),
        }
    }
}

impl fmt::Display for JobBoard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.platform())
    }
}

impl FromStr for JobBoard {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "fuzu" => Ok(JobBoard::Fuzu),
            "myjobmag" => Ok(JobBoard::MyJobMag),
            "brightermonday" => Ok(JobBoard::BrighterMonday),
            _ => Err(format!("Unknown job board: {}", s)),
        }
    }
}

/// Configuration shared by all board scrapers.
#[derive(Debug, Clone)]
pub struct BoardConfig {
    /// Pause between consecutive pages of the same board.
    pub page_delay: Duration,
}

impl BoardConfig {
    pub fn new(page_delay: Duration) -> Self {
        Self { page_delay }
    }
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            page_delay: DEFAULT_PAGE_DELAY,
        }
    }
}

/// JSON schema the extractor fills for one listing page.
///
/// Every property is required and nullable fields use a `null` union, as
/// strict structured-output mode demands.
pub fn listing_schema() -> serde_json::Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "listings": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "title": {"type": "string"},
                        "company": {"type": ["string", "null"]},
                        "location": {"type": ["string", "null"]},
                        "description": {"type": ["string", "null"]},
                        "url": {"type": "string"}
                    },
                    "required": ["title", "company", "location", "description", "url"],
                    "additionalProperties": false
                }
            }
        },
        "required": ["listings"],
        "additionalProperties": false
    })
}

#[derive(Debug, Deserialize)]
struct ListingPage {
    listings: Vec<Listing>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    title: String,
    company: Option<String>,
    location: Option<String>,
    description: Option<String>,
    #[serde(default)]
    url: String,
}

/// Scrapes one job board through fetch → clean → extract.
#[derive(Clone)]
pub struct ListingScraper<F, C, E>
where
    F: Fetcher,
    C: Cleaner,
    E: Extractor,
{
    board: JobBoard,
    fetcher: F,
    cleaner: C,
    extractor: E,
    config: BoardConfig,
}

impl<F, C, E> ListingScraper<F, C, E>
where
    F: Fetcher,
    C: Cleaner,
    E: Extractor,
{
    pub fn new(board: JobBoard, fetcher: F, cleaner: C, extractor: E) -> Self {
        Self {
            board,
            fetcher,
            cleaner,
            extractor,
            config: BoardConfig::default(),
        }
    }

    pub fn with_config(mut self, config: BoardConfig) -> Self {
        self.config = config;
        self
    }

    async fn scrape_page(&self, url: &str) -> Result<Vec<RawRecord>, AppError> {
        let html = self.fetcher.fetch(url).await?;
        let markdown = self.cleaner.clean(&html)?;
        let extracted = self.extractor.extract(&markdown, &listing_schema()).await?;

        let page: ListingPage = serde_json::from_value(extracted).map_err(|e| {
            AppError::SchemaValidationError(format!("Unexpected listing shape: {e}"))
        })?;

        Ok(page
            .listings
            .into_iter()
            .filter_map(|listing| self.to_record(listing))
            .collect())
    }

    /// Turn an extracted listing into a record, dropping it if it lacks a
    /// title or a usable link.
    fn to_record(&self, listing: Listing) -> Option<RawRecord> {
        let Some(url) = resolve_url(self.board.base_url(), &listing.url) else {
            tracing::debug!(
                platform = self.board.platform(),
                href = %listing.url,
                "Dropping listing without a usable link"
            );
            return None;
        };

        RawRecord::from_listing(
            &listing.title,
            listing.company.as_deref(),
            listing.location.as_deref(),
            listing.description.as_deref(),
            &url,
            self.board.platform(),
        )
    }
}

impl<F, C, E> SourceScraper for ListingScraper<F, C, E>
where
    F: Fetcher,
    C: Cleaner,
    E: Extractor,
{
    fn platform(&self) -> &str {
        self.board.platform()
    }

    /// Walk listing pages 1..=max_pages.
    ///
    /// A failing first page fails the source. A failure on a later page ends
    /// paging but keeps what was already gathered, and so does a page with
    /// no listings.
    async fn scrape(&self, max_pages: u32) -> Result<Vec<RawRecord>, AppError> {
        let platform = self.board.platform();
        let mut records = Vec::new();

        for page in 1..=max_pages {
            if page > 1 && !self.config.page_delay.is_zero() {
                tokio::time::sleep(self.config.page_delay).await;
            }

            let url = self.board.page_url(page);
            tracing::info!(%platform, %page, %url, "Scraping listing page");

            match self.scrape_page(&url).await {
                Ok(found) if found.is_empty() => {
                    tracing::info!(%platform, %page, "No listings found, stopping");
                    break;
                }
                Ok(found) => {
                    tracing::info!(%platform, %page, count = found.len(), "Found listings");
                    records.extend(found);
                }
                Err(e) if page == 1 => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        %platform,
                        %page,
                        error = %e,
                        "Page failed, keeping earlier pages"
                    );
                    break;
                }
            }
        }

        Ok(records)
    }
}

/// Resolve a listing link against the board's base URL. Only http(s)
/// results are accepted.
fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    let resolved = Url::parse(base).ok()?.join(href).ok()?;
    match resolved.scheme() {
        "http" | "https" => Some(resolved.to_string()),
        _ => None,
    }
}
