use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Placeholder used when a board does not show the hiring company.
pub const UNKNOWN_COMPANY: &str = "Unknown Company";

/// Placeholder used when a board does not show a location.
pub const DEFAULT_LOCATION: &str = "Kenya";

/// An unclassified posting as produced by a source scraper.
///
/// Optional fields are already resolved to placeholders; downstream stages
/// never see a missing company, location or description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawRecord {
    pub title: String,
    pub company: String,
    pub location: String,
    pub description: String,
    /// Canonical posting URL, the identity of the record across the pipeline.
    pub source_url: String,
    pub source_platform: String,
}

impl RawRecord {
    /// Build a record from the fields a board listing may or may not carry.
    ///
    /// Returns `None` when the title or the URL is blank. Blank optional
    /// fields fall back to [`UNKNOWN_COMPANY`], [`DEFAULT_LOCATION`] and the
    /// title respectively.
    pub fn from_listing(
        title: &str,
        company: Option<&str>,
        location: Option<&str>,
        description: Option<&str>,
        source_url: &str,
        source_platform: &str,
    ) -> Option<Self> {
        fn non_blank(v: Option<&str>) -> Option<&str> {
            v.map(str::trim).filter(|s| !s.is_empty())
        }

        let title = non_blank(Some(title))?.to_string();
        let source_url = non_blank(Some(source_url))?.to_string();

        Some(Self {
            company: non_blank(company).unwrap_or(UNKNOWN_COMPANY).to_string(),
            location: non_blank(location).unwrap_or(DEFAULT_LOCATION).to_string(),
            description: non_blank(description)
                .map(str::to_string)
                .unwrap_or_else(|| title.clone()),
            title,
            source_url,
            source_platform: source_platform.to_string(),
        })
    }
}

/// Opportunity category. Always exactly one of three values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Attachment,
    Internship,
    Job,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::Attachment, Category::Internship, Category::Job];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Attachment => "attachment",
            Category::Internship => "internship",
            Category::Job => "job",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Category {
    type Err = String;

    /// Accepts the bare token only, after trimming and lower-casing.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "attachment" => Ok(Category::Attachment),
            "internship" => Ok(Category::Internship),
            "job" => Ok(Category::Job),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

/// Lifecycle status of a stored opportunity.
///
/// The ingestion pipeline only ever writes `Active`; the other states are
/// set by whoever curates the store afterwards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordStatus {
    #[default]
    Active,
    Expired,
    Filled,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordStatus::Active => "active",
            RecordStatus::Expired => "expired",
            RecordStatus::Filled => "filled",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for RecordStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(RecordStatus::Active),
            "expired" => Ok(RecordStatus::Expired),
            "filled" => Ok(RecordStatus::Filled),
            _ => Err(format!("Unknown record status: {}", s)),
        }
    }
}

/// A raw record with a validated category assigned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategorizedRecord {
    #[serde(flatten)]
    pub record: RawRecord,
    #[serde(rename = "type")]
    pub category: Category,
    pub status: RecordStatus,
}

impl CategorizedRecord {
    /// Promote a raw record. Status always starts as `active`.
    pub fn new(record: RawRecord, category: Category) -> Self {
        Self {
            record,
            category,
            status: RecordStatus::Active,
        }
    }

    pub fn source_url(&self) -> &str {
        &self.record.source_url
    }

    pub fn title(&self) -> &str {
        &self.record.title
    }
}

/// An opportunity as read back from the store.
#[derive(Debug, Clone, Serialize)]
pub struct StoredOpportunity {
    pub id: Uuid,
    #[serde(flatten)]
    pub record: CategorizedRecord,
    pub scraped_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Records one source produced during a run.
#[derive(Debug, Clone, Default)]
pub struct SourceBatch {
    pub platform: String,
    pub records: Vec<RawRecord>,
}

/// Per-run result set: records per source, in configured scraper order,
/// plus the error message for every source that failed.
#[derive(Debug, Clone, Default)]
pub struct CollectionReport {
    pub batches: Vec<SourceBatch>,
    pub errors: std::collections::BTreeMap<String, String>,
}

impl CollectionReport {
    /// Records for one platform, `None` if the platform was not configured.
    pub fn records_for(&self, platform: &str) -> Option<&[RawRecord]> {
        self.batches
            .iter()
            .find(|b| b.platform == platform)
            .map(|b| b.records.as_slice())
    }

    pub fn total_records(&self) -> usize {
        self.batches.iter().map(|b| b.records.len()).sum()
    }

    /// Iterate all records source by source.
    pub fn into_records(self) -> impl Iterator<Item = RawRecord> {
        self.batches.into_iter().flat_map(|b| b.records)
    }
}

/// Outcome of persisting one record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PersistOutcome {
    /// Inserted; carries the store-assigned id.
    Saved(Uuid),
    /// A record with the same `source_url` already exists.
    Skipped,
    /// The store failed for this record.
    Failed(String),
    /// Dry-run mode; the store was not consulted.
    DryRun,
}

/// Aggregate counts for a persisted batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PersistSummary {
    pub saved: usize,
    pub skipped: usize,
    pub errors: usize,
    /// True when the batch went through the gateway in dry-run mode.
    pub dry_run: bool,
}

impl PersistSummary {
    pub fn record(&mut self, outcome: &PersistOutcome) {
        match outcome {
            PersistOutcome::Saved(_) => self.saved += 1,
            PersistOutcome::Skipped => self.skipped += 1,
            PersistOutcome::Failed(_) => self.errors += 1,
            PersistOutcome::DryRun => {}
        }
    }
}

/// Per-category tally of a classified batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub attachment: usize,
    pub internship: usize,
    pub job: usize,
}

impl CategoryCounts {
    pub fn tally(records: &[CategorizedRecord]) -> Self {
        let mut counts = Self::default();
        for r in records {
            match r.category {
                Category::Attachment => counts.attachment += 1,
                Category::Internship => counts.internship += 1,
                Category::Job => counts.job += 1,
            }
        }
        counts
    }
}

/// Summary of one full ingestion run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    #[serde(with = "duration_secs")]
    pub elapsed: Duration,
    /// `(platform, records collected)` in configured scraper order.
    pub collected: Vec<(String, usize)>,
    pub source_errors: std::collections::BTreeMap<String, String>,
    pub unique: usize,
    pub categories: CategoryCounts,
    pub persisted: PersistSummary,
}

mod duration_secs {
    use std::time::Duration;

    pub fn serialize<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_f64(d.as_secs_f64())
    }
}
