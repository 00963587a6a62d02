pub mod classify;
pub mod collector;
pub mod dedup;
pub mod error;
pub mod models;
pub mod persist;
pub mod pipeline;
pub mod traits;

#[cfg(any(test, feature = "testutil"))]
pub mod testutil;

pub use classify::{Classification, ClassificationPath, Classifier, FallbackReason};
pub use collector::{Collector, CollectorConfig};
pub use dedup::deduplicate;
pub use error::AppError;
pub use models::{
    CategorizedRecord, Category, CollectionReport, PersistOutcome, PersistSummary, RawRecord,
    RecordStatus, RunReport, StoredOpportunity,
};
pub use persist::PersistenceGateway;
pub use pipeline::{
    IngestionPipeline, PipelineEvent, PipelineReporter, RunOutput, TracingReporter,
};
pub use traits::{
    ClassificationOracle, Cleaner, Extractor, Fetcher, NullStore, OpportunityStore, OracleRequest,
    SourceScraper,
};
