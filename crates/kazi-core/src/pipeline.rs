use std::time::Instant;

use chrono::Utc;
use tokio_util::sync::CancellationToken;

use crate::classify::Classifier;
use crate::collector::Collector;
use crate::dedup::deduplicate;
use crate::models::{CategorizedRecord, CategoryCounts, PersistSummary, RunReport};
use crate::persist::PersistenceGateway;
use crate::traits::{ClassificationOracle, OpportunityStore, SourceScraper};

/// Events emitted by the pipeline for monitoring/logging.
#[derive(Debug, Clone)]
pub enum PipelineEvent<'a> {
    Started {
        platforms: &'a [&'a str],
        max_pages: u32,
    },
    SourceCollected {
        platform: &'a str,
        count: usize,
    },
    SourceFailed {
        platform: &'a str,
        error: &'a str,
    },
    Deduplicated {
        collected: usize,
        unique: usize,
    },
    Classified {
        counts: CategoryCounts,
    },
    Persisted {
        summary: PersistSummary,
    },
    Finished {
        report: &'a RunReport,
    },
}

/// Trait for receiving pipeline events (decoupled logging).
pub trait PipelineReporter: Send + Sync {
    fn report(&self, event: PipelineEvent<'_>) {
        let _ = event;
    }
}

/// Reporter that uses the `tracing` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl PipelineReporter for TracingReporter {
    fn report(&self, event: PipelineEvent<'_>) {
        match event {
            PipelineEvent::Started {
                platforms,
                max_pages,
            } => {
                tracing::info!(?platforms, %max_pages, "Starting ingestion run");
            }
            PipelineEvent::SourceCollected { platform, count } => {
                tracing::info!(%platform, %count, "Source done");
            }
            PipelineEvent::SourceFailed { platform, error } => {
                tracing::warn!(%platform, %error, "Source contributed no records");
            }
            PipelineEvent::Deduplicated { collected, unique } => {
                tracing::info!(%collected, %unique, "Deduplicated by URL");
            }
            PipelineEvent::Classified { counts } => {
                tracing::info!(
                    attachments = counts.attachment,
                    internships = counts.internship,
                    jobs = counts.job,
                    "Categorized opportunities"
                );
            }
            PipelineEvent::Persisted { summary } => {
                tracing::info!(
                    saved = summary.saved,
                    skipped = summary.skipped,
                    errors = summary.errors,
                    dry_run = summary.dry_run,
                    "Persisted opportunities"
                );
            }
            PipelineEvent::Finished { report } => {
                tracing::info!(
                    elapsed_secs = %format!("{:.2}", report.elapsed.as_secs_f64()),
                    unique = report.unique,
                    "Ingestion run complete"
                );
            }
        }
    }
}

/// Result of a run, including the categorized records themselves.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub report: RunReport,
    pub records: Vec<CategorizedRecord>,
}

/// Orchestrates one ingestion run: collect → deduplicate → classify → persist.
///
/// Generic over all external capabilities via traits, so tests substitute
/// mocks for the scrapers, the oracle and the store.
pub struct IngestionPipeline<S, O, St>
where
    S: SourceScraper,
    O: ClassificationOracle,
    St: OpportunityStore,
{
    collector: Collector<S>,
    classifier: Classifier<O>,
    gateway: PersistenceGateway<St>,
}

impl<S, O, St> IngestionPipeline<S, O, St>
where
    S: SourceScraper,
    O: ClassificationOracle,
    St: OpportunityStore,
{
    pub fn new(
        collector: Collector<S>,
        classifier: Classifier<O>,
        gateway: PersistenceGateway<St>,
    ) -> Self {
        Self {
            collector,
            classifier,
            gateway,
        }
    }

    /// Run all four stages. Source, oracle and store failures are absorbed
    /// along the way, so a run always produces a report.
    pub async fn run<R: PipelineReporter>(
        &self,
        max_pages: u32,
        cancel: &CancellationToken,
        reporter: &R,
    ) -> RunOutput {
        let started_at = Utc::now();
        let start = Instant::now();

        let platforms = self.collector.platforms();
        reporter.report(PipelineEvent::Started {
            platforms: &platforms,
            max_pages,
        });

        // 1. Collect
        let collection = self.collector.collect(max_pages, cancel).await;
        for batch in &collection.batches {
            match collection.errors.get(&batch.platform) {
                Some(error) => reporter.report(PipelineEvent::SourceFailed {
                    platform: &batch.platform,
                    error,
                }),
                None => reporter.report(PipelineEvent::SourceCollected {
                    platform: &batch.platform,
                    count: batch.records.len(),
                }),
            }
        }
        let collected: Vec<(String, usize)> = collection
            .batches
            .iter()
            .map(|b| (b.platform.clone(), b.records.len()))
            .collect();
        let total = collection.total_records();
        let source_errors = collection.errors.clone();

        // 2. Deduplicate
        let unique = deduplicate(collection.into_records());
        reporter.report(PipelineEvent::Deduplicated {
            collected: total,
            unique: unique.len(),
        });
        let unique_count = unique.len();

        // 3. Classify
        let records = self.classifier.classify_all(unique).await;
        let categories = CategoryCounts::tally(&records);
        reporter.report(PipelineEvent::Classified { counts: categories });

        // 4. Persist
        let persisted = self.gateway.persist_all(&records).await;
        reporter.report(PipelineEvent::Persisted { summary: persisted });

        let report = RunReport {
            started_at,
            elapsed: start.elapsed(),
            collected,
            source_errors,
            unique: unique_count,
            categories,
            persisted,
        };
        reporter.report(PipelineEvent::Finished { report: &report });

        RunOutput { report, records }
    }
}
