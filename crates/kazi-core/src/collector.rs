//! Concurrent fan-out over all configured source scrapers.
//!
//! Every scraper is launched at once and joined together. A source that
//! errors, panics, exceeds its deadline or is cancelled contributes an empty
//! batch and an entry in [`CollectionReport::errors`]; it never fails the
//! collection as a whole. No retries happen here.

use std::panic::AssertUnwindSafe;
use std::time::Duration;

use futures::FutureExt;
use futures::future::join_all;
use tokio_util::sync::CancellationToken;

use crate::error::AppError;
use crate::models::{CollectionReport, RawRecord, SourceBatch};
use crate::traits::SourceScraper;

const DEFAULT_SOURCE_TIMEOUT: Duration = Duration::from_secs(300);

/// Configuration for the collector.
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// Upper bound on a single source's `scrape` call.
    pub source_timeout: Duration,
}

impl CollectorConfig {
    pub fn new(source_timeout: Duration) -> Self {
        Self { source_timeout }
    }
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            source_timeout: DEFAULT_SOURCE_TIMEOUT,
        }
    }
}

/// Runs every source scraper concurrently and isolates their failures.
pub struct Collector<S: SourceScraper> {
    scrapers: Vec<S>,
    config: CollectorConfig,
}

impl<S: SourceScraper> Collector<S> {
    pub fn new(scrapers: Vec<S>) -> Self {
        Self {
            scrapers,
            config: CollectorConfig::default(),
        }
    }

    pub fn with_config(mut self, config: CollectorConfig) -> Self {
        self.config = config;
        self
    }

    /// Configured platforms, in launch order.
    pub fn platforms(&self) -> Vec<&str> {
        self.scrapers.iter().map(|s| s.platform()).collect()
    }

    /// Scrape all sources and wait for every one of them to finish.
    ///
    /// Batches come back in configured scraper order regardless of which
    /// source finished first.
    pub async fn collect(&self, max_pages: u32, cancel: &CancellationToken) -> CollectionReport {
        let tasks = self
            .scrapers
            .iter()
            .map(|scraper| self.run_source(scraper, max_pages, cancel));
        let results = join_all(tasks).await;

        let mut report = CollectionReport::default();
        for (scraper, result) in self.scrapers.iter().zip(results) {
            let platform = scraper.platform().to_string();
            let records = match result {
                Ok(records) => {
                    tracing::info!(%platform, count = records.len(), "Source collected");
                    records
                }
                Err(e) => {
                    tracing::warn!(
                        %platform,
                        error = %e,
                        transport = e.is_transport(),
                        "Source failed, continuing without it"
                    );
                    report.errors.insert(platform.clone(), e.to_string());
                    Vec::new()
                }
            };
            report.batches.push(SourceBatch { platform, records });
        }

        report
    }

    async fn run_source(
        &self,
        scraper: &S,
        max_pages: u32,
        cancel: &CancellationToken,
    ) -> Result<Vec<RawRecord>, AppError> {
        let platform = scraper.platform();
        tracing::debug!(%platform, max_pages, "Launching source");

        let bounded = tokio::time::timeout(
            self.config.source_timeout,
            AssertUnwindSafe(scraper.scrape(max_pages)).catch_unwind(),
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(AppError::Cancelled),
            outcome = bounded => match outcome {
                Ok(Ok(result)) => result,
                Ok(Err(_panic)) => Err(AppError::SourcePanicked(platform.to_string())),
                Err(_elapsed) => Err(AppError::SourceTimeout {
                    platform: platform.to_string(),
                    seconds: self.config.source_timeout.as_secs(),
                }),
            },
        }
    }
}
