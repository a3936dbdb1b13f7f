//! Pipeline orchestration
//!
//! The run is a sequence of barriers. Each phase is joined, and its queue
//! senders dropped, before the next phase starts:
//!
//! ```text
//! discover ──scrape queue──▶ scrape ──save queue──▶ persist
//!     └──────archive queue──────────▶ archive ──▶ compress
//! ```
//!
//! 1. Open the run ledger and the sinks, start the persister
//! 2. Discovery fills the scrape and archive queues, then closes them
//! 3. The scraper pool drains the scrape queue into the save queue
//! 4. The persister flushes the remainder once the save queue closes
//! 5. The archiver pool drains the archive queue, then compression runs
//! 6. The run is closed in the ledger with its final counters

use crate::config::Config;
use crate::crawler::archiver::{compress_archive, ArchiverPool, CompressionOutcome};
use crate::crawler::discoverer::{DiscoveryQueues, DiscoveryReport, LinkDiscoverer};
use crate::crawler::extract::{Extractor, LabelExtractor};
use crate::crawler::fetcher::Fetcher;
use crate::crawler::scheduler::{RateLimit, SearchPlan};
use crate::crawler::scraper::ScraperPool;
use crate::state::{Discovering, ProgressSnapshot, ProgressTracker, StatusRenderer};
use crate::storage::{open_sinks, BatchPersister, PersistReport, RunStatus, SqliteStore};
use crate::{ConfigError, TrawlError};
use scraper::Selector;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::unbounded_channel;
use url::Url;

/// Everything a finished run reports
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: i64,
    pub progress: ProgressSnapshot,
    pub discovery: DiscoveryReport,
    pub scraped: usize,
    pub scrape_failures: usize,
    pub persist: PersistReport,
    pub archived: usize,
    pub compression: CompressionOutcome,
    /// Whether every phase was observed as done
    pub completed: bool,
}

/// A configured pipeline, ready to run
pub struct Pipeline {
    config: Config,
    config_hash: String,
}

impl Pipeline {
    pub fn new(config: Config, config_hash: impl Into<String>) -> Self {
        Self {
            config,
            config_hash: config_hash.into(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Runs every phase once and records the run in the ledger
    ///
    /// The run is marked failed in the ledger when any phase returns an error.
    pub async fn run(&self) -> Result<RunSummary, TrawlError> {
        let output = &self.config.output;
        std::fs::create_dir_all(&output.data_dir)?;

        let mut ledger = SqliteStore::open(&output.database_path())?;
        let run_id = ledger.create_run(&self.config_hash)?;
        tracing::info!("Starting harvest run {}", run_id);

        let (tracker, discovering) = ProgressTracker::start(
            self.config.pipeline.target_jobs,
            self.config.pipeline.archive_cap,
        );

        let status = &self.config.status;
        let renderer = status.live.then(|| {
            StatusRenderer::spawn(tracker.clone(), Duration::from_millis(status.interval_ms))
        });

        let result = self.execute(run_id, &tracker, discovering).await;

        if let Some(renderer) = renderer {
            renderer.stop().await;
        }

        let final_status = match &result {
            Ok(_) => RunStatus::Completed,
            Err(e) => {
                tracing::error!("Harvest run {} failed: {}", run_id, e);
                RunStatus::Failed
            }
        };
        if let Err(e) = ledger.finish_run(run_id, final_status, &tracker.snapshot()) {
            tracing::warn!("Could not close run {} in the ledger: {}", run_id, e);
        }

        result
    }

    async fn execute(
        &self,
        run_id: i64,
        tracker: &ProgressTracker,
        discovering: Discovering,
    ) -> Result<RunSummary, TrawlError> {
        let pipeline = &self.config.pipeline;
        let site = &self.config.site;
        let output = &self.config.output;

        let fetcher = Arc::new(Fetcher::new(&self.config.fetch)?);
        let base = Url::parse(&site.base_url)
            .map_err(|e| ConfigError::InvalidUrl(format!("{}: {}", site.base_url, e)))?;
        let selector = Selector::parse(&site.detail_link_selector).map_err(|e| {
            ConfigError::InvalidSelector(format!("{}: {:?}", site.detail_link_selector, e))
        })?;
        let extractor: Arc<dyn Extractor> = Arc::new(LabelExtractor::new(
            site.labels.clone(),
            site.title_suffix.clone(),
        )?);

        let mut persister = BatchPersister::new(
            open_sinks(output, Some(run_id))?,
            pipeline.batch_size,
            pipeline.idle_flush(),
        );
        if output.skip_known {
            persister = persister.seed_known_keys();
        }
        let persister = persister.spawn();

        // Discovery
        let (scrape_tx, scrape_rx) = unbounded_channel();
        let (archive_tx, archive_rx) = unbounded_channel();
        let discovery = LinkDiscoverer::new(
            Arc::clone(&fetcher),
            SearchPlan::from(site),
            base,
            selector,
            RateLimit::from(&self.config.fetch),
            pipeline.target_jobs,
            pipeline.archive_cap,
            discovering.clone(),
            DiscoveryQueues {
                scrape: scrape_tx,
                archive: archive_tx,
            },
        )
        .run(pipeline.discoverer_workers)
        .await?;
        let scraping = discovering.finish();

        // Scraping and persistence
        let scrape = ScraperPool::new(
            Arc::clone(&fetcher),
            extractor,
            scrape_rx,
            scraping.clone(),
            persister.queue(),
        )
        .run(pipeline.scraper_workers)
        .await?;
        let persist = persister.finish().await?;
        tracing::info!(
            "Persisted {} records in {} batches ({} duplicates skipped)",
            persist.accepted,
            persist.batches,
            persist.duplicates
        );
        let archiving = scraping.finish();

        // Archiving
        let archived = ArchiverPool::new(
            fetcher,
            archive_rx,
            output.html_path(),
            pipeline.archive_cap,
            archiving.clone(),
        )
        .run(pipeline.archiver_workers)
        .await?;
        let compression = compress_archive(
            &output.html_path(),
            &output.archive_path(),
            archived,
            pipeline.archive_cap,
        )?;
        archiving.finish();

        let completed = tracker
            .await_completion(
                self.config.status.completion_retries,
                Duration::from_millis(self.config.status.completion_poll_ms),
            )
            .await;

        Ok(RunSummary {
            run_id,
            progress: tracker.snapshot(),
            discovery,
            scraped: scrape.records.len(),
            scrape_failures: scrape.failed,
            persist,
            archived,
            compression,
            completed,
        })
    }
}

/// Runs one complete pipeline with the given configuration
pub async fn run_pipeline(config: Config, config_hash: &str) -> Result<RunSummary, TrawlError> {
    Pipeline::new(config, config_hash).run().await
}
