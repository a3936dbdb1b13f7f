//! Detail scraper pool
//!
//! Workers share one receiver of the scrape queue. Each dequeued address is
//! fetched once, run through the extractor and turned into a [`JobRecord`]
//! with the next sequential id. Records are kept in the completed buffer,
//! forwarded to the save queue and counted on the progress tracker.

use crate::crawler::extract::Extractor;
use crate::crawler::fetcher::Fetcher;
use crate::state::{DeduplicationIndex, Scraping};
use crate::storage::{JobRecord, SaveQueue};
use crate::url::ListingAddress;
use crate::TrawlError;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedReceiver;

/// Records produced so far, in id order
#[derive(Debug, Default)]
struct CompletedRecords {
    next_id: u64,
    records: Vec<JobRecord>,
}

/// Totals of a finished scraping phase
#[derive(Debug, Clone, Default)]
pub struct ScrapeReport {
    /// Completed records, ids `1..=records.len()`
    pub records: Vec<JobRecord>,
    /// Addresses whose page could not be fetched
    pub failed: usize,
    /// Addresses dequeued more than once
    pub duplicates: usize,
}

/// Shared state of the scraper pool
pub struct ScraperPool {
    fetcher: Arc<Fetcher>,
    extractor: Arc<dyn Extractor>,
    queue: tokio::sync::Mutex<UnboundedReceiver<ListingAddress>>,
    seen: DeduplicationIndex,
    completed: Mutex<CompletedRecords>,
    failed: AtomicUsize,
    duplicates: AtomicUsize,
    progress: Scraping,
    save_queue: SaveQueue,
}

impl ScraperPool {
    pub fn new(
        fetcher: Arc<Fetcher>,
        extractor: Arc<dyn Extractor>,
        queue: UnboundedReceiver<ListingAddress>,
        progress: Scraping,
        save_queue: SaveQueue,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            queue: tokio::sync::Mutex::new(queue),
            seen: DeduplicationIndex::new(),
            completed: Mutex::new(CompletedRecords::default()),
            failed: AtomicUsize::new(0),
            duplicates: AtomicUsize::new(0),
            progress,
            save_queue,
        }
    }

    /// Runs `workers` scraper tasks until the scrape queue is closed and drained
    ///
    /// The pool's save queue handle is dropped when this returns.
    pub async fn run(self, workers: usize) -> Result<ScrapeReport, TrawlError> {
        let shared = Arc::new(self);

        let handles: Vec<_> = (1..=workers.max(1))
            .map(|worker| {
                let pool = Arc::clone(&shared);
                tokio::spawn(async move { pool.work(worker).await })
            })
            .collect();

        for handle in handles {
            handle.await?;
        }

        let records = std::mem::take(
            &mut shared
                .completed
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .records,
        );
        let report = ScrapeReport {
            records,
            failed: shared.failed.load(Ordering::Acquire),
            duplicates: shared.duplicates.load(Ordering::Acquire),
        };

        tracing::info!(
            "Scraping finished: {} records, {} failed, {} duplicates",
            report.records.len(),
            report.failed,
            report.duplicates
        );
        Ok(report)
    }

    async fn work(&self, worker: usize) {
        loop {
            let next = self.queue.lock().await.recv().await;
            let Some(address) = next else {
                break;
            };
            self.scrape(address).await;
        }
        tracing::debug!("Scraper {} finished", worker);
    }

    async fn scrape(&self, address: ListingAddress) {
        if !self.seen.insert(address.as_str()) {
            tracing::warn!("Skipping already scraped job: {}", address);
            self.duplicates.fetch_add(1, Ordering::AcqRel);
            return;
        }

        let Some(html) = self.fetcher.fetch(address.as_str()).await else {
            tracing::warn!("Failed to scrape {}", address);
            self.failed.fetch_add(1, Ordering::AcqRel);
            return;
        };

        let fields = self.extractor.extract(&html);

        let mut completed = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        completed.next_id += 1;
        let record = fields.into_record(completed.next_id, address);
        tracing::debug!("Scraped job {}: {}", record.id, record.title);

        if !self.save_queue.submit(record.clone()) {
            tracing::error!("Save queue closed, job {} not persisted", record.id);
        }
        completed.records.push(record);
        self.progress.update_scrape();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{FetchConfig, FieldLabels};
    use crate::crawler::extract::LabelExtractor;
    use crate::state::ProgressTracker;
    use crate::storage::BatchPersister;
    use std::time::Duration;
    use tokio::sync::mpsc::unbounded_channel;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn detail_page(title: &str) -> String {
        format!(
            "<html><head><title>{} - Job Offer</title></head>\
             <body><span>Workload:</span><span>100%</span></body></html>",
            title
        )
    }

    fn address(server: &MockServer, n: u32) -> ListingAddress {
        let base = url::Url::parse(&server.uri()).unwrap();
        crate::url::canonicalize(&format!("/detail/{}", n), &base).unwrap()
    }

    async fn run_pool(
        addresses: Vec<ListingAddress>,
        workers: usize,
    ) -> (ScrapeReport, ProgressTracker, crate::storage::PersistReport) {
        let fetcher = Fetcher::new(&FetchConfig {
            max_retries: 2,
            backoff_base_ms: 1,
            ..FetchConfig::default()
        })
        .unwrap();
        let extractor = LabelExtractor::new(FieldLabels::default(), " - Job Offer").unwrap();

        let (tracker, discovering) = ProgressTracker::start(10, 10);
        for _ in &addresses {
            discovering.update_fetch();
        }
        let scraping = discovering.finish();

        let (tx, rx) = unbounded_channel();
        for a in addresses {
            tx.send(a).unwrap();
        }
        drop(tx);

        let persister = BatchPersister::new(Vec::new(), 10, Duration::from_secs(60)).spawn();
        let pool = ScraperPool::new(
            Arc::new(fetcher),
            Arc::new(extractor),
            rx,
            scraping,
            persister.queue(),
        );
        let report = pool.run(workers).await.unwrap();
        let persisted = persister.finish().await.unwrap();
        (report, tracker, persisted)
    }

    #[tokio::test]
    async fn test_records_get_sequential_ids() {
        let server = MockServer::start().await;
        for n in 1..=4 {
            Mock::given(method("GET"))
                .and(path(format!("/detail/{}", n)))
                .respond_with(
                    ResponseTemplate::new(200).set_body_string(detail_page(&format!("Job {}", n))),
                )
                .mount(&server)
                .await;
        }

        let addresses = (1..=4).map(|n| address(&server, n)).collect();
        let (report, tracker, persisted) = run_pool(addresses, 3).await;

        let mut ids: Vec<u64> = report.records.iter().map(|r| r.id).collect();
        ids.sort();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(report.records[0].workload, "100%");
        assert_eq!(tracker.snapshot().scraped, 4);
        assert_eq!(persisted.accepted, 4);
    }

    #[tokio::test]
    async fn test_failed_fetch_produces_no_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/detail/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_page("Good")))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/detail/2"))
            .respond_with(ResponseTemplate::new(500))
            .expect(2)
            .mount(&server)
            .await;

        let addresses = vec![address(&server, 1), address(&server, 2)];
        let (report, tracker, _) = run_pool(addresses, 2).await;

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.records[0].title, "Good");
        assert_eq!(report.failed, 1);
        assert_eq!(tracker.snapshot().scraped, 1);
    }

    #[tokio::test]
    async fn test_repeated_address_scraped_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/detail/1"))
            .respond_with(ResponseTemplate::new(200).set_body_string(detail_page("Once")))
            .expect(1)
            .mount(&server)
            .await;

        let addresses = vec![address(&server, 1), address(&server, 1)];
        let (report, _, persisted) = run_pool(addresses, 1).await;

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.duplicates, 1);
        assert_eq!(persisted.accepted, 1);
    }
}
