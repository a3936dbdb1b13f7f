//! Link discovery
//!
//! Discoverer workers walk the search terms page by page and turn result
//! pages into detail addresses. Every accepted address goes to the scrape
//! queue; the first `archive_cap` of them also go to the archive queue.
//!
//! # Per-term flow
//!
//! 1. Fetch page 1; skip the term if that fails
//! 2. Read the total page count from page 1
//! 3. For pages 1..=total (page 1 is not fetched twice):
//!    - extract detail links; stop the term on an empty page
//!    - accept new addresses until the job target is reached
//!    - pause for the rate limit
//! 4. A failed page fetch ends the term early

use crate::crawler::fetcher::Fetcher;
use crate::crawler::parser::{extract_detail_links, total_pages};
use crate::crawler::scheduler::{RateLimit, SearchPlan};
use crate::state::{DeduplicationIndex, Discovering};
use crate::url::ListingAddress;
use crate::TrawlError;
use scraper::Selector;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedSender;
use url::Url;

/// Outcome of offering one address to the discovery ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Admission {
    Accepted,
    Duplicate,
    TargetReached,
}

/// How a term walk ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TermOutcome {
    Exhausted,
    TargetReached,
}

/// Counters guarded by the discovery lock
#[derive(Debug, Default)]
struct Ledger {
    accepted: usize,
    archived: usize,
}

/// Totals of a finished discovery phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiscoveryReport {
    /// Addresses sent to the scrape queue
    pub accepted: usize,
    /// Addresses sent to the archive queue
    pub archived: usize,
}

/// Producer ends of the two queues discovery feeds
#[derive(Debug, Clone)]
pub struct DiscoveryQueues {
    pub scrape: UnboundedSender<ListingAddress>,
    pub archive: UnboundedSender<ListingAddress>,
}

/// Shared state of the discoverer pool
pub struct LinkDiscoverer {
    fetcher: Arc<Fetcher>,
    plan: SearchPlan,
    base: Url,
    selector: Selector,
    rate_limit: RateLimit,
    target_jobs: usize,
    archive_cap: usize,
    seen: DeduplicationIndex,
    ledger: Mutex<Ledger>,
    progress: Discovering,
    queues: DiscoveryQueues,
}

impl LinkDiscoverer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        fetcher: Arc<Fetcher>,
        plan: SearchPlan,
        base: Url,
        selector: Selector,
        rate_limit: RateLimit,
        target_jobs: usize,
        archive_cap: usize,
        progress: Discovering,
        queues: DiscoveryQueues,
    ) -> Self {
        Self {
            fetcher,
            plan,
            base,
            selector,
            rate_limit,
            target_jobs,
            archive_cap,
            seen: DeduplicationIndex::new(),
            ledger: Mutex::new(Ledger::default()),
            progress,
            queues,
        }
    }

    /// Runs `workers` discoverer tasks to completion
    ///
    /// Every worker walks the full term list. When this returns, all queue
    /// senders held by the discoverer have been dropped.
    pub async fn run(self, workers: usize) -> Result<DiscoveryReport, TrawlError> {
        let shared = Arc::new(self);

        let handles: Vec<_> = (1..=workers.max(1))
            .map(|worker| {
                let discoverer = Arc::clone(&shared);
                tokio::spawn(async move { discoverer.walk_terms(worker).await })
            })
            .collect();

        for handle in handles {
            handle.await?;
        }

        let ledger = shared.ledger.lock().unwrap_or_else(PoisonError::into_inner);
        let report = DiscoveryReport {
            accepted: ledger.accepted,
            archived: ledger.archived,
        };
        tracing::info!(
            "Discovery finished: {} addresses queued, {} queued for archiving",
            report.accepted,
            report.archived
        );
        Ok(report)
    }

    fn target_reached(&self) -> bool {
        self.ledger
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .accepted
            >= self.target_jobs
    }

    async fn walk_terms(&self, worker: usize) {
        for term in self.plan.terms() {
            if self.target_reached() {
                break;
            }
            if self.walk_term(term).await == TermOutcome::TargetReached {
                break;
            }
        }
        tracing::debug!("Discoverer {} finished", worker);
    }

    /// Pages through one term
    async fn walk_term(&self, term: &str) -> TermOutcome {
        let Some(first_page) = self.fetcher.fetch(&self.plan.page_url(term, 1)).await else {
            tracing::warn!("Failed to fetch first page for '{}', skipping", term);
            return TermOutcome::Exhausted;
        };

        let total = total_pages(&first_page);
        tracing::info!("Fetching {} pages for '{}'", total, term);

        let mut reused = Some(first_page);
        for page in 1..=total {
            if self.target_reached() {
                return TermOutcome::TargetReached;
            }

            let body = match reused.take() {
                Some(body) => body,
                None => match self.fetcher.fetch(&self.plan.page_url(term, page)).await {
                    Some(body) => body,
                    None => {
                        tracing::warn!("Failed to fetch page {} for '{}', moving on", page, term);
                        break;
                    }
                },
            };

            let links = extract_detail_links(&body, &self.selector, &self.base);
            tracing::debug!("Extracted {} job links from page {} for '{}'", links.len(), page, term);
            if links.is_empty() {
                tracing::warn!("No jobs found on page {} for '{}', moving to next term", page, term);
                break;
            }

            for address in links {
                if self.admit(address) == Admission::TargetReached {
                    return TermOutcome::TargetReached;
                }
            }

            self.rate_limit.pause().await;
        }

        TermOutcome::Exhausted
    }

    /// Target check, dedup and enqueue as one step under the ledger lock
    fn admit(&self, address: ListingAddress) -> Admission {
        let mut ledger = self.ledger.lock().unwrap_or_else(PoisonError::into_inner);

        if ledger.accepted >= self.target_jobs {
            return Admission::TargetReached;
        }
        if !self.seen.insert(address.as_str()) {
            return Admission::Duplicate;
        }

        if ledger.archived < self.archive_cap {
            if self.queues.archive.send(address.clone()).is_ok() {
                ledger.archived += 1;
            } else {
                tracing::warn!("Archive queue closed, not archiving {}", address);
            }
        }

        if self.queues.scrape.send(address).is_err() {
            tracing::error!("Scrape queue closed during discovery");
            return Admission::TargetReached;
        }

        ledger.accepted += 1;
        self.progress.update_fetch();
        Admission::Accepted
    }
}
