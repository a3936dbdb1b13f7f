//! Cross-stage progress model
//!
//! Counters are bounded atomics. Which counter may move is decided by the
//! current phase, and each phase is a handle type that can only be obtained
//! by finishing the previous one:
//!
//! ```text
//! Discovering --finish--> Scraping --finish--> Archiving --finish--> Done
//! ```
//!
//! `update_scrape` exists only on [`Scraping`], so scraping progress cannot be
//! reported before discovery has completed.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Pipeline phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Phase {
    Discovering,
    Scraping,
    Archiving,
    Done,
}

impl Phase {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Discovering,
            1 => Self::Scraping,
            2 => Self::Archiving,
            _ => Self::Done,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            Self::Discovering => 0,
            Self::Scraping => 1,
            Self::Archiving => 2,
            Self::Done => 3,
        }
    }
}

#[derive(Debug)]
struct ProgressInner {
    target_jobs: usize,
    archive_cap: usize,
    fetched: AtomicUsize,
    scraped: AtomicUsize,
    downloaded: AtomicUsize,
    fetching_done: AtomicBool,
    scraping_done: AtomicBool,
    downloading_done: AtomicBool,
    phase: AtomicU8,
    started: Instant,
}

impl ProgressInner {
    fn in_phase(&self, phase: Phase) -> bool {
        Phase::from_u8(self.phase.load(Ordering::Acquire)) == phase
    }

    fn advance(&self, to: Phase) {
        self.phase.store(to.as_u8(), Ordering::Release);
    }
}

/// Increments `counter` unless it already reached `ceiling`
fn bounded_increment(counter: &AtomicUsize, ceiling: usize) -> bool {
    counter
        .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
            (current < ceiling).then_some(current + 1)
        })
        .is_ok()
}

/// Read-only view of the pipeline's progress
///
/// Cheap to clone; every clone observes the same counters.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    inner: Arc<ProgressInner>,
}

impl ProgressTracker {
    /// Creates a tracker in the discovery phase
    ///
    /// Returns the read-only tracker together with the handle that reports
    /// discovery progress.
    pub fn start(target_jobs: usize, archive_cap: usize) -> (Self, Discovering) {
        let inner = Arc::new(ProgressInner {
            target_jobs,
            archive_cap,
            fetched: AtomicUsize::new(0),
            scraped: AtomicUsize::new(0),
            downloaded: AtomicUsize::new(0),
            fetching_done: AtomicBool::new(false),
            scraping_done: AtomicBool::new(false),
            downloading_done: AtomicBool::new(false),
            phase: AtomicU8::new(Phase::Discovering.as_u8()),
            started: Instant::now(),
        });

        (
            Self {
                inner: Arc::clone(&inner),
            },
            Discovering { inner },
        )
    }

    pub fn phase(&self) -> Phase {
        Phase::from_u8(self.inner.phase.load(Ordering::Acquire))
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let inner = &self.inner;
        ProgressSnapshot {
            fetched: inner.fetched.load(Ordering::Acquire),
            scraped: inner.scraped.load(Ordering::Acquire),
            downloaded: inner.downloaded.load(Ordering::Acquire),
            target_jobs: inner.target_jobs,
            archive_cap: inner.archive_cap,
            fetching_done: inner.fetching_done.load(Ordering::Acquire),
            scraping_done: inner.scraping_done.load(Ordering::Acquire),
            downloading_done: inner.downloading_done.load(Ordering::Acquire),
            elapsed: inner.started.elapsed(),
        }
    }

    /// Polls the completion flags until all phases are done
    ///
    /// Gives up after `retries` polls, logging which phases are still
    /// outstanding on every poll. Returns whether completion was observed.
    pub async fn await_completion(&self, retries: u32, poll: Duration) -> bool {
        for attempt in 0..=retries {
            let snapshot = self.snapshot();
            if snapshot.is_complete() {
                return true;
            }
            if attempt == retries {
                break;
            }

            tracing::info!(
                "Still waiting: fetch={}, scrape={}, download={}",
                snapshot.fetching_done,
                snapshot.scraping_done,
                snapshot.downloading_done
            );
            tokio::time::sleep(poll).await;
        }

        tracing::warn!("Gave up waiting for pipeline completion after {} polls", retries);
        false
    }
}

/// Discovery phase handle
#[derive(Debug, Clone)]
pub struct Discovering {
    inner: Arc<ProgressInner>,
}

impl Discovering {
    /// Counts one accepted detail address, saturating at the job target
    pub fn update_fetch(&self) -> bool {
        self.inner.in_phase(Phase::Discovering)
            && bounded_increment(&self.inner.fetched, self.inner.target_jobs)
    }

    /// Closes discovery and opens the scraping phase
    pub fn finish(self) -> Scraping {
        self.inner.fetching_done.store(true, Ordering::Release);
        self.inner.advance(Phase::Scraping);
        Scraping { inner: self.inner }
    }
}

/// Scraping phase handle
#[derive(Debug, Clone)]
pub struct Scraping {
    inner: Arc<ProgressInner>,
}

impl Scraping {
    /// Counts one produced record, saturating at the fetched count
    pub fn update_scrape(&self) -> bool {
        let ceiling = self
            .inner
            .fetched
            .load(Ordering::Acquire)
            .min(self.inner.target_jobs);
        self.inner.in_phase(Phase::Scraping) && bounded_increment(&self.inner.scraped, ceiling)
    }

    /// Closes scraping and opens the archiving phase
    pub fn finish(self) -> Archiving {
        self.inner.scraping_done.store(true, Ordering::Release);
        self.inner.advance(Phase::Archiving);
        Archiving { inner: self.inner }
    }
}

/// Archiving phase handle
#[derive(Debug, Clone)]
pub struct Archiving {
    inner: Arc<ProgressInner>,
}

impl Archiving {
    /// Counts one archived raw page, saturating at the archive cap
    pub fn update_download(&self) -> bool {
        self.inner.in_phase(Phase::Archiving)
            && bounded_increment(&self.inner.downloaded, self.inner.archive_cap)
    }

    /// Closes archiving; the pipeline is done
    pub fn finish(self) {
        self.inner.downloading_done.store(true, Ordering::Release);
        self.inner.advance(Phase::Done);
    }
}

/// Point-in-time copy of the progress counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressSnapshot {
    pub fetched: usize,
    pub scraped: usize,
    pub downloaded: usize,
    pub target_jobs: usize,
    pub archive_cap: usize,
    pub fetching_done: bool,
    pub scraping_done: bool,
    pub downloading_done: bool,
    pub elapsed: Duration,
}

impl ProgressSnapshot {
    pub fn is_complete(&self) -> bool {
        self.fetching_done && self.scraping_done && self.downloading_done
    }

    /// Status line with an elapsed-time prefix, as rendered live
    pub fn status_line(&self) -> String {
        let secs = self.elapsed.as_secs();
        format!("[Time: {:02}:{:02}] {}", secs / 60, secs % 60, self)
    }
}

impl fmt::Display for ProgressSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Fetched: {}/{} | Scraped: {}/{} | Downloaded: {}/{}",
            self.fetched,
            self.target_jobs,
            self.scraped,
            self.target_jobs,
            self.downloaded,
            self.archive_cap
        )
    }
}
