//! Batch persister
//!
//! A single background task drains the save queue, drops records whose
//! address was already persisted, and flushes batches to every sink.
//!
//! # Flush triggers
//!
//! | Condition | Action |
//! |-----------|--------|
//! | Buffer reaches the batch size | Flush |
//! | Queue idle for the idle timeout, buffer non-empty | Flush, keep running |
//! | Queue closed (every sender dropped) | Flush the remainder, exit |
//!
//! Sinks are written independently. A failing sink is logged and skipped for
//! that batch; the other sinks still receive it.

use crate::state::DeduplicationIndex;
use crate::storage::traits::Sink;
use crate::storage::JobRecord;
use crate::TrawlError;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Producer side of the save queue
#[derive(Debug, Clone)]
pub struct SaveQueue {
    tx: mpsc::UnboundedSender<JobRecord>,
}

impl SaveQueue {
    /// Queues one record. Returns `false` if the persister has stopped.
    pub fn submit(&self, record: JobRecord) -> bool {
        self.tx.send(record).is_ok()
    }

    /// Queues a batch of records, returning how many were accepted
    pub fn submit_batch<I>(&self, records: I) -> usize
    where
        I: IntoIterator<Item = JobRecord>,
    {
        records
            .into_iter()
            .take_while(|record| self.submit(record.clone()))
            .count()
    }
}

/// Per-sink outcome counters
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SinkTally {
    pub written: usize,
    pub failed_batches: usize,
}

/// What the persister did over its lifetime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistReport {
    /// Records accepted into a batch
    pub accepted: usize,
    /// Records dropped because their address was already persisted
    pub duplicates: usize,
    /// Batches flushed
    pub batches: usize,
    pub sinks: BTreeMap<String, SinkTally>,
}

/// Consumer of the save queue
pub struct BatchPersister {
    sinks: Vec<Box<dyn Sink>>,
    identities: DeduplicationIndex,
    batch_size: usize,
    idle_flush: Duration,
}

impl BatchPersister {
    pub fn new(sinks: Vec<Box<dyn Sink>>, batch_size: usize, idle_flush: Duration) -> Self {
        Self {
            sinks,
            identities: DeduplicationIndex::new(),
            batch_size: batch_size.max(1),
            idle_flush,
        }
    }

    /// Seeds the identity index with keys the sinks already hold
    ///
    /// A sink that cannot list its keys is logged and ignored.
    pub fn seed_known_keys(self) -> Self {
        let mut keys = Vec::new();
        for sink in &self.sinks {
            match sink.known_keys() {
                Ok(found) => keys.extend(found),
                Err(e) => tracing::warn!("Could not read known keys from {}: {}", sink.name(), e),
            }
        }

        if !keys.is_empty() {
            tracing::info!("Skipping {} listings persisted by earlier runs", keys.len());
        }

        Self {
            identities: DeduplicationIndex::with_keys(keys),
            ..self
        }
    }

    /// Starts the background task
    pub fn spawn(self) -> PersisterHandle {
        let (tx, rx) = mpsc::unbounded_channel();
        let task = tokio::spawn(self.run(rx));
        PersisterHandle {
            queue: SaveQueue { tx },
            task,
        }
    }

    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<JobRecord>) -> PersistReport {
        let mut report = PersistReport::default();
        for sink in &self.sinks {
            report.sinks.insert(sink.name().to_string(), SinkTally::default());
        }

        let mut buffer: Vec<JobRecord> = Vec::with_capacity(self.batch_size);

        loop {
            match tokio::time::timeout(self.idle_flush, rx.recv()).await {
                Ok(Some(record)) => {
                    if !self.identities.insert(record.address.as_str()) {
                        tracing::warn!("Duplicate job skipped: {}", record.address);
                        report.duplicates += 1;
                        continue;
                    }

                    buffer.push(record);
                    if buffer.len() >= self.batch_size {
                        self.flush(&mut buffer, &mut report);
                    }
                }
                Ok(None) => {
                    if !buffer.is_empty() {
                        self.flush(&mut buffer, &mut report);
                        tracing::info!("Final batch saved after save queue closed");
                    }
                    break;
                }
                Err(_) => {
                    if !buffer.is_empty() {
                        tracing::debug!("Save queue idle, flushing {} buffered jobs", buffer.len());
                        self.flush(&mut buffer, &mut report);
                    }
                }
            }
        }

        report
    }

    fn flush(&mut self, buffer: &mut Vec<JobRecord>, report: &mut PersistReport) {
        for sink in self.sinks.iter_mut() {
            let tally = report.sinks.entry(sink.name().to_string()).or_default();
            match sink.append_batch(buffer) {
                Ok(()) => tally.written += buffer.len(),
                Err(e) => {
                    tracing::error!("Error saving {} jobs to {}: {}", buffer.len(), sink.name(), e);
                    tally.failed_batches += 1;
                }
            }
        }

        report.accepted += buffer.len();
        report.batches += 1;
        buffer.clear();
    }
}

/// Running persister
pub struct PersisterHandle {
    queue: SaveQueue,
    task: JoinHandle<PersistReport>,
}

impl PersisterHandle {
    /// A producer handle for the save queue
    pub fn queue(&self) -> SaveQueue {
        self.queue.clone()
    }

    /// Closes this handle's side of the queue and waits for the final flush
    ///
    /// Every other `SaveQueue` clone must be dropped first, otherwise the
    /// queue never closes.
    pub async fn finish(self) -> Result<PersistReport, TrawlError> {
        drop(self.queue);
        Ok(self.task.await?)
    }
}
