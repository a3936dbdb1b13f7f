//! Raw-page archiver
//!
//! Archiver workers drain the archive queue, fetch each page on their own
//! and write it as `listing_<index>.html`. Index assignment, the cap check
//! and the file write happen under one lock, so indexes are dense and never
//! exceed the cap. Once every worker has stopped, [`compress_archive`] packs
//! the saved pages into a single zip file.

use crate::crawler::fetcher::Fetcher;
use crate::state::Archiving;
use crate::url::ListingAddress;
use crate::TrawlError;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::mpsc::UnboundedReceiver;
use zip::write::FileOptions;
use zip::CompressionMethod;

/// File name of the raw page with the given 1-based index
pub fn listing_file_name(index: usize) -> String {
    format!("listing_{}.html", index)
}

/// Result of offering a fetched page to the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stored {
    Saved(usize),
    CapReached,
    Failed,
}

/// Shared state of the archiver pool
pub struct ArchiverPool {
    fetcher: Arc<Fetcher>,
    queue: tokio::sync::Mutex<UnboundedReceiver<ListingAddress>>,
    html_dir: PathBuf,
    archive_cap: usize,
    saved: Mutex<usize>,
    progress: Archiving,
}

impl ArchiverPool {
    pub fn new(
        fetcher: Arc<Fetcher>,
        queue: UnboundedReceiver<ListingAddress>,
        html_dir: PathBuf,
        archive_cap: usize,
        progress: Archiving,
    ) -> Self {
        Self {
            fetcher,
            queue: tokio::sync::Mutex::new(queue),
            html_dir,
            archive_cap,
            saved: Mutex::new(0),
            progress,
        }
    }

    /// Runs `workers` archiver tasks and returns how many pages were saved
    pub async fn run(self, workers: usize) -> Result<usize, TrawlError> {
        std::fs::create_dir_all(&self.html_dir)?;
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

        let saved = shared.saved_count();
        tracing::info!(
            "Archiving finished: {}/{} raw pages saved",
            saved,
            shared.archive_cap
        );
        Ok(saved)
    }

    fn saved_count(&self) -> usize {
        *self.saved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn work(&self, worker: usize) {
        loop {
            if self.saved_count() >= self.archive_cap {
                break;
            }

            let next = self.queue.lock().await.recv().await;
            let Some(address) = next else {
                break;
            };

            let Some(html) = self.fetcher.fetch(address.as_str()).await else {
                tracing::warn!("Failed to download raw page {}", address);
                continue;
            };

            match self.store(&html) {
                Stored::Saved(index) => {
                    tracing::debug!("Saved {} as {}", address, listing_file_name(index));
                }
                Stored::CapReached => break,
                Stored::Failed => {}
            }
        }
        tracing::debug!("Archiver {} finished", worker);
    }

    fn store(&self, html: &str) -> Stored {
        let mut saved = self.saved.lock().unwrap_or_else(PoisonError::into_inner);
        if *saved >= self.archive_cap {
            return Stored::CapReached;
        }

        let index = *saved + 1;
        let path = self.html_dir.join(listing_file_name(index));
        match write_synced(&path, html.as_bytes()) {
            Ok(()) => {
                *saved = index;
                self.progress.update_download();
                Stored::Saved(index)
            }
            Err(e) => {
                tracing::error!("Error writing {}: {}", path.display(), e);
                Stored::Failed
            }
        }
    }
}

fn write_synced(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// What the compression pass did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionOutcome {
    /// Archive written with this many entries
    Written(usize),
    /// Fewer pages than the cap were saved; nothing written
    Skipped { saved: usize },
}

/// Packs `listing_1..=saved` from `html_dir` into a deflate zip at `archive_path`
///
/// Runs only once the cap was reached; below it this is a no-op. Rerunning
/// after the cap was reached rewrites the same archive.
pub fn compress_archive(
    html_dir: &Path,
    archive_path: &Path,
    saved: usize,
    archive_cap: usize,
) -> Result<CompressionOutcome, TrawlError> {
    if saved == 0 || saved < archive_cap {
        tracing::info!(
            "Not compressing raw pages: {}/{} saved",
            saved,
            archive_cap
        );
        return Ok(CompressionOutcome::Skipped { saved });
    }

    let mut zip = zip::ZipWriter::new(File::create(archive_path)?);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for index in 1..=saved {
        let name = listing_file_name(index);
        let mut source = File::open(html_dir.join(&name))?;
        zip.start_file(name, options)?;
        std::io::copy(&mut source, &mut zip)?;
    }

    zip.finish()?;
    tracing::info!(
        "Compressed {} raw pages into {}",
        saved,
        archive_path.display()
    );
    Ok(CompressionOutcome::Written(saved))
}
