//! Output module for run reports and statistics
//!
//! This module handles:
//! - The end-of-run report printed by the CLI
//! - Statistics read back from the relational store

pub mod stats;

pub use stats::{load_statistics, print_statistics, run_duration_seconds, HarvestStatistics};

use crate::crawler::{CompressionOutcome, RunSummary};

/// Multi-line report of a finished run
///
/// The last line is the progress summary
/// `Fetched: F/T | Scraped: S/T | Downloaded: D/C`.
pub fn format_run_report(summary: &RunSummary) -> String {
    let mut lines = vec![format!("=== Harvest Run {} ===", summary.run_id)];

    lines.push(format!(
        "Discovered: {} addresses ({} queued for archiving)",
        summary.discovery.accepted, summary.discovery.archived
    ));
    lines.push(format!(
        "Scraped: {} records, {} failed",
        summary.scraped, summary.scrape_failures
    ));
    lines.push(format!(
        "Persisted: {} records in {} batches, {} duplicates skipped",
        summary.persist.accepted, summary.persist.batches, summary.persist.duplicates
    ));
    for (sink, tally) in &summary.persist.sinks {
        if tally.failed_batches > 0 {
            lines.push(format!(
                "  {}: {} written, {} failed batches",
                sink, tally.written, tally.failed_batches
            ));
        }
    }

    lines.push(match summary.compression {
        CompressionOutcome::Written(entries) => {
            format!("Archived: {} raw pages, {} compressed", summary.archived, entries)
        }
        CompressionOutcome::Skipped { saved } => {
            format!("Archived: {} raw pages, not compressed", saved)
        }
    });

    if !summary.completed {
        lines.push("Warning: pipeline completion was not observed".to_string());
    }

    lines.push(summary.progress.to_string());
    lines.join("\n")
}

/// Prints the end-of-run report to stdout
pub fn print_run_report(summary: &RunSummary) {
    println!("{}", format_run_report(summary));
}
