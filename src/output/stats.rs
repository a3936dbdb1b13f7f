//! Statistics from the relational store
//!
//! This module reads listing and run counts back from the SQLite database
//! for `--stats`.

use crate::storage::{RunRecord, SinkResult, SqliteStore};

/// Harvest statistics summary
#[derive(Debug, Clone)]
pub struct HarvestStatistics {
    /// Rows in the listing table, across all runs
    pub total_listings: u64,

    /// Distinct detail addresses among those rows
    pub distinct_addresses: u64,

    /// Number of recorded runs
    pub total_runs: u64,

    /// The most recent run, if any
    pub latest_run: Option<RunRecord>,
}

impl HarvestStatistics {
    /// Rows that repeat an address already stored
    pub fn duplicate_rows(&self) -> u64 {
        self.total_listings.saturating_sub(self.distinct_addresses)
    }
}

/// Loads statistics from the store
pub fn load_statistics(store: &SqliteStore) -> SinkResult<HarvestStatistics> {
    Ok(HarvestStatistics {
        total_listings: store.count_listings()?,
        distinct_addresses: store.count_distinct_urls()?,
        total_runs: store.count_runs()?,
        latest_run: store.get_latest_run()?,
    })
}

/// Duration of a finished run in whole seconds
pub fn run_duration_seconds(run: &RunRecord) -> Option<i64> {
    let started = run.started_at.parse::<chrono::DateTime<chrono::Utc>>().ok()?;
    let finished = run
        .finished_at
        .as_ref()?
        .parse::<chrono::DateTime<chrono::Utc>>()
        .ok()?;
    Some((finished - started).num_seconds())
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &HarvestStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Listings:");
    println!("  Stored rows: {}", stats.total_listings);
    println!("  Distinct addresses: {}", stats.distinct_addresses);
    if stats.duplicate_rows() > 0 {
        println!("  Repeated rows: {}", stats.duplicate_rows());
    }
    println!();

    println!("Runs: {}", stats.total_runs);
    if let Some(run) = &stats.latest_run {
        println!("\nLatest run (#{}):", run.id);
        println!("  Status: {}", run.status.to_db_string());
        println!("  Started: {}", run.started_at);
        match &run.finished_at {
            Some(finished) => println!("  Finished: {}", finished),
            None => println!("  Finished: -"),
        }
        if let Some(seconds) = run_duration_seconds(run) {
            println!("  Duration: {}s", seconds);
        }
        println!(
            "  Fetched: {} | Scraped: {} | Downloaded: {}",
            run.fetched, run.scraped, run.downloaded
        );
        println!("  Config hash: {}", run.config_hash);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::ProgressTracker;
    use crate::storage::test_support::record;
    use crate::storage::RunStatus;

    #[test]
    fn test_load_statistics() {
        let mut store = SqliteStore::new_in_memory().unwrap();
        let run_id = store.create_run("hash").unwrap();
        store
            .insert_listings(&[record(1, 1), record(2, 2), record(3, 1)], Some(run_id))
            .unwrap();

        let (tracker, _discovering) = ProgressTracker::start(3, 1);
        store
            .finish_run(run_id, RunStatus::Completed, &tracker.snapshot())
            .unwrap();

        let stats = load_statistics(&store).unwrap();
        assert_eq!(stats.total_listings, 3);
        assert_eq!(stats.distinct_addresses, 2);
        assert_eq!(stats.duplicate_rows(), 1);
        assert_eq!(stats.total_runs, 1);
        assert_eq!(stats.latest_run.unwrap().status, RunStatus::Completed);
    }

    #[test]
    fn test_run_duration() {
        let run = RunRecord {
            id: 1,
            started_at: "2025-03-01T10:00:00+00:00".to_string(),
            finished_at: Some("2025-03-01T10:02:30+00:00".to_string()),
            config_hash: "h".to_string(),
            status: RunStatus::Completed,
            fetched: 0,
            scraped: 0,
            downloaded: 0,
        };
        assert_eq!(run_duration_seconds(&run), Some(150));

        let unfinished = RunRecord {
            finished_at: None,
            ..run
        };
        assert_eq!(run_duration_seconds(&unfinished), None);
    }
}
